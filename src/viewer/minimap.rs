//! Minimap synchronizer: a fixed-size overview with the live viewport
//! outlined on top.
//!
//! The overview image is letterboxed into its frame (aspect preserved,
//! centered, background-filled); the viewport rectangle is the visible
//! region scaled by `overview draw size / image size`.

use std::sync::Arc;

use image::RgbaImage;

use crate::view::{Rect, Viewport};

use super::surface::{Color, DrawSurface, RED, WHITE};

/// Stroke width of the viewport outline, in minimap pixels.
const OUTLINE_WIDTH: f64 = 2.0;

/// Compute the aspect-preserving, centered draw rectangle for an image of
/// `image` pixels inside a frame of `frame` pixels.
pub fn letterbox(image: (f64, f64), frame: (f64, f64)) -> Rect {
    let image_aspect = image.0 / image.1;
    let frame_aspect = frame.0 / frame.1;

    if image_aspect > frame_aspect {
        // Wider than the frame: pin width, center vertically.
        let height = frame.0 / image_aspect;
        Rect::new(0.0, (frame.1 - height) / 2.0, frame.0, height)
    } else {
        let width = frame.1 * image_aspect;
        Rect::new((frame.0 - width) / 2.0, 0.0, width, frame.1)
    }
}

// =============================================================================
// Minimap
// =============================================================================

/// Draws the overview image plus the live viewport rectangle.
pub struct Minimap {
    surface: Arc<dyn DrawSurface>,
    overview: Arc<RgbaImage>,
    image_dims: (f64, f64),
    background: Color,
}

impl Minimap {
    pub fn new(surface: Arc<dyn DrawSurface>, overview: Arc<RgbaImage>, image_dims: (u32, u32)) -> Self {
        Self {
            surface,
            overview,
            image_dims: (f64::from(image_dims.0), f64::from(image_dims.1)),
            background: WHITE,
        }
    }

    /// The viewport rectangle in minimap coordinates for a given camera
    /// state. Exposed separately from [`Minimap::update`] for tests.
    pub fn viewport_outline(&self, viewport: &Viewport) -> Rect {
        let draw = letterbox(self.image_dims, self.surface.size());
        let scale_x = draw.width / self.image_dims.0;
        let scale_y = draw.height / self.image_dims.1;

        let visible = viewport.visible_rect();
        Rect::new(
            draw.x + visible.x * scale_x,
            draw.y + visible.y * scale_y,
            visible.width * scale_x,
            visible.height * scale_y,
        )
    }

    /// Redraw the overview and stroke the live viewport rectangle.
    pub fn update(&self, viewport: &Viewport) {
        let draw = letterbox(self.image_dims, self.surface.size());

        self.surface.fill(self.background);
        self.surface.draw_image(&self.overview, draw);
        self.surface
            .stroke_rect(self.viewport_outline(viewport), RED, OUTLINE_WIDTH);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ZoomConfig;
    use crate::viewer::surface::PixelSurface;

    #[test]
    fn test_letterbox_wide_image() {
        // 2:1 image in a square frame: full width, half height, centered.
        let rect = letterbox((2000.0, 1000.0), (200.0, 200.0));
        assert_eq!(rect, Rect::new(0.0, 50.0, 200.0, 100.0));
    }

    #[test]
    fn test_letterbox_tall_image() {
        let rect = letterbox((1000.0, 2000.0), (200.0, 200.0));
        assert_eq!(rect, Rect::new(50.0, 0.0, 100.0, 200.0));
    }

    #[test]
    fn test_letterbox_matching_aspect_fills_frame() {
        let rect = letterbox((800.0, 600.0), (200.0, 150.0));
        assert_eq!(rect, Rect::new(0.0, 0.0, 200.0, 150.0));
    }

    #[test]
    fn test_viewport_outline_tracks_offset_and_zoom() {
        let surface = Arc::new(PixelSurface::new(200, 200, WHITE));
        let overview = Arc::new(RgbaImage::new(100, 50));
        let minimap = Minimap::new(surface, overview, (2000, 1000));

        let mut vp = Viewport::new(2000, 1000, 400.0, 200.0, ZoomConfig::default());
        // Fit zoom shows everything: the outline is the whole draw rect.
        let outline = minimap.viewport_outline(&vp);
        let draw = letterbox((2000.0, 1000.0), (200.0, 200.0));
        assert!((outline.x - draw.x).abs() < 1e-9);
        assert!((outline.width - draw.width).abs() < 1e-9);

        // Zooming in shrinks the outline proportionally.
        vp.zoom_around(4.0, (200.0, 100.0));
        let zoomed = minimap.viewport_outline(&vp);
        assert!((zoomed.width - draw.width / 4.0).abs() < 1e-9);
        assert!(zoomed.x > outline.x);
    }

    #[test]
    fn test_update_paints_outline() {
        let surface = Arc::new(PixelSurface::new(100, 100, WHITE));
        let overview = Arc::new(RgbaImage::from_pixel(
            50,
            50,
            image::Rgba([0, 128, 0, 255]),
        ));
        let minimap = Minimap::new(Arc::clone(&surface) as Arc<dyn DrawSurface>, overview, (1000, 1000));

        let mut vp = Viewport::new(1000, 1000, 100.0, 100.0, ZoomConfig::default());
        vp.zoom_around(2.0, (50.0, 50.0));
        minimap.update(&vp);

        let outline = minimap.viewport_outline(&vp);
        let shot = surface.snapshot();
        let px = shot.get_pixel(
            outline.x.round() as u32,
            (outline.y + 1.0).round() as u32,
        );
        assert_eq!(px.0, RED);
    }
}
