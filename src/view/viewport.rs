//! Mutable camera state for one open slide.
//!
//! The viewport maps base-level image pixels to canvas pixels through a
//! zoom factor and a top-left offset:
//!
//! ```text
//! canvas = (image - offset) * zoom
//! image  = offset + canvas / zoom
//! ```
//!
//! Every mutation path ends in [`Viewport::clamp`], so the offset never
//! points outside the image and the zoom never leaves its allowed range.
//! The render pipeline clones the viewport at the start of a pass and uses
//! the clone as that pass's generation token.

use super::Rect;

/// Hard upper zoom limit (canvas pixels per image pixel).
pub const DEFAULT_MAX_ZOOM: f64 = 16.0;

/// Absolute zoom floor used when zooming out below fit-to-view is allowed.
pub const ABSOLUTE_MIN_ZOOM: f64 = 0.05;

// =============================================================================
// Zoom configuration
// =============================================================================

/// Zoom-range policy for a viewport.
///
/// The original viewers disagreed on the minimum zoom: one clamped to the
/// fit-to-view zoom, the other allowed zooming out to an absolute floor.
/// Rather than guessing, the choice is explicit here.
#[derive(Debug, Clone, Copy)]
pub struct ZoomConfig {
    /// Hard upper zoom limit
    pub max_zoom: f64,

    /// When true the minimum zoom is [`ABSOLUTE_MIN_ZOOM`] instead of the
    /// fit-to-view zoom
    pub allow_below_fit: bool,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            max_zoom: DEFAULT_MAX_ZOOM,
            allow_below_fit: false,
        }
    }
}

// =============================================================================
// Viewport
// =============================================================================

/// Camera state: zoom factor, top-left offset in base-level image pixels,
/// and the logical canvas size.
#[derive(Debug, Clone)]
pub struct Viewport {
    zoom: f64,
    offset: (f64, f64),
    canvas: (f64, f64),
    image: (f64, f64),
    fit_zoom: f64,
    min_zoom: f64,
    max_zoom: f64,
}

impl Viewport {
    /// Create a viewport for an image of `image_w x image_h` base-level
    /// pixels shown on a logical canvas of `canvas_w x canvas_h`.
    ///
    /// The initial state is fit-to-view: the zoom at which the whole image
    /// exactly fills the canvas on one axis, centered on the other.
    pub fn new(image_w: u32, image_h: u32, canvas_w: f64, canvas_h: f64, zoom: ZoomConfig) -> Self {
        let image = (f64::from(image_w), f64::from(image_h));
        let fit_zoom = (canvas_w / image.0).min(canvas_h / image.1);
        let min_zoom = if zoom.allow_below_fit {
            ABSOLUTE_MIN_ZOOM
        } else {
            fit_zoom
        };

        let mut vp = Self {
            zoom: fit_zoom,
            offset: (0.0, 0.0),
            canvas: (canvas_w, canvas_h),
            image,
            fit_zoom,
            min_zoom,
            max_zoom: zoom.max_zoom,
        };
        vp.reset_to_fit();
        vp
    }

    /// Current zoom factor (canvas pixels per base-level image pixel).
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Top-left corner of the visible region in base-level image pixels.
    pub fn offset(&self) -> (f64, f64) {
        self.offset
    }

    /// Logical canvas size in canvas pixels.
    pub fn canvas_size(&self) -> (f64, f64) {
        self.canvas
    }

    /// The fit-to-view zoom computed at construction.
    pub fn fit_zoom(&self) -> f64 {
        self.fit_zoom
    }

    /// Map a base-level image point to canvas coordinates.
    pub fn image_to_canvas(&self, p: (f64, f64)) -> (f64, f64) {
        (
            (p.0 - self.offset.0) * self.zoom,
            (p.1 - self.offset.1) * self.zoom,
        )
    }

    /// Map a canvas point to base-level image coordinates.
    pub fn canvas_to_image(&self, p: (f64, f64)) -> (f64, f64) {
        (
            self.offset.0 + p.0 / self.zoom,
            self.offset.1 + p.1 / self.zoom,
        )
    }

    /// The visible region in base-level image coordinates.
    pub fn visible_rect(&self) -> Rect {
        Rect::new(
            self.offset.0,
            self.offset.1,
            self.canvas.0 / self.zoom,
            self.canvas.1 / self.zoom,
        )
    }

    /// Re-apply the state invariants.
    ///
    /// Idempotent; must run after every zoom or pan change before any
    /// dependent computation reads `offset`/`zoom`.
    pub fn clamp(&mut self) {
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);

        let max_x = (self.image.0 - self.canvas.0 / self.zoom).max(0.0);
        let max_y = (self.image.1 - self.canvas.1 / self.zoom).max(0.0);
        self.offset.0 = self.offset.0.clamp(0.0, max_x);
        self.offset.1 = self.offset.1.clamp(0.0, max_y);
    }

    /// Pan by a delta given in canvas pixels (positive drags content left/up).
    pub fn pan_by(&mut self, dx_canvas: f64, dy_canvas: f64) {
        self.offset.0 += dx_canvas / self.zoom;
        self.offset.1 += dy_canvas / self.zoom;
        self.clamp();
    }

    /// Multiply the zoom by `factor`, keeping the image point under
    /// `pivot` (a canvas point) fixed on screen.
    ///
    /// The pivot is converted to image coordinates under the old zoom, the
    /// new zoom is clamped, and the offset is re-solved so the same image
    /// point maps back to the same canvas pivot.
    pub fn zoom_around(&mut self, factor: f64, pivot: (f64, f64)) {
        let img_pivot = self.canvas_to_image(pivot);

        self.zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);

        self.offset.0 = img_pivot.0 - pivot.0 / self.zoom;
        self.offset.1 = img_pivot.1 - pivot.1 / self.zoom;
        self.clamp();
    }

    /// Multiply the zoom by `factor` around the canvas center.
    pub fn zoom_centered(&mut self, factor: f64) {
        self.zoom_around(factor, (self.canvas.0 / 2.0, self.canvas.1 / 2.0));
    }

    /// Return to the initial fit-to-view zoom with the image centered.
    pub fn reset_to_fit(&mut self) {
        self.zoom = self.fit_zoom.clamp(self.min_zoom, self.max_zoom);
        self.offset.0 = ((self.image.0 - self.canvas.0 / self.zoom) / 2.0).max(0.0);
        self.offset.1 = ((self.image.1 - self.canvas.1 / self.zoom) / 2.0).max(0.0);
        self.clamp();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        // 10000x8000 image on an 800x600 canvas: fit zoom is
        // min(800/10000, 600/8000) = 0.075.
        Viewport::new(10000, 8000, 800.0, 600.0, ZoomConfig::default())
    }

    fn assert_close(a: (f64, f64), b: (f64, f64)) {
        assert!((a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_initial_fit_and_center() {
        let vp = viewport();
        assert!((vp.zoom() - 0.075).abs() < 1e-12);
        // Width exactly fills the canvas at fit zoom; height is centered:
        // visible height = 600/0.075 = 8000, so offset.1 = 0.
        assert_close(vp.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_transform_round_trip() {
        let mut vp = viewport();
        vp.zoom_around(3.0, (200.0, 150.0));

        for p in [(0.0, 0.0), (123.4, 567.8), (800.0, 600.0)] {
            let there_and_back = vp.canvas_to_image(vp.image_to_canvas(p));
            assert_close(there_and_back, p);
        }
    }

    #[test]
    fn test_zoom_pivot_stays_fixed() {
        let mut vp = viewport();
        let pivot = (250.0, 400.0);
        let img_before = vp.canvas_to_image(pivot);

        vp.zoom_around(2.0, pivot);

        let img_after = vp.canvas_to_image(pivot);
        assert_close(img_before, img_after);
        // And the same image point still lands on the pivot.
        assert_close(vp.image_to_canvas(img_after), pivot);
    }

    #[test]
    fn test_zoom_clamped_to_max() {
        let mut vp = viewport();
        vp.zoom_around(1e9, (400.0, 300.0));
        assert_eq!(vp.zoom(), DEFAULT_MAX_ZOOM);
    }

    #[test]
    fn test_zoom_out_clamped_to_fit_by_default() {
        let mut vp = viewport();
        vp.zoom_around(1e-9, (400.0, 300.0));
        assert_eq!(vp.zoom(), vp.fit_zoom());
    }

    #[test]
    fn test_zoom_out_below_fit_when_allowed() {
        let mut vp = Viewport::new(
            10000,
            8000,
            800.0,
            600.0,
            ZoomConfig {
                allow_below_fit: true,
                ..ZoomConfig::default()
            },
        );
        vp.zoom_around(1e-9, (400.0, 300.0));
        assert_eq!(vp.zoom(), ABSOLUTE_MIN_ZOOM);
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let mut vp = viewport();
        vp.zoom_around(4.0, (799.0, 1.0));
        vp.pan_by(12345.0, -9876.0);

        let once = (vp.offset(), vp.zoom());
        vp.clamp();
        assert_eq!((vp.offset(), vp.zoom()), once);
    }

    #[test]
    fn test_offset_never_leaves_image() {
        let mut vp = viewport();
        vp.zoom_around(8.0, (400.0, 300.0));

        vp.pan_by(1e9, 1e9);
        let (ox, oy) = vp.offset();
        let visible = vp.visible_rect();
        assert!(ox >= 0.0 && oy >= 0.0);
        assert!(visible.right() <= 10000.0 + 1e-6);
        assert!(visible.bottom() <= 8000.0 + 1e-6);

        vp.pan_by(-1e9, -1e9);
        assert_close(vp.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_pan_delta_is_in_canvas_pixels() {
        let mut vp = viewport();
        vp.zoom_around(2.0 / 0.075, (0.0, 0.0)); // zoom becomes 2.0
        let before = vp.offset();
        vp.pan_by(10.0, 0.0);
        assert!((vp.offset().0 - before.0 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_to_fit_recenters() {
        let mut vp = viewport();
        vp.zoom_around(5.0, (100.0, 100.0));
        vp.pan_by(300.0, 300.0);

        vp.reset_to_fit();
        assert_eq!(vp.zoom(), vp.fit_zoom());
        assert_close(vp.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_small_image_centered_on_large_canvas() {
        // Image smaller than the canvas: fit zoom > 1, offsets pinned at 0.
        let vp = Viewport::new(100, 50, 800.0, 600.0, ZoomConfig::default());
        assert!(vp.zoom() > 1.0);
        assert_close(vp.offset(), (0.0, 0.0));
    }

    #[test]
    fn test_visible_rect() {
        let mut vp = viewport();
        vp.zoom_around(0.2 / 0.075, (0.0, 0.0));
        let r = vp.visible_rect();
        assert!((r.width - 800.0 / 0.2).abs() < 1e-9);
        assert!((r.height - 600.0 / 0.2).abs() < 1e-9);
    }
}
