//! Drawing seam between the engine and whatever actually paints pixels.
//!
//! The render pipeline only needs two capabilities from its host: "draw a
//! decoded image into a rectangular region" and simple clear/stroke
//! primitives. [`DrawSurface`] captures exactly that, so the engine works
//! the same against a browser canvas binding, a GUI framebuffer, or the
//! in-memory [`PixelSurface`] used by the snapshot CLI and the tests.
//!
//! Coordinates are logical canvas pixels as `f64`; implementations round
//! and clip as needed.

use std::sync::Mutex;

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use crate::view::Rect;

/// RGBA color, straight alpha.
pub type Color = [u8; 4];

pub const WHITE: Color = [255, 255, 255, 255];
pub const RED: Color = [255, 0, 0, 255];

// =============================================================================
// DrawSurface
// =============================================================================

/// Minimal drawing capability consumed by the render pipeline.
///
/// Methods take `&self`: the engine draws from async continuations, so
/// implementations provide their own interior mutability.
pub trait DrawSurface: Send + Sync {
    /// Logical size in canvas pixels.
    fn size(&self) -> (f64, f64);

    /// Clear the whole surface to its background.
    fn clear(&self);

    /// Fill the whole surface with a color.
    fn fill(&self, color: Color);

    /// Draw `image` scaled into `dst`.
    fn draw_image(&self, image: &RgbaImage, dst: Rect);

    /// Draw the `src` section of `image` scaled into `dst`.
    fn draw_image_section(&self, image: &RgbaImage, src: Rect, dst: Rect);

    /// Stroke the outline of `rect`.
    fn stroke_rect(&self, rect: Rect, color: Color, line_width: f64);
}

// =============================================================================
// PixelSurface
// =============================================================================

/// Software [`DrawSurface`] backed by an `RgbaImage`.
///
/// Used by the headless snapshot binary and by tests that assert on
/// produced pixels.
pub struct PixelSurface {
    pixels: Mutex<RgbaImage>,
    background: Color,
    width: u32,
    height: u32,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Self {
            pixels: Mutex::new(RgbaImage::from_pixel(width, height, Rgba(background))),
            background,
            width,
            height,
        }
    }

    /// Copy of the current pixels.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.lock().unwrap().clone()
    }

    /// Blend/copy a pre-scaled image at integer position, clipping to the
    /// surface bounds. Source pixels replace destination pixels (tiles
    /// are opaque rasters).
    fn blit(&self, scaled: &RgbaImage, x: i64, y: i64) {
        let mut pixels = self.pixels.lock().unwrap();
        for (sx, sy, px) in scaled.enumerate_pixels() {
            let dx = x + i64::from(sx);
            let dy = y + i64::from(sy);
            if dx < 0 || dy < 0 || dx >= i64::from(self.width) || dy >= i64::from(self.height) {
                continue;
            }
            pixels.put_pixel(dx as u32, dy as u32, *px);
        }
    }

    fn fill_region(&self, rect: Rect, color: Color) {
        let mut pixels = self.pixels.lock().unwrap();
        let x0 = rect.x.round().max(0.0) as u32;
        let y0 = rect.y.round().max(0.0) as u32;
        let x1 = (rect.right().round().max(0.0) as u32).min(self.width);
        let y1 = (rect.bottom().round().max(0.0) as u32).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                pixels.put_pixel(x, y, Rgba(color));
            }
        }
    }
}

impl DrawSurface for PixelSurface {
    fn size(&self) -> (f64, f64) {
        (f64::from(self.width), f64::from(self.height))
    }

    fn clear(&self) {
        self.fill(self.background);
    }

    fn fill(&self, color: Color) {
        let mut pixels = self.pixels.lock().unwrap();
        for px in pixels.pixels_mut() {
            *px = Rgba(color);
        }
    }

    fn draw_image(&self, image: &RgbaImage, dst: Rect) {
        let w = dst.width.round() as i64;
        let h = dst.height.round() as i64;
        if w <= 0 || h <= 0 || image.width() == 0 || image.height() == 0 {
            return;
        }
        let scaled = image::imageops::resize(image, w as u32, h as u32, FilterType::Triangle);
        self.blit(&scaled, dst.x.round() as i64, dst.y.round() as i64);
    }

    fn draw_image_section(&self, image: &RgbaImage, src: Rect, dst: Rect) {
        // Clamp the section to the source image before cropping.
        let sx = src.x.max(0.0).floor() as u32;
        let sy = src.y.max(0.0).floor() as u32;
        let sw = (src.right().ceil() as u32).min(image.width()).saturating_sub(sx);
        let sh = (src.bottom().ceil() as u32).min(image.height()).saturating_sub(sy);
        if sw == 0 || sh == 0 {
            return;
        }
        let section = image::imageops::crop_imm(image, sx, sy, sw, sh).to_image();
        self.draw_image(&section, dst);
    }

    fn stroke_rect(&self, rect: Rect, color: Color, line_width: f64) {
        let lw = line_width.max(1.0);
        // Four edges as filled bands.
        self.fill_region(Rect::new(rect.x, rect.y, rect.width, lw), color);
        self.fill_region(
            Rect::new(rect.x, rect.bottom() - lw, rect.width, lw),
            color,
        );
        self.fill_region(Rect::new(rect.x, rect.y, lw, rect.height), color);
        self.fill_region(
            Rect::new(rect.right() - lw, rect.y, lw, rect.height),
            color,
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: Color) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_clear_restores_background() {
        let surface = PixelSurface::new(10, 10, WHITE);
        surface.fill([0, 0, 0, 255]);
        surface.clear();
        assert_eq!(surface.snapshot().get_pixel(5, 5).0, WHITE);
    }

    #[test]
    fn test_draw_image_scales_into_dst() {
        let surface = PixelSurface::new(20, 20, WHITE);
        surface.draw_image(&solid(2, 2, [0, 0, 255, 255]), Rect::new(5.0, 5.0, 10.0, 10.0));

        let shot = surface.snapshot();
        assert_eq!(shot.get_pixel(6, 6).0, [0, 0, 255, 255]);
        assert_eq!(shot.get_pixel(14, 14).0, [0, 0, 255, 255]);
        assert_eq!(shot.get_pixel(0, 0).0, WHITE);
        assert_eq!(shot.get_pixel(16, 16).0, WHITE);
    }

    #[test]
    fn test_draw_image_clips_offscreen() {
        let surface = PixelSurface::new(10, 10, WHITE);
        // Half off the top-left corner.
        surface.draw_image(&solid(4, 4, [10, 20, 30, 255]), Rect::new(-2.0, -2.0, 4.0, 4.0));

        let shot = surface.snapshot();
        assert_eq!(shot.get_pixel(1, 1).0, [10, 20, 30, 255]);
        assert_eq!(shot.get_pixel(3, 3).0, WHITE);
    }

    #[test]
    fn test_draw_image_degenerate_dst_is_noop() {
        let surface = PixelSurface::new(10, 10, WHITE);
        surface.draw_image(&solid(4, 4, [0, 0, 0, 255]), Rect::new(0.0, 0.0, 0.2, 0.2));
        assert_eq!(surface.snapshot().get_pixel(0, 0).0, WHITE);
    }

    #[test]
    fn test_draw_image_section() {
        // Left half green, right half blue; draw only the right half.
        let mut img = solid(8, 4, [0, 255, 0, 255]);
        for y in 0..4 {
            for x in 4..8 {
                img.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }

        let surface = PixelSurface::new(8, 8, WHITE);
        surface.draw_image_section(
            &img,
            Rect::new(4.0, 0.0, 4.0, 4.0),
            Rect::new(0.0, 0.0, 8.0, 8.0),
        );
        assert_eq!(surface.snapshot().get_pixel(4, 4).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_stroke_rect_outlines_only() {
        let surface = PixelSurface::new(20, 20, WHITE);
        surface.stroke_rect(Rect::new(2.0, 2.0, 10.0, 10.0), RED, 2.0);

        let shot = surface.snapshot();
        assert_eq!(shot.get_pixel(2, 2).0, RED);
        assert_eq!(shot.get_pixel(11, 3).0, RED);
        // Interior untouched.
        assert_eq!(shot.get_pixel(7, 7).0, WHITE);
    }
}
