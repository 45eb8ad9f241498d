//! Raster canvas
//!
//! The grayscale bitmap that backs the whole drawing. Ink is painted with a
//! round brush as pointer events arrive; the pipeline only ever reads it.

use image::{imageops, GrayImage, Luma};

use crate::types::{Point, SurfaceSize};

/// Background intensity (white paper)
pub const BACKGROUND: u8 = 255;

/// Ink intensity (black pen)
pub const INK: u8 = 0;

/// Default brush diameter in pixels
pub const DEFAULT_BRUSH_WIDTH: f64 = 20.0;

/// Grayscale bitmap of the drawing surface
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    image: GrayImage,
    brush_width: f64,
}

impl RasterCanvas {
    /// Blank (all background) canvas of the given size
    pub fn new(size: SurfaceSize, brush_width: f64) -> Self {
        Self {
            image: GrayImage::from_pixel(size.width, size.height, Luma([BACKGROUND])),
            brush_width: brush_width.max(0.0),
        }
    }

    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.image.width(), self.image.height())
    }

    pub fn brush_width(&self) -> f64 {
        self.brush_width
    }

    /// Underlying bitmap
    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Intensity at a pixel, `None` outside the canvas
    pub fn intensity(&self, x: u32, y: u32) -> Option<u8> {
        if x < self.image.width() && y < self.image.height() {
            Some(self.image.get_pixel(x, y).0[0])
        } else {
            None
        }
    }

    /// Paint a round dot centred on `p`
    pub fn stamp(&mut self, p: Point) {
        self.segment(p, p);
    }

    /// Paint a round-capped line from `a` to `b`.
    ///
    /// A pixel is inked when the distance from its centre to the segment is at
    /// most half the brush width.
    pub fn segment(&mut self, a: Point, b: Point) {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let radius = self.brush_width / 2.0;
        let min_x = (a.x.min(b.x) - radius).floor().max(0.0) as u32;
        let min_y = (a.y.min(b.y) - radius).floor().max(0.0) as u32;
        let max_x = ((a.x.max(b.x) + radius).ceil().max(0.0) as u32).min(width - 1);
        let max_y = ((a.y.max(b.y) + radius).ceil().max(0.0) as u32).min(height - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let centre = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if distance_to_segment(&centre, &a, &b) <= radius {
                    self.image.put_pixel(x, y, Luma([INK]));
                }
            }
        }
    }

    /// Copy a rectangular region. Pixels outside the canvas read as background.
    pub fn read_region(&self, x: i64, y: i64, width: u32, height: u32) -> GrayImage {
        let mut region = GrayImage::from_pixel(width, height, Luma([BACKGROUND]));
        imageops::replace(&mut region, &self.image, -x, -y);
        region
    }

    /// Wipe the canvas back to background
    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Luma([BACKGROUND]);
        }
    }

    /// Count of inked (non-background) pixels
    pub fn inked_pixels(&self) -> usize {
        self.image.pixels().filter(|p| p.0[0] != BACKGROUND).count()
    }
}

/// Distance from `p` to the segment `a`-`b` (projection clamped to the ends)
pub(crate) fn distance_to_segment(p: &Point, a: &Point, b: &Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance_to(&Point::new(a.x + t * dx, a.y + t * dy))
}
