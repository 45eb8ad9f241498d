//! Raster normalization
//!
//! This module turns the accumulated drawing bitmap into the 28x28 tensor the
//! image classifier expects.
//! - Bounding box padded and squared around the ink
//! - Nearest-neighbour downsampling in fixed stages (side -> 104 -> 52 -> 28)
//! - Inverted intensities, so background is 0 and full ink is 1

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use tracing::debug;

use crate::canvas::{RasterCanvas, BACKGROUND};
use crate::types::{BoundingBox, NormalizedTensor, SurfaceSize, TENSOR_SIDE};

/// Padding added around the bounding box before cropping
pub const DEFAULT_PADDING: f64 = 10.0;

/// Intermediate square sizes of the downsampling chain
const STAGES: [u32; 2] = [104, 52];

/// Side of the inset the final stage draws into
const INSET_SIDE: u32 = 26;

/// Offset of the inset inside the 28x28 output
const INSET_OFFSET: i64 = 1;

/// Square region of the surface to rasterize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: i64,
    pub y: i64,
    pub side: u32,
}

/// Normalizer for converting the drawing bitmap into a tensor
#[derive(Debug, Clone, Copy)]
pub struct RasterNormalizer {
    padding: f64,
}

impl Default for RasterNormalizer {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
        }
    }
}

impl RasterNormalizer {
    pub fn with_padding(padding: f64) -> Self {
        Self {
            padding: padding.max(0.0),
        }
    }

    pub fn padding(&self) -> f64 {
        self.padding
    }

    /// Normalize the canvas into a 784-value tensor.
    ///
    /// An unset bounding box (nothing drawn yet) yields the blank tensor.
    pub fn normalize(
        &self,
        canvas: &RasterCanvas,
        bounds: Option<BoundingBox>,
    ) -> NormalizedTensor {
        let Some(window) = bounds.and_then(|b| self.crop_window(&b, canvas.size())) else {
            debug!("no drawable region, emitting blank tensor");
            return NormalizedTensor::blank();
        };

        debug!(x = window.x, y = window.y, side = window.side, "rasterizing crop window");
        let region = canvas.read_region(window.x, window.y, window.side, window.side);
        tensor_from_image(&downsample(&region))
    }

    /// Square crop around the padded bounding box.
    ///
    /// The shorter side is centred within the square, then the origin is
    /// clamped so the square stays on the surface wherever it fits.
    pub fn crop_window(&self, bounds: &BoundingBox, surface: SurfaceSize) -> Option<CropWindow> {
        let padded = bounds.expanded(self.padding, surface);
        let box_w = padded.width();
        let box_h = padded.height();
        if !(box_w >= 0.0 && box_h >= 0.0) {
            return None;
        }

        let side = box_w.max(box_h);
        let side_px = side.ceil() as u32;
        if side_px == 0 {
            return None;
        }

        let x = centred_origin(padded.min_x, box_w, side, side_px, surface.width);
        let y = centred_origin(padded.min_y, box_h, side, side_px, surface.height);
        Some(CropWindow {
            x,
            y,
            side: side_px,
        })
    }
}

fn centred_origin(min: f64, extent: f64, side: f64, side_px: u32, limit: u32) -> i64 {
    let origin = if extent < side {
        min - (side - extent) / 2.0
    } else {
        min
    };
    let high = (limit as i64 - side_px as i64).max(0);
    (origin.floor() as i64).clamp(0, high)
}

/// Nearest-neighbour chain: side -> 104 -> 52 -> 26, drawn at (1,1) in 28x28
fn downsample(region: &GrayImage) -> GrayImage {
    let mut staged = region.clone();
    for size in STAGES {
        staged = imageops::resize(&staged, size, size, FilterType::Nearest);
    }
    let inset = imageops::resize(&staged, INSET_SIDE, INSET_SIDE, FilterType::Nearest);

    let side = TENSOR_SIDE as u32;
    let mut output = GrayImage::from_pixel(side, side, Luma([BACKGROUND]));
    imageops::replace(&mut output, &inset, INSET_OFFSET, INSET_OFFSET);
    output
}

fn tensor_from_image(image: &GrayImage) -> NormalizedTensor {
    let values: Vec<f32> = image
        .pixels()
        .map(|p| (255 - p.0[0]) as f32 / 255.0)
        .collect();
    // 28x28 u8 pixels always map into a valid tensor
    NormalizedTensor::try_from(values).unwrap_or_else(|_| NormalizedTensor::blank())
}
