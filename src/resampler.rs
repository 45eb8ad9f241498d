//! Minimum-spacing stroke resampling

use crate::types::Point;

/// Default minimum distance between kept points
pub const DEFAULT_MIN_SPACING: f64 = 1.0;

/// Forward-pass resampler that drops points crowding the last kept point.
///
/// The pass never looks ahead, so the final input point is dropped when it
/// lands within the spacing of the point kept before it.
#[derive(Debug, Clone, Copy)]
pub struct StrokeResampler {
    min_spacing: f64,
}

impl Default for StrokeResampler {
    fn default() -> Self {
        Self {
            min_spacing: DEFAULT_MIN_SPACING,
        }
    }
}

impl StrokeResampler {
    pub fn with_min_spacing(min_spacing: f64) -> Self {
        let min_spacing = if min_spacing.is_nan() {
            0.0
        } else {
            min_spacing.max(0.0)
        };
        Self { min_spacing }
    }

    pub fn min_spacing(&self) -> f64 {
        self.min_spacing
    }

    pub fn resample(&self, points: &[Point]) -> Vec<Point> {
        let Some((first, rest)) = points.split_first() else {
            return Vec::new();
        };

        let mut kept = vec![*first];
        let mut anchor = *first;
        for p in rest {
            if p.distance_to(&anchor) >= self.min_spacing {
                kept.push(*p);
                anchor = *p;
            }
        }
        kept
    }
}
