//! Ramer-Douglas-Peucker stroke simplification
//!
//! Removes points that lie within a tolerance of the chord joining the ends of
//! the span they belong to, keeping the overall shape of the stroke.

use crate::canvas::distance_to_segment;
use crate::types::Point;

/// Default tolerance in surface units
pub const DEFAULT_EPSILON: f64 = 2.0;

/// RDP polyline simplifier
#[derive(Debug, Clone, Copy)]
pub struct RdpSimplifier {
    epsilon: f64,
}

impl Default for RdpSimplifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RdpSimplifier {
    /// Simplifier with the default tolerance (2.0)
    pub fn new() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }

    /// Simplifier with a custom tolerance. Negative or NaN tolerances become 0.
    pub fn with_epsilon(epsilon: f64) -> Self {
        let epsilon = if epsilon.is_nan() { 0.0 } else { epsilon.max(0.0) };
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Simplify one stroke.
    ///
    /// The result is an order-preserving subsequence of `points` that always
    /// keeps the first and last point. Fewer than three points pass through.
    pub fn simplify(&self, points: &[Point]) -> Vec<Point> {
        if points.len() < 3 {
            return points.to_vec();
        }

        let last = points.len() - 1;
        let mut keep = vec![false; points.len()];
        keep[0] = true;
        keep[last] = true;
        self.mark(points, 0, last, &mut keep);

        points
            .iter()
            .zip(keep)
            .filter_map(|(p, kept)| kept.then_some(*p))
            .collect()
    }

    /// Mark the points to keep strictly between `first` and `last`
    fn mark(&self, points: &[Point], first: usize, last: usize, keep: &mut [bool]) {
        if last <= first + 1 {
            return;
        }

        let (max_dist, index) = farthest_from_chord(points, first, last);
        if max_dist > self.epsilon {
            keep[index] = true;
            self.mark(points, first, index, keep);
            self.mark(points, index, last, keep);
        }
    }
}

/// Interior point farthest from the chord `points[first]`-`points[last]`
fn farthest_from_chord(points: &[Point], first: usize, last: usize) -> (f64, usize) {
    let start = &points[first];
    let end = &points[last];

    let mut max_dist = 0.0;
    let mut max_index = first + 1;
    for (i, p) in points.iter().enumerate().take(last).skip(first + 1) {
        let dist = distance_to_segment(p, start, end);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    (max_dist, max_index)
}
