//! Stroke sequence encoding
//!
//! This module converts raw stroke geometry into the delta/pen sequence the
//! recurrent classifier consumes. Every stroke is simplified and resampled on
//! its own, but all strokes share one global normalization and one running
//! position.

use tracing::debug;

use crate::error::SketchError;
use crate::resampler::StrokeResampler;
use crate::simplifier::RdpSimplifier;
use crate::types::{BoundingBox, EncodedStep, Stroke, StrokeSequence, DELTA_LIMIT};

/// Sequence encoder for producing `[dx, dy, pen]` steps
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceEncoder {
    simplifier: RdpSimplifier,
    resampler: StrokeResampler,
}

impl SequenceEncoder {
    /// Encoder with the default tolerance (2.0) and spacing (1.0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder with custom per-stroke stages
    pub fn with_stages(simplifier: RdpSimplifier, resampler: StrokeResampler) -> Self {
        Self {
            simplifier,
            resampler,
        }
    }

    pub fn simplifier(&self) -> &RdpSimplifier {
        &self.simplifier
    }

    pub fn resampler(&self) -> &StrokeResampler {
        &self.resampler
    }

    /// Scale that maps the longer side of `bounds` onto 255 units.
    ///
    /// A zero-extent box (a single tap) uses a denominator of 1.
    pub fn scale_factor(bounds: &BoundingBox) -> f64 {
        let extent = bounds.width().max(bounds.height());
        let denominator = if extent > 0.0 { extent } else { 1.0 };
        DELTA_LIMIT as f64 / denominator
    }

    /// Encode all strokes of a drawing.
    ///
    /// Emits one pen-lift step per input stroke. Returns
    /// `SketchError::EmptyDrawing` when there is nothing to encode.
    pub fn encode(&self, strokes: &[Stroke]) -> Result<StrokeSequence, SketchError> {
        let bounds = BoundingBox::from_points(strokes.iter().flat_map(|s| s.points()))
            .ok_or(SketchError::EmptyDrawing)?;
        let scale = Self::scale_factor(&bounds);
        let center = bounds.center();

        let mut steps = Vec::new();
        let (mut run_x, mut run_y) = (0i32, 0i32);
        for stroke in strokes {
            let simplified = self.simplifier.simplify(stroke.points());
            let processed = self.resampler.resample(&simplified);

            for p in &processed {
                let nx = (p.x - center.x) * scale;
                let ny = (p.y - center.y) * scale;
                let step = EncodedStep::draw(
                    round_half_up(nx - run_x as f64),
                    round_half_up(ny - run_y as f64),
                );
                // Advance by the clamped delta so the path stays consistent
                run_x += step.dx as i32;
                run_y += step.dy as i32;
                steps.push(step);
            }
            steps.push(EncodedStep::lift());
        }

        debug!(
            strokes = strokes.len(),
            steps = steps.len(),
            scale,
            "encoded stroke sequence"
        );
        Ok(StrokeSequence::new(steps))
    }

    /// Encode to a JSON array of `[dx, dy, pen]` triples
    pub fn encode_to_json(&self, strokes: &[Stroke]) -> Result<String, SketchError> {
        let sequence = self.encode(strokes)?;
        serde_json::to_string(&sequence).map_err(SketchError::JsonError)
    }
}

/// Round to nearest, halves toward positive infinity
fn round_half_up(v: f64) -> i32 {
    (v + 0.5).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PenState, Point};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn stroke(raw: &[(f64, f64)]) -> Stroke {
        Stroke::new(raw.iter().copied().map(Point::from).collect()).unwrap()
    }

    #[test]
    fn test_single_tap_encodes_to_two_steps() {
        let sequence = SequenceEncoder::new().encode(&[stroke(&[(50.0, 50.0)])]).unwrap();
        assert_eq!(
            sequence.steps(),
            &[EncodedStep::draw(0, 0), EncodedStep::lift()]
        );
    }

    #[test]
    fn test_scale_from_longer_side() {
        let strokes = [stroke(&[(0.0, 50.0)]), stroke(&[(100.0, 50.0)])];
        let bounds = BoundingBox::from_points(strokes.iter().flat_map(|s| s.points())).unwrap();
        assert!((SequenceEncoder::scale_factor(&bounds) - 2.55).abs() < 1e-12);

        let sequence = SequenceEncoder::new().encode(&strokes).unwrap();
        assert_eq!(sequence.len(), 4);
        assert_eq!(sequence.pen_lifts(), 2);
    }

    #[test]
    fn test_zero_extent_uses_unit_denominator() {
        let bounds = BoundingBox::from_point(Point::new(7.0, 7.0));
        assert_eq!(SequenceEncoder::scale_factor(&bounds), 255.0);
    }

    #[test]
    fn test_running_position_spans_strokes() {
        // The tap sits on the box centre, so its absolute position is the origin
        let strokes = [stroke(&[(0.0, 0.0), (100.0, 0.0)]), stroke(&[(50.0, 0.0)])];
        let sequence = SequenceEncoder::new().encode(&strokes).unwrap();
        let paths = sequence.reconstruct();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1], vec![(0, 0)]);
        let (end_x, _) = paths[0][1];
        assert!((end_x - 127).abs() <= 1, "end_x = {end_x}");
    }

    #[test]
    fn test_simplification_applies_per_stroke() {
        let strokes = [stroke(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 5.0), (4.0, 0.0), (5.0, 0.0)])];
        let sequence = SequenceEncoder::new().encode(&strokes).unwrap();

        // (0,0), (3,5), (5,0) + lift
        assert_eq!(sequence.len(), 4);
        assert_eq!(sequence.steps()[3].pen, PenState::Lift);
    }

    #[test]
    fn test_empty_drawing_is_rejected() {
        let err = SequenceEncoder::new().encode(&[]).unwrap_err();
        assert!(matches!(err, SketchError::EmptyDrawing));
    }

    #[test]
    fn test_encode_to_json_wire_form() {
        let json = SequenceEncoder::new()
            .encode_to_json(&[stroke(&[(10.0, 10.0)])])
            .unwrap();
        assert_eq!(json, "[[0,0,0],[0,0,1]]");
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.6), -3);
        assert_eq!(round_half_up(0.49), 0);
    }

    fn drawing_strategy() -> impl Strategy<Value = Vec<Stroke>> {
        let stroke = prop::collection::vec((0.0f64..800.0, 0.0f64..600.0), 1..30)
            .prop_map(|raw| Stroke::new(raw.into_iter().map(Point::from).collect()).unwrap());
        prop::collection::vec(stroke, 1..6)
    }

    proptest! {
        #[test]
        fn one_lift_per_stroke(strokes in drawing_strategy()) {
            let sequence = SequenceEncoder::new().encode(&strokes).unwrap();
            prop_assert_eq!(sequence.pen_lifts(), strokes.len());
            prop_assert_eq!(sequence.steps().last().map(|s| s.pen), Some(PenState::Lift));
        }

        #[test]
        fn deltas_stay_in_range(strokes in drawing_strategy()) {
            let sequence = SequenceEncoder::new().encode(&strokes).unwrap();
            for step in sequence.steps() {
                prop_assert!((-255..=255).contains(&(step.dx as i32)));
                prop_assert!((-255..=255).contains(&(step.dy as i32)));
            }
        }
    }
}
