//! Pipeline orchestration
//!
//! This module provides the public API for Sketch Prep.
//! It turns captured strokes into ready-to-send prediction requests.

use tracing::debug;

use crate::config::PipelineConfig;
use crate::dispatch::{PredictionMode, PredictionRequest, RASTER_MODEL, SEQUENCE_MODEL};
use crate::error::{SketchError, SketchResult};
use crate::surface::DrawingSurface;
use crate::types::{Stroke, SurfaceSize};

/// Convert a JSON array of strokes into a sequence-mode request body.
///
/// # Arguments
/// * `strokes_json` - `[{"x": [..], "y": [..]}, ...]` in surface coordinates
/// * `model` - Model identifier, `None` for the recurrent model
///
/// # Example
/// ```ignore
/// let body = strokes_to_sequence_payload(r#"[{"x":[10,60],"y":[10,10]}]"#, None)?;
/// ```
pub fn strokes_to_sequence_payload(strokes_json: &str, model: Option<&str>) -> SketchResult<String> {
    let strokes = parse_strokes(strokes_json)?;
    let mut config = PipelineConfig::default();
    config.dispatch.model = Some(model.unwrap_or(SEQUENCE_MODEL).to_string());

    SketchProcessor::new(config)
        .request(PredictionMode::Sequence, &strokes)?
        .to_json()
}

/// Convert a JSON array of strokes into a raster-mode request body.
///
/// The strokes are painted onto a fresh surface of `size` before
/// rasterizing; points off that surface are dropped.
///
/// # Arguments
/// * `strokes_json` - `[{"x": [..], "y": [..]}, ...]` in surface coordinates
/// * `size` - Extents of the surface the strokes were drawn on
/// * `model` - Model identifier, `None` for the convolutional model
pub fn strokes_to_pixels_payload(
    strokes_json: &str,
    size: SurfaceSize,
    model: Option<&str>,
) -> SketchResult<String> {
    let strokes = parse_strokes(strokes_json)?;
    let mut config = PipelineConfig::default();
    config.surface.width = size.width;
    config.surface.height = size.height;
    config.dispatch.model = Some(model.unwrap_or(RASTER_MODEL).to_string());
    config.validate()?;

    SketchProcessor::new(config)
        .request(PredictionMode::Raster, &strokes)?
        .to_json()
}

/// Parse a JSON array of columnar strokes
pub fn parse_strokes(strokes_json: &str) -> SketchResult<Vec<Stroke>> {
    serde_json::from_str(strokes_json).map_err(|e| {
        if e.is_data() {
            SketchError::InvalidStroke(e.to_string())
        } else {
            SketchError::JsonError(e)
        }
    })
}

/// Build the request for the current state of a surface.
///
/// Raster mode always yields a request, blank when nothing is drawn. Sequence
/// mode yields `None` while there is no geometry to encode; the in-progress
/// stroke counts as geometry.
pub fn build_request(
    mode: PredictionMode,
    model: &str,
    surface: &DrawingSurface,
    config: &PipelineConfig,
) -> SketchResult<Option<PredictionRequest>> {
    match mode {
        PredictionMode::Raster => {
            let pixels = config
                .raster
                .normalizer()
                .normalize(surface.canvas(), surface.capture().bounds());
            debug!(ink = pixels.ink(), "built raster request");
            Ok(Some(PredictionRequest::Raster {
                pixels,
                model: model.to_string(),
            }))
        }
        PredictionMode::Sequence => {
            let strokes = surface.capture().snapshot();
            if strokes.is_empty() {
                debug!("no geometry yet, skipping sequence request");
                return Ok(None);
            }
            let sequence = config.sequence.encoder().encode(&strokes)?;
            debug!(steps = sequence.len(), "built sequence request");
            Ok(Some(PredictionRequest::Sequence {
                sequence,
                model: model.to_string(),
            }))
        }
    }
}

/// Stroke-to-request processor for batch use.
///
/// Each call replays the strokes onto a fresh surface built from the
/// configuration.
pub struct SketchProcessor {
    config: PipelineConfig,
}

impl Default for SketchProcessor {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl SketchProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Model used for `mode`: the configured one, else the mode's default
    pub fn model_for(&self, mode: PredictionMode) -> String {
        self.config
            .dispatch
            .model
            .clone()
            .unwrap_or_else(|| mode.default_model().to_string())
    }

    /// Paint strokes onto a fresh surface
    pub fn replay(&self, strokes: &[Stroke]) -> DrawingSurface {
        let mut surface =
            DrawingSurface::new(self.config.surface.size(), self.config.surface.brush_width);
        for stroke in strokes {
            let Some((first, rest)) = stroke.points().split_first() else {
                continue;
            };
            surface.pointer_down(*first);
            for p in rest {
                surface.pointer_move(*p);
            }
            surface.pointer_up();
        }
        surface
    }

    /// Build a request for `strokes`.
    ///
    /// Unlike an interactive round, an empty sequence-mode drawing is an
    /// error here (`SketchError::EmptyDrawing`).
    pub fn request(&self, mode: PredictionMode, strokes: &[Stroke]) -> SketchResult<PredictionRequest> {
        let model = self.model_for(mode);
        match mode {
            // Raw geometry is encoded as given, without surface clipping
            PredictionMode::Sequence => {
                let sequence = self.config.sequence.encoder().encode(strokes)?;
                Ok(PredictionRequest::Sequence { sequence, model })
            }
            PredictionMode::Raster => {
                let surface = self.replay(strokes);
                build_request(mode, &model, &surface, &self.config)?
                    .ok_or(SketchError::EmptyDrawing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Point, TENSOR_LEN};
    use pretty_assertions::assert_eq;

    const TWO_STROKES: &str = r#"[
        {"x": [100, 150, 200, 250], "y": [100, 140, 100, 140]},
        {"x": [120, 230], "y": [300, 300]}
    ]"#;

    #[test]
    fn test_strokes_to_sequence_payload() {
        let body = strokes_to_sequence_payload(TWO_STROKES, None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["model"], "model2");
        let steps = value["sequence"].as_array().unwrap();
        let lifts = steps.iter().filter(|s| s[2] == 1).count();
        assert_eq!(lifts, 2);
    }

    #[test]
    fn test_strokes_to_pixels_payload() {
        let body =
            strokes_to_pixels_payload(TWO_STROKES, SurfaceSize::new(400, 400), Some("model1"))
                .unwrap();
        let request = PredictionRequest::from_json(&body).unwrap();

        assert_eq!(request.model(), "model1");
        match request {
            PredictionRequest::Raster { pixels, .. } => {
                assert_eq!(pixels.values().len(), TENSOR_LEN);
                assert!(pixels.ink() > 0.0);
            }
            other => panic!("expected raster request, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_drawing() {
        let err = strokes_to_sequence_payload("[]", None).unwrap_err();
        assert!(matches!(err, SketchError::EmptyDrawing));

        // An empty raster is still a valid (blank) request
        let body = strokes_to_pixels_payload("[]", SurfaceSize::new(100, 100), None).unwrap();
        let request = PredictionRequest::from_json(&body).unwrap();
        assert!(matches!(
            request,
            PredictionRequest::Raster { ref pixels, .. } if pixels.is_blank()
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            strokes_to_sequence_payload("not json", None),
            Err(SketchError::JsonError(_))
        ));
        assert!(matches!(
            strokes_to_sequence_payload(r#"[{"x": [1, 2], "y": [1]}]"#, None),
            Err(SketchError::InvalidStroke(_))
        ));
        assert!(matches!(
            strokes_to_pixels_payload("[]", SurfaceSize::new(0, 10), None),
            Err(SketchError::Config(_))
        ));
    }

    #[test]
    fn test_build_request_sequence_needs_geometry() {
        let config = PipelineConfig::default();
        let mut surface = DrawingSurface::new(config.surface.size(), 20.0);

        let request = build_request(PredictionMode::Sequence, "model2", &surface, &config).unwrap();
        assert!(request.is_none());

        // In-progress stroke counts
        surface.pointer_down(Point::new(40.0, 40.0));
        surface.pointer_move(Point::new(90.0, 60.0));
        let request = build_request(PredictionMode::Sequence, "model2", &surface, &config)
            .unwrap()
            .unwrap();
        assert_eq!(request.mode(), PredictionMode::Sequence);
    }

    #[test]
    fn test_build_request_raster_when_blank() {
        let config = PipelineConfig::default();
        let surface = DrawingSurface::new(config.surface.size(), 20.0);
        let request = build_request(PredictionMode::Raster, "model1", &surface, &config)
            .unwrap()
            .unwrap();
        assert!(matches!(
            request,
            PredictionRequest::Raster { ref pixels, .. } if pixels.is_blank()
        ));
    }

    #[test]
    fn test_processor_uses_configured_model() {
        let mut config = PipelineConfig::default();
        config.dispatch.model = Some("sketch-rnn-v2".to_string());
        let processor = SketchProcessor::new(config);
        let strokes = parse_strokes(TWO_STROKES).unwrap();

        let request = processor.request(PredictionMode::Sequence, &strokes).unwrap();
        assert_eq!(request.model(), "sketch-rnn-v2");
        assert_eq!(processor.model_for(PredictionMode::Raster), "sketch-rnn-v2");
        assert_eq!(SketchProcessor::default().model_for(PredictionMode::Raster), "model1");
    }

    #[test]
    fn test_replay_paints_strokes() {
        let strokes = parse_strokes(TWO_STROKES).unwrap();
        let surface = SketchProcessor::default().replay(&strokes);

        assert_eq!(surface.capture().strokes().len(), 2);
        assert!(surface.canvas().inked_pixels() > 0);
    }
}
