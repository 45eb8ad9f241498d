//! Pipeline configuration.
//!
//! Every section falls back to the game's stock constants, so an empty JSON
//! object is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::DEFAULT_BRUSH_WIDTH;
use crate::dispatch::{PredictionMode, DEFAULT_COOLDOWN_MS};
use crate::encoder::SequenceEncoder;
use crate::error::{SketchError, SketchResult};
use crate::normalizer::{RasterNormalizer, DEFAULT_PADDING};
use crate::resampler::{StrokeResampler, DEFAULT_MIN_SPACING};
use crate::simplifier::{RdpSimplifier, DEFAULT_EPSILON};
use crate::types::SurfaceSize;

/// Class labels the stock classifiers were trained on
pub const DEFAULT_LABELS: [&str; 20] = [
    "cat",
    "tree",
    "fish",
    "clock",
    "castle",
    "crown",
    "lollipop",
    "moon",
    "watermelon",
    "tornado",
    "apple",
    "bowtie",
    "bicycle",
    "diamond",
    "flower",
    "butterfly",
    "eye",
    "lightning",
    "cloud",
    "pizza",
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Drawing surface settings.
    pub surface: SurfaceConfig,

    /// Raster normalization settings.
    pub raster: RasterConfig,

    /// Sequence encoding settings.
    pub sequence: SequenceConfig,

    /// Round rules.
    pub round: RoundConfig,

    /// Request settings.
    pub dispatch: DispatchConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Drawing surface settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,

    /// Brush diameter in pixels.
    pub brush_width: f64,
}

/// Raster normalization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Padding around the ink before cropping.
    pub padding: f64,
}

/// Sequence encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// RDP tolerance.
    pub epsilon: f64,

    /// Minimum distance between resampled points.
    pub min_spacing: f64,
}

/// Round rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    pub duration_secs: u32,

    /// Minimum interval between drag-triggered predictions.
    pub cooldown_ms: u32,

    /// Confidence the top guess needs to win.
    pub win_threshold: f64,

    /// Class labels, in classifier output order.
    pub labels: Vec<String>,
}

/// Request settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: PredictionMode,

    /// Model identifier; the mode's default model when unset.
    pub model: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "sketch_prep=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            brush_width: DEFAULT_BRUSH_WIDTH,
        }
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            min_spacing: DEFAULT_MIN_SPACING,
        }
    }
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            duration_secs: 20,
            cooldown_ms: DEFAULT_COOLDOWN_MS as u32,
            win_threshold: 0.8,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SurfaceConfig {
    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.width, self.height)
    }
}

impl RasterConfig {
    pub fn normalizer(&self) -> RasterNormalizer {
        RasterNormalizer::with_padding(self.padding)
    }
}

impl SequenceConfig {
    pub fn encoder(&self) -> SequenceEncoder {
        SequenceEncoder::with_stages(
            RdpSimplifier::with_epsilon(self.epsilon),
            StrokeResampler::with_min_spacing(self.min_spacing),
        )
    }
}

impl DispatchConfig {
    /// Configured model, or the one paired with the mode
    pub fn model_id(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.mode.default_model())
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> SketchResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SketchError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load, parse, and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> SketchResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SketchError::Config(format!("failed to read config at {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> SketchResult<()> {
        if self.surface.width == 0 || self.surface.height == 0 {
            return Err(SketchError::Config(format!(
                "surface must be non-empty, got {}x{}",
                self.surface.width, self.surface.height
            )));
        }
        let non_negative = [
            ("surface.brush_width", self.surface.brush_width),
            ("raster.padding", self.raster.padding),
            ("sequence.epsilon", self.sequence.epsilon),
            ("sequence.min_spacing", self.sequence.min_spacing),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SketchError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.round.duration_secs == 0 {
            return Err(SketchError::Config(
                "round.duration_secs must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.round.win_threshold) {
            return Err(SketchError::Config(format!(
                "round.win_threshold must be within [0, 1], got {}",
                self.round.win_threshold
            )));
        }
        if self.round.labels.is_empty() {
            return Err(SketchError::Config(
                "round.labels must name at least one class".to_string(),
            ));
        }
        if let Some(model) = &self.dispatch.model {
            if model.trim().is_empty() {
                return Err(SketchError::Config(
                    "dispatch.model must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Look up a label case-insensitively, returning its canonical spelling
    pub fn find_label(&self, label: &str) -> Option<&str> {
        self.round
            .labels
            .iter()
            .find(|l| l.eq_ignore_ascii_case(label))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_stock_game() {
        let config = PipelineConfig::default();
        assert_eq!(config.round.labels.len(), 20);
        assert_eq!(config.round.duration_secs, 20);
        assert_eq!(config.round.cooldown_ms, 1500);
        assert_eq!(config.round.win_threshold, 0.8);
        assert_eq!(config.surface.brush_width, 20.0);
        assert_eq!(config.raster.padding, 10.0);
        assert_eq!(config.sequence.epsilon, 2.0);
        assert_eq!(config.sequence.min_spacing, 1.0);
        assert_eq!(config.dispatch.model_id(), "model1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{"dispatch": {"mode": "sequence"}, "round": {"win_threshold": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.dispatch.mode, PredictionMode::Sequence);
        assert_eq!(config.dispatch.model_id(), "model2");
        assert_eq!(config.round.win_threshold, 0.5);
        assert_eq!(config.round.duration_secs, 20);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(PipelineConfig::from_json("{}").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            r#"{"surface": {"width": 0}}"#,
            r#"{"sequence": {"epsilon": -1.0}}"#,
            r#"{"round": {"win_threshold": 1.5}}"#,
            r#"{"round": {"labels": []}}"#,
            r#"{"round": {"duration_secs": 0}}"#,
            r#"{"dispatch": {"model": "  "}}"#,
            r#"{"dispatch": {"mode": "vector"}}"#,
        ];
        for json in bad {
            let err = PipelineConfig::from_json(json).unwrap_err();
            assert!(matches!(err, SketchError::Config(_)), "{json}: {err}");
        }
    }

    #[test]
    fn test_find_label_is_case_insensitive() {
        let config = PipelineConfig::default();
        assert_eq!(config.find_label("BowTie"), Some("bowtie"));
        assert_eq!(config.find_label("dog"), None);
    }

    #[test]
    fn test_from_file_missing_path() {
        let err = PipelineConfig::from_file("/nonexistent/sketch-prep.json").unwrap_err();
        assert!(matches!(err, SketchError::Config(_)));
    }
}
