//! Prediction dispatch
//!
//! Request/response shapes exchanged with the classifier service, the
//! transport seam hosts plug into, and the cooldown gate that rate-limits
//! dispatch while the pointer is dragging.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::{SketchError, SketchResult};
use crate::session::{GameSession, SessionEffect};
use crate::types::{NormalizedTensor, StrokeSequence};

/// Model identifier of the convolutional (raster) classifier
pub const RASTER_MODEL: &str = "model1";

/// Model identifier of the recurrent (sequence) classifier
pub const SEQUENCE_MODEL: &str = "model2";

/// Minimum interval between drag-triggered dispatches
pub const DEFAULT_COOLDOWN_MS: i64 = 1500;

const MISSING_INPUT: &str = "Missing 'pixels' or 'sequence' in request";

/// Which classifier input a round produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    #[default]
    Raster,
    Sequence,
}

impl PredictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMode::Raster => "raster",
            PredictionMode::Sequence => "sequence",
        }
    }

    /// Model the service pairs with this mode
    pub fn default_model(&self) -> &'static str {
        match self {
            PredictionMode::Raster => RASTER_MODEL,
            PredictionMode::Sequence => SEQUENCE_MODEL,
        }
    }
}

impl FromStr for PredictionMode {
    type Err = SketchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raster" | "pixels" | "cnn" => Ok(PredictionMode::Raster),
            "sequence" | "rnn" => Ok(PredictionMode::Sequence),
            other => Err(SketchError::Config(format!(
                "unknown prediction mode '{other}' (expected raster or sequence)"
            ))),
        }
    }
}

/// Body of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionRequest {
    Raster {
        pixels: NormalizedTensor,
        model: String,
    },
    Sequence {
        sequence: StrokeSequence,
        model: String,
    },
}

/// Loose wire form accepted from clients before validation
#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(default)]
    pixels: Option<Vec<f32>>,
    #[serde(default)]
    sequence: Option<StrokeSequence>,
    #[serde(default)]
    model: Option<String>,
}

impl TryFrom<RawRequest> for PredictionRequest {
    type Error = SketchError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        let model = raw.model.unwrap_or_else(|| RASTER_MODEL.to_string());
        // Pixels win when both inputs are present
        if let Some(pixels) = raw.pixels {
            return Ok(PredictionRequest::Raster {
                pixels: NormalizedTensor::try_from(pixels)?,
                model,
            });
        }
        match raw.sequence {
            Some(sequence) => Ok(PredictionRequest::Sequence { sequence, model }),
            None => Err(SketchError::InvalidRequest(MISSING_INPUT.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for PredictionRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawRequest::deserialize(deserializer)?;
        Self::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl PredictionRequest {
    /// Parse and validate a request body
    pub fn from_json(json: &str) -> SketchResult<Self> {
        let raw: RawRequest = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn to_json(&self) -> SketchResult<String> {
        serde_json::to_string(self).map_err(SketchError::JsonError)
    }

    pub fn mode(&self) -> PredictionMode {
        match self {
            PredictionRequest::Raster { .. } => PredictionMode::Raster,
            PredictionRequest::Sequence { .. } => PredictionMode::Sequence,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            PredictionRequest::Raster { model, .. } | PredictionRequest::Sequence { model, .. } => {
                model
            }
        }
    }
}

/// One ranked classifier guess
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Case-insensitive label match
    pub fn is_label(&self, label: &str) -> bool {
        self.label.eq_ignore_ascii_case(label)
    }
}

/// Validate a response and order it by descending confidence.
///
/// The sort is stable, so equal confidences keep the service's order.
pub fn validate_predictions(mut predictions: Vec<Prediction>) -> SketchResult<Vec<Prediction>> {
    if let Some(bad) = predictions
        .iter()
        .find(|p| !p.confidence.is_finite() || !(0.0..=1.0).contains(&p.confidence))
    {
        return Err(SketchError::InvalidResponse(format!(
            "confidence {} for '{}' outside [0, 1]",
            bad.confidence, bad.label
        )));
    }
    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(predictions)
}

/// Parse a response body: a JSON array of `{label, confidence}`
pub fn parse_predictions(json: &str) -> SketchResult<Vec<Prediction>> {
    let predictions: Vec<Prediction> = serde_json::from_str(json)
        .map_err(|e| SketchError::InvalidResponse(e.to_string()))?;
    validate_predictions(predictions)
}

/// Build a ranked response from per-class probabilities, confidences
/// rounded to four decimals.
pub fn rank_predictions(labels: &[String], probabilities: &[f64]) -> Vec<Prediction> {
    let mut ranked: Vec<Prediction> = labels
        .iter()
        .zip(probabilities)
        .map(|(label, p)| Prediction::new(label.clone(), (p * 10_000.0).round() / 10_000.0))
        .collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    ranked
}

/// Transport that carries a request to the classifier
pub trait PredictionTransport {
    fn predict(&mut self, request: &PredictionRequest) -> SketchResult<Vec<Prediction>>;
}

impl<F> PredictionTransport for F
where
    F: FnMut(&PredictionRequest) -> SketchResult<Vec<Prediction>>,
{
    fn predict(&mut self, request: &PredictionRequest) -> SketchResult<Vec<Prediction>> {
        self(request)
    }
}

/// A dispatched request awaiting its response
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPrediction {
    pub ticket: u64,
    pub request: PredictionRequest,
    pub issued_at: DateTime<Utc>,
}

/// Minimum-interval rate limiter for drag-triggered dispatch
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last: Option<DateTime<Utc>>,
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_COOLDOWN_MS))
    }
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Open the gate if strictly more than the cooldown has passed since it
    /// last opened. The first call always opens it.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        let open = match self.last {
            Some(last) => now - last > self.cooldown,
            None => true,
        };
        if open {
            self.last = Some(now);
        }
        open
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Runs dispatch effects through a transport and feeds results back
pub struct PredictionDispatcher<T> {
    transport: T,
}

impl<T: PredictionTransport> PredictionDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform one round trip and apply the result to the session.
    ///
    /// Transport errors are handed to the session as failures and never
    /// propagate past this point.
    pub fn deliver(
        &mut self,
        session: &mut GameSession,
        pending: PendingPrediction,
    ) -> Vec<SessionEffect> {
        debug!(
            ticket = pending.ticket,
            mode = pending.request.mode().as_str(),
            "dispatching prediction"
        );
        let result = self.transport.predict(&pending.request);
        if let Err(e) = &result {
            warn!(ticket = pending.ticket, error = %e, "prediction round trip failed");
        }
        session.on_prediction(pending.ticket, result)
    }

    /// Deliver every dispatch effect in order and return the rest.
    ///
    /// Effects produced while delivering are processed too, so the returned
    /// list only ever contains `Finish` effects.
    pub fn drive(
        &mut self,
        session: &mut GameSession,
        effects: Vec<SessionEffect>,
    ) -> Vec<SessionEffect> {
        let mut queue: std::collections::VecDeque<SessionEffect> = effects.into();
        let mut remaining = Vec::new();
        while let Some(effect) = queue.pop_front() {
            match effect {
                SessionEffect::Dispatch(pending) => queue.extend(self.deliver(session, pending)),
                finish => remaining.push(finish),
            }
        }
        remaining
    }
}
