//! sketch.pointer_event.v1 schema definitions

use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Schema version identifier
pub const SCHEMA_VERSION: &str = "sketch.pointer_event.v1";

/// Pointer gesture phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

impl PointerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointerPhase::Down => "down",
            PointerPhase::Move => "move",
            PointerPhase::Up => "up",
        }
    }

    /// Whether events of this phase carry coordinates
    pub fn needs_position(&self) -> bool {
        !matches!(self, PointerPhase::Up)
    }
}

/// The sketch.pointer_event.v1 record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Schema version identifier
    pub schema_version: String,
    /// Unique event identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub phase: PointerPhase,
    /// Surface x coordinate (down/move only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Surface y coordinate (down/move only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Milliseconds since the round started
    pub t_ms: u64,
}

impl PointerEvent {
    fn new(phase: PointerPhase, position: Option<Point>, t_ms: u64) -> Self {
        PointerEvent {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: None,
            phase,
            x: position.map(|p| p.x),
            y: position.map(|p| p.y),
            t_ms,
        }
    }

    /// Pointer pressed at `(x, y)`
    pub fn down(x: f64, y: f64, t_ms: u64) -> Self {
        Self::new(PointerPhase::Down, Some(Point::new(x, y)), t_ms)
    }

    /// Pointer dragged to `(x, y)`
    pub fn moved(x: f64, y: f64, t_ms: u64) -> Self {
        Self::new(PointerPhase::Move, Some(Point::new(x, y)), t_ms)
    }

    /// Pointer released
    pub fn up(t_ms: u64) -> Self {
        Self::new(PointerPhase::Up, None, t_ms)
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Position, when both coordinates are present
    pub fn point(&self) -> Option<Point> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        }
    }

    /// Validate the event
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if self.phase.needs_position() {
            let Some(p) = self.point() else {
                return Err(ValidationError::MissingPosition {
                    phase: self.phase.as_str().to_string(),
                });
            };
            if !p.is_finite() {
                return Err(ValidationError::NonFinitePosition { x: p.x, y: p.y });
            }
        }
        Ok(())
    }
}

/// Validation errors for pointer events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Pointer {phase} event needs both x and y")]
    MissingPosition { phase: String },

    #[error("Non-finite position ({x}, {y})")]
    NonFinitePosition { x: f64, y: f64 },

    #[error("Timestamp went backwards: {current} ms after {previous} ms")]
    TimeWentBackwards { previous: u64, current: u64 },
}
