//! Adapter for replaying sketch.pointer_event.v1 records
//!
//! This module parses recorded pointer events and feeds them through a
//! drawing surface, so a recorded gesture yields the same strokes and bitmap
//! as the live one did.

use serde::Serialize;
use tracing::debug;

use crate::error::SketchError;
use crate::schema::pointer_event::*;
use crate::surface::DrawingSurface;

/// Adapter for converting pointer events into drawing state
pub struct PointerEventAdapter;

impl PointerEventAdapter {
    /// Parse a JSON string containing an array of PointerEvents
    pub fn parse_array(json: &str) -> Result<Vec<PointerEvent>, SketchError> {
        let events: Vec<PointerEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing PointerEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<PointerEvent>, SketchError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<PointerEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(SketchError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Validate a batch of events. Only failures are reported.
    ///
    /// Besides per-event checks, timestamps must never decrease.
    pub fn validate_events(events: &[PointerEvent]) -> Vec<ValidationResult> {
        let mut previous: Option<u64> = None;
        events
            .iter()
            .enumerate()
            .filter_map(|(idx, event)| {
                let mut result = event.validate().err();
                if let Some(prev) = previous {
                    if result.is_none() && event.t_ms < prev {
                        result = Some(ValidationError::TimeWentBackwards {
                            previous: prev,
                            current: event.t_ms,
                        });
                    }
                }
                previous = Some(previous.map_or(event.t_ms, |p| p.max(event.t_ms)));
                result.map(|error| ValidationResult {
                    index: idx,
                    event_id: event.event_id.clone(),
                    result: Some(error),
                })
            })
            .collect()
    }

    /// Feed events through a surface.
    ///
    /// Every event is validated first; the first invalid one aborts the
    /// replay before anything is drawn. Off-surface points and moves without
    /// a pressed pointer are counted as ignored.
    pub fn replay(
        events: &[PointerEvent],
        surface: &mut DrawingSurface,
    ) -> Result<ReplayStats, SketchError> {
        if let Some(invalid) = Self::validate_events(events).into_iter().next() {
            let reason = invalid
                .result
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(SketchError::ParseError(format!(
                "Invalid event at index {}: {}",
                invalid.index, reason
            )));
        }

        let mut stats = ReplayStats::default();
        for event in events {
            let accepted = match (event.phase, event.point()) {
                (PointerPhase::Down, Some(p)) => surface.pointer_down(p),
                (PointerPhase::Move, Some(p)) => surface.pointer_move(p),
                (PointerPhase::Up, _) => {
                    let sealed = surface.pointer_up();
                    if sealed {
                        stats.strokes += 1;
                    }
                    sealed
                }
                // validate() guarantees positions for down/move
                _ => false,
            };
            if accepted {
                stats.accepted += 1;
            } else {
                stats.ignored += 1;
            }
        }

        // A recording that stops mid-gesture still leaves its stroke behind
        if surface.capture().is_active() && surface.pointer_up() {
            stats.strokes += 1;
        }

        debug!(
            accepted = stats.accepted,
            ignored = stats.ignored,
            strokes = stats.strokes,
            "replayed pointer events"
        );
        Ok(stats)
    }
}

/// Result of event validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub event_id: Option<String>,
    pub result: Option<ValidationError>,
}

/// Counters from a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub accepted: usize,
    pub ignored: usize,
    /// Strokes sealed during the replay
    pub strokes: usize,
}
