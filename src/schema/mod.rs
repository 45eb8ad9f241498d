//! Versioned sketch.pointer_event.v1 schema
//!
//! This module defines the recorded input format for drawings: one record
//! per pointer-down, pointer-move, or pointer-up event, with timing.

mod adapter;
mod pointer_event;

pub use adapter::*;
pub use pointer_event::*;
