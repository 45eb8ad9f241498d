//! Sketch Prep - drawing-to-classifier input pipeline
//!
//! Sketch Prep turns freehand pointer input into the two input formats sketch
//! classifiers consume, and runs the timed guessing round around them:
//! stroke capture → raster normalization (28x28 tensor) or stroke
//! simplification → resampling → delta/pen sequence encoding → dispatch.
//!
//! ## Modules
//!
//! - **Capture**: `capture`, `canvas`, `surface` record strokes and ink
//! - **Raster path**: `normalizer` crops, downsamples, and inverts the bitmap
//! - **Sequence path**: `simplifier`, `resampler`, `encoder`
//! - **Round**: `session` state machine, `dispatch` request/response boundary
//! - **Batch**: `pipeline` one-shot functions, `schema` recorded pointer events

pub mod canvas;
pub mod capture;
pub mod config;
pub mod dispatch;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod normalizer;
pub mod pipeline;
pub mod resampler;
pub mod schema;
pub mod session;
pub mod simplifier;
pub mod surface;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::PipelineConfig;
pub use dispatch::{
    Prediction, PredictionDispatcher, PredictionMode, PredictionRequest, PredictionTransport,
};
pub use encoder::SequenceEncoder;
pub use error::{SketchError, SketchResult};
pub use normalizer::RasterNormalizer;
pub use pipeline::{
    build_request, strokes_to_pixels_payload, strokes_to_sequence_payload, SketchProcessor,
};
pub use session::{GameSession, RoundOutcome, RoundState, SessionEffect};
pub use surface::DrawingSurface;
pub use types::{NormalizedTensor, Point, Stroke, StrokeSequence, SurfaceSize};

// Schema exports
pub use schema::{PointerEvent, PointerEventAdapter, SCHEMA_VERSION};

/// Library version reported by the CLI and FFI
pub const PREP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "sketch-prep";
