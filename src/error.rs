//! Error types for Sketch Prep

use thiserror::Error;

/// Errors that can occur while capturing, encoding, or dispatching a drawing
#[derive(Debug, Error)]
pub enum SketchError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid stroke: {0}")]
    InvalidStroke(String),

    #[error("Drawing has no strokes to encode")]
    EmptyDrawing,

    #[error("Invalid prediction request: {0}")]
    InvalidRequest(String),

    #[error("Invalid prediction response: {0}")]
    InvalidResponse(String),

    #[error("Prediction transport failed: {0}")]
    Transport(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using SketchError
pub type SketchResult<T> = Result<T, SketchError>;
