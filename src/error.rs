//! Typed failures of the detection pipeline.
//!
//! - `InitError`: fatal, raised before the loop starts. Never enters `Running`.
//! - `InferenceError`: one frame could not be analysed. The loop continues.
//! - `MalformedDetection`: one record from the model failed validation and was dropped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("no network connectivity: {reason}")]
    Connectivity { reason: String },

    #[error("failed to load detection model '{backend}': {reason}")]
    ModelLoad { backend: String, reason: String },

    #[error("failed to open frame source '{uri}': {reason}")]
    SourceOpen { uri: String, reason: String },

    #[error("failed to open display '{sink}': {reason}")]
    SinkOpen { sink: String, reason: String },
}

impl InitError {
    /// Suggested next steps for the operator.
    pub fn remediation(&self) -> &'static [&'static str] {
        match self {
            InitError::Connectivity { .. } => &[
                "Check your internet connection",
                "Run with --offline when the model is already cached locally",
            ],
            InitError::ModelLoad { .. } => &[
                "Check the model path, download URL and sha256 in the configuration",
                "Rebuild with --features backend-tract to enable ONNX inference",
                "Try again; a partial download is discarded and fetched again",
            ],
            InitError::SourceOpen { .. } => &[
                "Check that the camera is connected and not in use by another program",
                "Rebuild with --features ingest-v4l2 or --features opencv-io for device capture",
                "Use --source stub://camera to run against synthetic frames",
            ],
            InitError::SinkOpen { .. } => &[
                "Use --display headless when no graphical session is available",
                "Rebuild with --features opencv-io for a live window",
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("detection model used before it was loaded")]
    NotLoaded,

    #[error("inference failed: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum MalformedDetection {
    #[error("detection has an empty class name")]
    EmptyName,

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f32),

    #[error("bounding box has a non-finite coordinate")]
    NonFiniteCoordinate,

    #[error("bounding box ({x1},{y1})-({x2},{y2}) is empty or inverted")]
    EmptyBox { x1: i32, y1: i32, x2: i32, y2: i32 },
}
