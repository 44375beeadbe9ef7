//! ojo: real-time object detection on a camera feed.
//!
//! Each frame is read from a source, passed through a detection model,
//! filtered by confidence, labelled in the display language, annotated with
//! boxes and labels, reported on the console and shown on a display sink.
//!
//! # Module Structure
//!
//! - `frame`: BGR frame container
//! - `detect`: inference adapter, validated detections, confidence filter, backends
//! - `labels`: canonical class name to display name mapping
//! - `annotate`: box and label rendering
//! - `ingest`: frame sources (synthetic, V4L2, OpenCV)
//! - `display`: display sinks (headless, OpenCV window)
//! - `pipeline`: the state machine that drives one run
//! - `prereq`, `model_store`: startup checks and model fetch-and-cache
//! - `config`: layered configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod labels;
pub mod model_store;
pub mod pipeline;
pub mod prereq;
pub mod report;

pub use annotate::{Annotation, Annotator};
pub use config::OjoConfig;
pub use detect::{
    filter, BackendRegistry, BoundingBox, Candidate, ConfidenceThreshold, Detection,
    DetectorBackend, InferenceAdapter, ModelLoader, RawDetection, RawDetections, StubBackend,
    StubLoader,
};
pub use display::{open_display, DisplayMode, DisplaySettings, DisplaySink, HeadlessDisplay};
pub use error::{InferenceError, InitError, MalformedDetection};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SourceSettings, SyntheticSource};
pub use labels::{LabelMap, Localizer};
pub use model_store::ModelStore;
pub use pipeline::{
    Collaborators, FrameOutcome, FrameProcessor, Pipeline, PipelineSettings, PipelineState,
    RunSummary, StopReason,
};
pub use prereq::{ConnectivityProbe, NoPrerequisite, Prerequisite};
pub use report::DetectionReport;

#[cfg(feature = "backend-tract")]
pub use detect::backends::{TractBackend, TractLoader};
