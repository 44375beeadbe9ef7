mod adapter;
mod backend;
pub mod backends;
mod filter;
mod registry;
mod result;

pub use adapter::{InferenceAdapter, RawDetections};
pub use backend::{DetectorBackend, ModelLoader};
pub use backends::{StubBackend, StubLoader};
pub use filter::{filter, ConfidenceThreshold, DEFAULT_CONFIDENCE_THRESHOLD};
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Candidate, Detection, RawDetection};
