pub mod coco;
pub mod stub;
#[cfg_attr(not(feature = "backend-tract"), allow(dead_code))]
pub(crate) mod yolo;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{StubBackend, StubLoader};

#[cfg(feature = "backend-tract")]
pub use tract::{TractBackend, TractLoader};
