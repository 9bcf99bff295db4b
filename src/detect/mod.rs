//! Damage detection: backend trait, backends, and the adapter that
//! normalizes backend output into typed detections.

mod adapter;
mod backend;
pub mod backends;
mod result;

pub use adapter::{DetectionAdapter, CONFIDENCE_THRESHOLD};
pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Detection, RawDetection};
