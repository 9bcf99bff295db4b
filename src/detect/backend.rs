use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::{ChannelOrder, Frame};

/// Detector backend trait.
///
/// A backend wraps one model instance. Most runtimes are not reentrant, so
/// `infer` takes `&mut self` and the adapter serializes calls behind a
/// `Mutex`.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Channel order the model consumes. The adapter packs frames to match.
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Bgr
    }

    /// Run inference on a frame.
    ///
    /// Returned boxes are in frame pixel coordinates. Backends should drop
    /// candidates scoring below `confidence_threshold`; the adapter filters
    /// again regardless.
    fn infer(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
