use std::sync::{Arc, Mutex};

use image::RgbImage;

use crate::codec::{self, BOX_COLOR, BOX_THICKNESS};
use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, RawDetection};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

/// Detections scoring at or below this value are never returned.
pub const CONFIDENCE_THRESHOLD: f32 = 0.15;

/// Runs the detector backend on decoded uploads and normalizes its output.
///
/// The adapter owns one backend instance behind a mutex. When the backend
/// failed to initialize, the adapter is built in the unavailable state and
/// every `detect` call fails with `ModelUnavailable`.
#[derive(Clone)]
pub struct DetectionAdapter {
    backend: Result<Arc<Mutex<dyn DetectorBackend>>, String>,
}

impl DetectionAdapter {
    pub fn new<B: DetectorBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Ok(Arc::new(Mutex::new(backend))),
        }
    }

    /// Adapter for a detector that could not be loaded.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            backend: Err(reason.into()),
        }
    }

    /// Wrap the outcome of backend initialization, warming the backend up.
    pub fn from_init<B: DetectorBackend + 'static>(init: anyhow::Result<B>) -> Self {
        match init.and_then(|mut backend| backend.warm_up().map(|_| backend)) {
            Ok(backend) => {
                log::info!("detector backend '{}' ready", backend.name());
                Self::new(backend)
            }
            Err(err) => {
                log::error!("detector failed to load: {:#}", err);
                Self::unavailable(format!("{:#}", err))
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_ok()
    }

    /// Detect damage on an RGB image.
    ///
    /// The image is repacked into the backend's channel order; the input is
    /// not modified. Output keeps the backend's ordering.
    pub fn detect(&self, image: &RgbImage) -> PipelineResult<Vec<Detection>> {
        let backend = self
            .backend
            .as_ref()
            .map_err(|reason| PipelineError::model_unavailable(reason))?;
        let mut guard = backend
            .lock()
            .map_err(|_| PipelineError::model_unavailable("detector lock poisoned"))?;

        let frame = Frame::from_rgb(image, guard.channel_order());
        let raw = guard
            .infer(&frame, CONFIDENCE_THRESHOLD)
            .map_err(|err| {
                log::error!("detector '{}' inference failed: {:#}", guard.name(), err);
                PipelineError::model_unavailable(format!("{:#}", err))
            })?;
        drop(guard);

        let (width, height) = image.dimensions();
        let detections: Vec<Detection> = raw
            .into_iter()
            .filter_map(|candidate| normalize(candidate, width, height))
            .collect();
        log::debug!("detector returned {} detection(s)", detections.len());
        Ok(detections)
    }

    /// Draw every detection onto a copy of `image`.
    pub fn render_boxes(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut rendered = image.clone();
        for detection in detections {
            codec::draw_box(&mut rendered, &detection.bbox, BOX_COLOR, BOX_THICKNESS);
        }
        rendered
    }
}

fn normalize(raw: RawDetection, width: u32, height: u32) -> Option<Detection> {
    if !raw.confidence.is_finite() || raw.confidence <= CONFIDENCE_THRESHOLD {
        return None;
    }
    if ![raw.x1, raw.y1, raw.x2, raw.y2].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (x1, x2) = pixel_span(raw.x1, raw.x2, width);
    let (y1, y2) = pixel_span(raw.y1, raw.y2, height);
    Some(Detection {
        bbox: BoundingBox { x1, y1, x2, y2 },
        confidence: raw.confidence.min(1.0),
    })
}

/// Truncate to integer pixels, clamp into `[0, extent]`, keep at least 1px.
fn pixel_span(a: f32, b: f32, extent: u32) -> (i32, i32) {
    let extent = extent.max(1) as i32;
    let lo = (a.min(b) as i32).clamp(0, extent - 1);
    let hi = (a.max(b) as i32).clamp(lo + 1, extent);
    (lo, hi)
}
