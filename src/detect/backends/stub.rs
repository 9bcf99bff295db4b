use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Stub backend for testing. Replays a fixed list of candidates on every call.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    script: Vec<RawDetection>,
    fail_with: Option<String>,
    calls: u64,
}

impl StubBackend {
    /// Backend that never finds anything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(script: Vec<RawDetection>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Backend whose every inference fails, as a crashed runtime would.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        if let Some(message) = &self.fail_with {
            return Err(anyhow!("{}", message));
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(anyhow!("empty frame"));
        }
        Ok(self
            .script
            .iter()
            .filter(|candidate| candidate.confidence >= confidence_threshold)
            .copied()
            .collect())
    }
}
