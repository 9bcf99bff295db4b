//! Ingestion orchestrator: raw upload bytes in, persisted report out.

use std::sync::Arc;
use std::thread;

use crate::artifacts::{self, ArtifactRef, ArtifactStore};
use crate::codec::{self, DecodedImage};
use crate::detect::{DetectionAdapter, Detection};
use crate::error::{PipelineError, PipelineResult};
use crate::geo::{GeoResolver, GeoResult};
use crate::report::{Report, ReportBuilder};
use crate::storage::ReportStore;

pub struct IngestionPipeline {
    detector: DetectionAdapter,
    geo: GeoResolver,
    artifacts: Box<dyn ArtifactStore>,
    store: Arc<ReportStore>,
}

impl IngestionPipeline {
    pub fn new(
        detector: DetectionAdapter,
        geo: GeoResolver,
        artifacts: Box<dyn ArtifactStore>,
        store: Arc<ReportStore>,
    ) -> Self {
        Self {
            detector,
            geo,
            artifacts,
            store,
        }
    }

    pub fn store(&self) -> &Arc<ReportStore> {
        &self.store
    }

    /// Turn an upload into a persisted report.
    ///
    /// Either the complete report is stored and returned, or nothing is stored
    /// and a typed error comes back. Artifacts written before a later failure
    /// stay on disk.
    pub fn ingest(&self, image_bytes: &[u8], submitter: Option<&str>) -> PipelineResult<Report> {
        let decoded = codec::decode(image_bytes).map_err(|e| {
            log::info!("rejecting upload: {:#}", e);
            PipelineError::invalid_image(format!("{:#}", e))
        })?;

        let detections = self.detector.detect(&decoded.image)?;

        let original_name = artifacts::unique_name(decoded.extension());
        let original = self.put_artifact(&original_name, image_bytes)?;
        log::info!(
            "ingesting {} ({}x{}, {} detection(s))",
            original.name,
            decoded.image.width(),
            decoded.image.height(),
            detections.len()
        );

        // Geolocation reads the stored original while the annotated copy is
        // rendered and written.
        let (geo, rendered) = thread::scope(|scope| {
            let geo = scope.spawn(|| self.geo.resolve(&original.path));
            let rendered = self.render(&decoded, &detections, &original);
            let geo = geo.join().unwrap_or_else(|_| {
                log::warn!("geolocation degraded: resolver panicked");
                GeoResult::Unknown
            });
            (geo, rendered)
        });
        let rendered = rendered?;

        let new_report = ReportBuilder::build(
            &original.name,
            submitter,
            &detections,
            rendered.as_ref().map(|r| r.name.as_str()),
            &geo,
        );
        let id = self.store.create(&new_report)?;
        let report = new_report.into_report(id);
        log::info!(
            "report {} created: {} ({})",
            id,
            report.damage_type(),
            report.details().location
        );
        Ok(report)
    }

    fn render(
        &self,
        decoded: &DecodedImage,
        detections: &[Detection],
        original: &ArtifactRef,
    ) -> PipelineResult<Option<ArtifactRef>> {
        if detections.is_empty() {
            return Ok(None);
        }
        let annotated = self.detector.render_boxes(&decoded.image, detections);
        let bytes = codec::encode(&annotated, decoded.format)
            .map_err(|e| PipelineError::storage(format!("render {}: {:#}", original.name, e)))?;
        self.put_artifact(&artifacts::detected_name(&original.name), &bytes)
            .map(Some)
    }

    fn put_artifact(&self, name: &str, bytes: &[u8]) -> PipelineResult<ArtifactRef> {
        self.artifacts.put(name, bytes).map_err(|e| {
            log::error!("artifact write failed: {:#}", e);
            PipelineError::storage(format!("{:#}", e))
        })
    }
}
