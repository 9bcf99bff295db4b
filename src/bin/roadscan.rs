//! roadscan - road damage report kernel CLI
//!
//! Ingests road photos into damage reports, lists and shows stored reports,
//! and changes their review status. Configuration comes from
//! `ROADSCAN_CONFIG` and the `ROADSCAN_*` overrides.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use roadscan_kernel::{
    ArtifactConfig, DetectionAdapter, FilesystemArtifactStore, IngestionPipeline, KernelSettings,
    ReportFilter, ReportId, ReportStore, StatusWorkflow,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Road damage report kernel")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an image through detection and geolocation and store the report.
    Ingest {
        image: PathBuf,
        /// Submitter identity recorded on the report.
        #[arg(long)]
        submitter: Option<String>,
    },
    /// Print one report as JSON.
    Show { id: String },
    /// Print reports as JSON, one per line.
    List {
        /// Only reports from this submitter.
        #[arg(long)]
        submitter: Option<String>,
    },
    /// Change a report's status (Pending, InProgress, Resolved).
    SetStatus { id: String, status: String },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = KernelSettings::load()?;
    let store = Arc::new(ReportStore::open_sqlite(&settings.db_path)?);

    match args.command {
        Command::Ingest { image, submitter } => {
            let bytes =
                std::fs::read(&image).with_context(|| format!("read {}", image.display()))?;
            let artifacts = FilesystemArtifactStore::new(ArtifactConfig {
                local_path: settings.artifact_dir.clone(),
            })?;
            let pipeline = IngestionPipeline::new(
                load_detector(&settings),
                settings.geo_resolver()?,
                Box::new(artifacts),
                store,
            );
            let report = pipeline.ingest(&bytes, submitter.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Show { id } => {
            let id: ReportId = id.parse()?;
            let report = store.find_by_id(id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::List { submitter } => {
            let filter = submitter
                .as_deref()
                .map(ReportFilter::by_submitter)
                .unwrap_or_default();
            for report in store.find_all(filter).iter()? {
                println!("{}", serde_json::to_string(&report)?);
            }
        }
        Command::SetStatus { id, status } => {
            let id: ReportId = id.parse()?;
            let workflow = StatusWorkflow::with_policy(store, settings.status_policy);
            let outcome = workflow.set_status(id, &status)?;
            println!("{:?}", outcome);
        }
    }
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn load_detector(settings: &KernelSettings) -> DetectionAdapter {
    use roadscan_kernel::detect::TractBackend;

    match &settings.detector.model_path {
        Some(path) => DetectionAdapter::from_init(TractBackend::new(
            path,
            settings.detector.input_width,
            settings.detector.input_height,
        )),
        None => DetectionAdapter::unavailable("no detector model configured"),
    }
}

#[cfg(not(feature = "backend-tract"))]
fn load_detector(settings: &KernelSettings) -> DetectionAdapter {
    if settings.detector.model_path.is_some() {
        log::warn!("detector model configured but built without the backend-tract feature");
    }
    DetectionAdapter::unavailable("built without a detector backend")
}
