//! Road Damage Reporting Kernel
//!
//! Turns uploaded road photos into persisted damage reports and tracks their
//! review status.
//!
//! # Architecture
//!
//! An upload flows through a fixed sequence of components, each built around
//! injected collaborators:
//!
//! 1. **Decode**: the image codec rejects anything that is not an image.
//! 2. **Detect**: `DetectionAdapter` runs the damage detector and keeps
//!    detections scoring above 0.15.
//! 3. **Locate**: `GeoResolver` reads GPS tags and reverse-geocodes them,
//!    degrading to "Unknown" instead of failing.
//! 4. **Build**: `ReportBuilder` assembles the report; damage type and the
//!    annotated image reference are derived from the detections.
//! 5. **Persist**: `ReportStore` assigns the identifier and normalizes every
//!    stored record into one canonical shape.
//!
//! `StatusWorkflow` changes a report's status after creation; it is the only
//! path that does.
//!
//! # Module Structure
//!
//! - `detect`: detector backends and output normalization
//! - `geo`: GPS metadata and reverse geocoding
//! - `report`: report entity, identifiers, statuses, builder
//! - `storage`: document stores and the report store
//! - `pipeline`, `workflow`, `auth`: the outward operations

use anyhow::Result;
use rand::RngCore;
use rusqlite::{Connection, OpenFlags};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod artifacts;
pub mod auth;
pub mod codec;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod geo;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod workflow;

pub use artifacts::{ArtifactConfig, ArtifactRef, ArtifactStore, FilesystemArtifactStore};
pub use auth::{CredentialVerifier, OperatorConsole, OperatorSession};
pub use config::KernelSettings;
pub use detect::{
    BoundingBox, Detection, DetectionAdapter, DetectorBackend, RawDetection, StubBackend,
};
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use geo::{GeoResolver, GeoResult};
pub use pipeline::IngestionPipeline;
pub use report::{
    DamageType, NewReport, Report, ReportBuilder, ReportDetails, ReportId, ReportStatus,
};
pub use storage::{
    DocumentStore, InMemoryDocumentStore, ReportFilter, ReportStore, SqliteDocumentStore,
    UpdateOutcome,
};
pub use workflow::{StatusWorkflow, TransitionPolicy};

pub fn shared_memory_uri() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "file:roadscan_{:x}?mode=memory&cache=shared",
        u64::from_le_bytes(bytes)
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    if db_path.starts_with("file:") {
        return Ok(Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?);
    }
    Ok(Connection::open(db_path)?)
}

pub(crate) fn now_s() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
