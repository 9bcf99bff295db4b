use std::sync::{Mutex, MutexGuard};

use serde_json::{json, Value};

use super::{Document, DocumentStore, Filter, InMemoryDocumentStore, SqliteDocumentStore};
use crate::detect::BoundingBox;
use crate::error::{PipelineError, PipelineResult};
use crate::geo::{UNKNOWN_LOCATION, UNKNOWN_PLACE};
use crate::report::{NewReport, Report, ReportDetails, ReportId, ReportStatus};

/// Collection holding report documents.
pub const REPORTS_COLLECTION: &str = "reports";

/// Outcome of a status update that reached the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    /// The report already had the requested status.
    Unchanged,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ReportFilter {
    #[default]
    All,
    Submitter(String),
}

impl ReportFilter {
    pub fn by_submitter(submitter: &str) -> Self {
        ReportFilter::Submitter(submitter.trim().to_string())
    }

    fn to_filter(&self) -> Filter {
        match self {
            ReportFilter::All => Filter::all(),
            ReportFilter::Submitter(who) => {
                Filter::all().eq_any(&["user_name", "user_email"], who.as_str())
            }
        }
    }
}

/// Create/read/update over reports.
///
/// The document store is held behind a mutex, so one `ReportStore` can be
/// shared across worker threads.
pub struct ReportStore {
    docs: Mutex<Box<dyn DocumentStore>>,
}

impl ReportStore {
    pub fn new(docs: Box<dyn DocumentStore>) -> Self {
        Self {
            docs: Mutex::new(docs),
        }
    }

    pub fn open_sqlite(db_path: &str) -> PipelineResult<Self> {
        let docs = SqliteDocumentStore::open(db_path, REPORTS_COLLECTION)
            .map_err(|e| PipelineError::storage(format!("{:#}", e)))?;
        Ok(Self::new(Box::new(docs)))
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryDocumentStore::new()))
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, Box<dyn DocumentStore>>> {
        self.docs
            .lock()
            .map_err(|_| PipelineError::storage("report store lock poisoned"))
    }

    /// Persist a new report and return its freshly assigned identifier.
    pub fn create(&self, report: &NewReport) -> PipelineResult<ReportId> {
        let doc = report_to_document(report.details(), report.status());
        let id = self
            .lock()?
            .insert(&doc)
            .map_err(|e| PipelineError::storage(format!("insert report: {:#}", e)))?;
        log::debug!("stored report {}", id);
        Ok(id)
    }

    pub fn find_by_id(&self, id: ReportId) -> PipelineResult<Report> {
        let doc = self
            .lock()?
            .find_one(&id)
            .map_err(|e| PipelineError::storage(format!("load report {}: {:#}", id, e)))?;
        match doc {
            Some(doc) => Ok(report_from_document(id, &doc)),
            None => Err(PipelineError::not_found(format!("report {}", id))),
        }
    }

    /// Listing of the reports matching `filter`. Nothing is read until
    /// `ReportListing::iter` is called.
    pub fn find_all(&self, filter: ReportFilter) -> ReportListing<'_> {
        ReportListing {
            store: self,
            filter,
        }
    }

    /// Set a report's status.
    ///
    /// The new status is validated before the store is touched. Missing
    /// reports yield `UpdateOutcome::NotFound`, not an error.
    pub fn update_status(&self, id: ReportId, new_status: &str) -> PipelineResult<UpdateOutcome> {
        let status: ReportStatus = new_status.parse()?;
        let mut fields = Document::new();
        fields.insert("status".to_string(), Value::from(status.as_str()));

        let counts = self
            .lock()?
            .update_one(&id, &fields)
            .map_err(|e| PipelineError::storage(format!("update report {}: {:#}", id, e)))?;

        let outcome = if counts.matched == 0 {
            UpdateOutcome::NotFound
        } else if counts.modified == 0 {
            UpdateOutcome::Unchanged
        } else {
            UpdateOutcome::Updated
        };
        log::info!("report {} status -> {}: {:?}", id, status, outcome);
        Ok(outcome)
    }
}

/// Lazy, restartable listing returned by `ReportStore::find_all`.
pub struct ReportListing<'a> {
    store: &'a ReportStore,
    filter: ReportFilter,
}

impl ReportListing<'_> {
    pub fn filter(&self) -> &ReportFilter {
        &self.filter
    }

    /// Query the store afresh. Each call sees the records as they are now.
    pub fn iter(&self) -> PipelineResult<ReportIter> {
        let rows = self
            .store
            .lock()?
            .find_many(&self.filter.to_filter())
            .map_err(|e| PipelineError::storage(format!("list reports: {:#}", e)))?;
        Ok(ReportIter {
            rows: rows.into_iter(),
        })
    }
}

/// Normalizes one stored record per `next()`.
pub struct ReportIter {
    rows: std::vec::IntoIter<(ReportId, Document)>,
}

impl Iterator for ReportIter {
    type Item = Report;

    fn next(&mut self) -> Option<Report> {
        self.rows
            .next()
            .map(|(id, doc)| report_from_document(id, &doc))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

// -------------------- Document mapping --------------------

fn round_score(score: f32) -> f64 {
    (f64::from(score) * 1e6).round() / 1e6
}

pub(crate) fn report_to_document(details: &ReportDetails, status: ReportStatus) -> Document {
    let depth_points: Vec<f64> = details.depth_points.iter().copied().map(round_score).collect();
    let value = json!({
        "original_image": details.original_image,
        "detected_image": details.detected_image,
        "user_name": details.submitter,
        "gps_latitude": details.gps_latitude,
        "gps_longitude": details.gps_longitude,
        "location": details.location,
        "crack_points": details.crack_points,
        "crack_type": details.damage_type().as_str(),
        "depth_points": depth_points,
        "boxes": details.boxes,
        "status": status.as_str(),
    });
    match value {
        Value::Object(doc) => doc,
        _ => Document::new(),
    }
}

fn text_field(doc: &Document, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| doc.get(*name))
        .find_map(|v| v.as_str())
        .map(str::to_string)
}

fn parse_box(value: &Value) -> Option<BoundingBox> {
    let coord = |name: &str| value.get(name).and_then(Value::as_i64).map(|v| v as i32);
    Some(BoundingBox {
        x1: coord("x1")?,
        y1: coord("y1")?,
        x2: coord("x2")?,
        y2: coord("y2")?,
    })
}

/// Map a stored record of any observed vintage onto the canonical shape.
pub(crate) fn report_from_document(id: ReportId, doc: &Document) -> Report {
    let original_image = text_field(doc, &["original_image", "filename"]).unwrap_or_default();
    let submitter = text_field(doc, &["user_name", "user_email"])
        .unwrap_or_else(|| crate::report::ANONYMOUS_SUBMITTER.to_string());

    let depth_points: Vec<f32> = match doc.get("depth_points") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect(),
        _ => Vec::new(),
    };
    let crack_points = doc
        .get("crack_points")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(depth_points.len());
    // Older uploads stored a rendered copy even when nothing was found.
    let detected_image = match text_field(doc, &["detected_image"]) {
        Some(detected) if crack_points > 0 => detected,
        _ => original_image.clone(),
    };
    let boxes = match doc.get("boxes") {
        Some(Value::Array(items)) => items.iter().filter_map(parse_box).collect(),
        _ => Vec::new(),
    };

    let lat = doc.get("gps_latitude").and_then(Value::as_f64);
    let lon = doc.get("gps_longitude").and_then(Value::as_f64);
    let (gps_latitude, gps_longitude, location) = match (lat, lon) {
        (Some(lat), Some(lon)) => (
            Some(lat),
            Some(lon),
            text_field(doc, &["location"]).unwrap_or_else(|| UNKNOWN_LOCATION.to_string()),
        ),
        _ => (None, None, UNKNOWN_PLACE.to_string()),
    };

    let status = match doc.get("status").and_then(Value::as_str) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("report {} has unrecognized status '{}'; reading as Pending", id, raw);
            ReportStatus::Pending
        }),
        None => {
            log::warn!("report {} has no status; reading as Pending", id);
            ReportStatus::Pending
        }
    };

    Report::from_parts(
        id,
        status,
        ReportDetails {
            original_image,
            detected_image,
            submitter,
            crack_points,
            depth_points,
            boxes,
            gps_latitude,
            gps_longitude,
            location,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::error::ErrorKind;
    use crate::geo::GeoResult;
    use crate::report::{DamageType, ReportBuilder};

    fn new_report(submitter: &str, confidences: &[f32]) -> NewReport {
        let detections: Vec<Detection> = confidences
            .iter()
            .map(|&confidence| Detection {
                bbox: BoundingBox {
                    x1: 0,
                    y1: 0,
                    x2: 10,
                    y2: 10,
                },
                confidence,
            })
            .collect();
        let geo = GeoResult::Located {
            latitude: 40.446,
            longitude: -79.948,
            place: "Pittsburgh, PA".into(),
        };
        ReportBuilder::build("a.jpg", Some(submitter), &detections, Some("detected_a.jpg"), &geo)
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn create_then_find_round_trips() {
        let store = ReportStore::in_memory();
        let new = new_report("ana", &[0.9, 0.25]);
        let id = store.create(&new).unwrap();

        let found = store.find_by_id(id).unwrap();
        assert_eq!(found.id(), id);
        assert_eq!(found.status(), ReportStatus::Pending);
        assert_eq!(found.damage_type(), DamageType::Detected);
        assert_eq!(found.details().submitter, "ana");
        assert_eq!(found.details().crack_points, 2);
        assert_eq!(found.details().boxes, new.details().boxes);
        assert_eq!(found.details().location, "Pittsburgh, PA");
    }

    #[test]
    fn missing_report_is_not_found() {
        let store = ReportStore::in_memory();
        let err = store.find_by_id(ReportId::from_bytes([7u8; 12])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn listing_filters_by_submitter_and_restarts() {
        let store = ReportStore::in_memory();
        store.create(&new_report("ana", &[])).unwrap();
        store.create(&new_report("bo", &[0.5])).unwrap();

        let all = store.find_all(ReportFilter::All);
        assert_eq!(all.iter().unwrap().count(), 2);

        let anas = store.find_all(ReportFilter::by_submitter(" ana "));
        let first: Vec<Report> = anas.iter().unwrap().collect();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].details().submitter, "ana");

        store.create(&new_report("ana", &[0.3])).unwrap();
        assert_eq!(anas.iter().unwrap().count(), 2);
    }

    #[test]
    fn update_status_reports_each_outcome() {
        let store = ReportStore::in_memory();
        let id = store.create(&new_report("ana", &[])).unwrap();

        assert_eq!(store.update_status(id, "Resolved").unwrap(), UpdateOutcome::Updated);
        assert_eq!(store.update_status(id, "Resolved").unwrap(), UpdateOutcome::Unchanged);
        assert_eq!(store.find_by_id(id).unwrap().status(), ReportStatus::Resolved);

        let missing = ReportId::from_bytes([1u8; 12]);
        assert_eq!(store.update_status(missing, "Pending").unwrap(), UpdateOutcome::NotFound);
        assert_eq!(store.update_status(id, "").unwrap_err().kind, ErrorKind::InvalidArgument);
        assert_eq!(store.update_status(id, "Closed").unwrap_err().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn legacy_records_are_normalized() {
        let id = ReportId::from_bytes([3u8; 12]);
        let report = report_from_document(
            id,
            &doc(json!({
                "filename": "old.jpg",
                "user_email": "ana@example.com",
                "gps_latitude": 40.4,
                "gps_longitude": "n/a",
                "location": "Somewhere",
                "depth_points": "0.5",
                "status": "Archived"
            })),
        );
        let d = report.details();
        assert_eq!(d.original_image, "old.jpg");
        assert_eq!(d.detected_image, "old.jpg");
        assert_eq!(d.submitter, "ana@example.com");
        assert_eq!((d.gps_latitude, d.gps_longitude), (None, None));
        assert_eq!(d.location, UNKNOWN_PLACE);
        assert!(d.depth_points.is_empty());
        assert_eq!(d.crack_points, 0);
        assert_eq!(report.status(), ReportStatus::Pending);

        let report = report_from_document(
            ReportId::from_bytes([5u8; 12]),
            &doc(json!({
                "original_image": "abc.jpg",
                "detected_image": "detected_abc.jpg",
                "crack_points": 0,
                "depth_points": [],
                "status": "Pending"
            })),
        );
        assert_eq!(report.damage_type(), DamageType::None);
        assert_eq!(report.details().detected_image, "abc.jpg");
    }

    #[test]
    fn crack_points_fall_back_to_score_count() {
        let report = report_from_document(
            ReportId::from_bytes([4u8; 12]),
            &doc(json!({
                "original_image": "a.jpg",
                "gps_latitude": 1.0,
                "gps_longitude": 2.0,
                "depth_points": [0.9, 0.4],
                "status": "InProgress"
            })),
        );
        assert_eq!(report.details().crack_points, 2);
        assert_eq!(report.damage_type(), DamageType::Detected);
        assert_eq!(report.details().location, UNKNOWN_LOCATION);
        assert_eq!(report.status(), ReportStatus::InProgress);
    }

    #[test]
    fn documents_carry_the_derived_damage_label() {
        let new = new_report("ana", &[0.123_456_78]);
        let doc = report_to_document(new.details(), new.status());
        assert_eq!(doc["crack_type"], json!("Detected"));
        assert_eq!(doc["status"], json!("Pending"));
        assert_eq!(doc["depth_points"], json!([0.123457]));
        assert_eq!(doc["user_name"], json!("ana"));
    }
}
