//! Report entity, identifiers, statuses, and the pure report builder.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::detect::{BoundingBox, Detection};
use crate::error::PipelineError;
use crate::geo::GeoResult;

/// Submitter recorded when the upload carries no identity.
pub const ANONYMOUS_SUBMITTER: &str = "anonymous";

// -------------------- Identifiers --------------------

/// Opaque 96-bit report identifier, assigned by the store.
///
/// The 24-character lowercase hex form is only produced or parsed at the
/// boundary (`Display`, `FromStr`, serde).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportId([u8; 12]);

impl ReportId {
    pub(crate) fn random() -> Self {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ReportId {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s.trim(), &mut bytes).map_err(|_| {
            PipelineError::invalid_argument(format!("malformed report id '{}'", s.trim()))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for ReportId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// -------------------- Status --------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [
        ReportStatus::Pending,
        ReportStatus::InProgress,
        ReportStatus::Resolved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::InProgress => "InProgress",
            ReportStatus::Resolved => "Resolved",
        }
    }

    /// Position in the Pending -> InProgress -> Resolved sequence.
    pub fn rank(self) -> u8 {
        match self {
            ReportStatus::Pending => 0,
            ReportStatus::InProgress => 1,
            ReportStatus::Resolved => 2,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = PipelineError;

    /// Case-insensitive; spaces, `_` and `-` are ignored ("in progress" parses).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match folded.as_str() {
            "" => Err(PipelineError::invalid_argument("status is required")),
            "pending" => Ok(ReportStatus::Pending),
            "inprogress" => Ok(ReportStatus::InProgress),
            "resolved" => Ok(ReportStatus::Resolved),
            _ => Err(PipelineError::invalid_argument(format!(
                "unknown status '{}'",
                s.trim()
            ))),
        }
    }
}

// -------------------- Damage type --------------------

/// Damage label, derived from the detection count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DamageType {
    Detected,
    None,
}

impl DamageType {
    pub fn from_count(count: usize) -> Self {
        if count > 0 {
            DamageType::Detected
        } else {
            DamageType::None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DamageType::Detected => "Detected",
            DamageType::None => "None",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------- Report --------------------

/// Everything a report records besides its identifier and status.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportDetails {
    pub original_image: String,
    /// Equals `original_image` when nothing was detected.
    pub detected_image: String,
    pub submitter: String,
    pub crack_points: usize,
    /// Confidence of each detection.
    pub depth_points: Vec<f32>,
    /// Empty for records written before boxes were stored.
    pub boxes: Vec<BoundingBox>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub location: String,
}

impl ReportDetails {
    pub fn damage_type(&self) -> DamageType {
        DamageType::from_count(self.crack_points)
    }
}

/// A report assembled by `ReportBuilder` and not yet persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct NewReport {
    details: ReportDetails,
}

impl NewReport {
    pub fn details(&self) -> &ReportDetails {
        &self.details
    }

    /// New reports always start out pending.
    pub fn status(&self) -> ReportStatus {
        ReportStatus::Pending
    }

    pub(crate) fn into_report(self, id: ReportId) -> Report {
        Report::from_parts(id, ReportStatus::Pending, self.details)
    }
}

/// A persisted report.
///
/// Identifier and status have no setters: the id is fixed at creation and
/// the status changes only through the store's status update.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    id: ReportId,
    status: ReportStatus,
    details: ReportDetails,
}

impl Report {
    pub(crate) fn from_parts(id: ReportId, status: ReportStatus, details: ReportDetails) -> Self {
        Self {
            id,
            status,
            details,
        }
    }

    pub fn id(&self) -> ReportId {
        self.id
    }

    pub fn status(&self) -> ReportStatus {
        self.status
    }

    pub fn details(&self) -> &ReportDetails {
        &self.details
    }

    pub fn damage_type(&self) -> DamageType {
        self.details.damage_type()
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = crate::storage::report_to_document(&self.details, self.status);
        doc.insert("_id".to_string(), serde_json::Value::String(self.id.to_string()));
        doc.serialize(serializer)
    }
}

// -------------------- Builder --------------------

/// Assembles unsaved reports. Pure; performs no I/O.
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn build(
        original_ref: &str,
        submitter: Option<&str>,
        detections: &[Detection],
        rendered_ref: Option<&str>,
        geo: &GeoResult,
    ) -> NewReport {
        let detected_image = match rendered_ref {
            Some(rendered) if !detections.is_empty() => rendered.to_string(),
            _ => original_ref.to_string(),
        };
        let submitter = submitter
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ANONYMOUS_SUBMITTER)
            .to_string();

        NewReport {
            details: ReportDetails {
                original_image: original_ref.to_string(),
                detected_image,
                submitter,
                crack_points: detections.len(),
                depth_points: detections.iter().map(|d| d.confidence).collect(),
                boxes: detections.iter().map(|d| d.bbox).collect(),
                gps_latitude: geo.latitude(),
                gps_longitude: geo.longitude(),
                location: geo.place_name().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn detection(confidence: f32) -> Detection {
        Detection {
            bbox: BoundingBox {
                x1: 1,
                y1: 2,
                x2: 30,
                y2: 40,
            },
            confidence,
        }
    }

    #[test]
    fn report_id_hex_round_trip_and_rejects_garbage() {
        let id = ReportId::random();
        let text = id.to_string();
        assert_eq!(text.len(), 24);
        assert_eq!(text.parse::<ReportId>().unwrap(), id);

        for bad in ["", "xyz", "00ff", "000000000000000000000000ff"] {
            let err = bad.parse::<ReportId>().unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn random_ids_do_not_repeat() {
        let ids: std::collections::HashSet<ReportId> =
            (0..1000).map(|_| ReportId::random()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn status_parsing_is_lenient_about_spelling() {
        assert_eq!("Resolved".parse::<ReportStatus>().unwrap(), ReportStatus::Resolved);
        assert_eq!("in progress".parse::<ReportStatus>().unwrap(), ReportStatus::InProgress);
        assert_eq!("IN_PROGRESS".parse::<ReportStatus>().unwrap(), ReportStatus::InProgress);
        assert_eq!("".parse::<ReportStatus>().unwrap_err().kind, ErrorKind::InvalidArgument);
        assert_eq!("   ".parse::<ReportStatus>().unwrap_err().kind, ErrorKind::InvalidArgument);
        assert_eq!("Closed".parse::<ReportStatus>().unwrap_err().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn build_without_detections_points_at_original() {
        let report =
            ReportBuilder::build("a.jpg", None, &[], Some("detected_a.jpg"), &GeoResult::Unknown);
        let d = report.details();
        assert_eq!(d.detected_image, "a.jpg");
        assert_eq!(d.damage_type(), DamageType::None);
        assert_eq!(d.crack_points, 0);
        assert!(d.depth_points.is_empty());
        assert_eq!(d.submitter, ANONYMOUS_SUBMITTER);
        assert_eq!(d.gps_latitude, None);
        assert_eq!(d.location, "Unknown");
        assert_eq!(report.status(), ReportStatus::Pending);
    }

    #[test]
    fn build_with_detections_uses_rendered_image() {
        let geo = GeoResult::Located {
            latitude: 1.5,
            longitude: -2.5,
            place: "Somewhere".into(),
        };
        let detections = [detection(0.9), detection(0.2)];
        let report = ReportBuilder::build(
            "a.jpg",
            Some(" ana@example.com "),
            &detections,
            Some("detected_a.jpg"),
            &geo,
        );
        let d = report.details();
        assert_eq!(d.detected_image, "detected_a.jpg");
        assert_eq!(d.damage_type(), DamageType::Detected);
        assert_eq!(d.crack_points, 2);
        assert_eq!(d.depth_points, vec![0.9, 0.2]);
        assert_eq!(d.boxes.len(), 2);
        assert_eq!(d.submitter, "ana@example.com");
        assert_eq!((d.gps_latitude, d.gps_longitude), (Some(1.5), Some(-2.5)));
    }

    #[test]
    fn build_with_detections_but_no_render_falls_back_to_original() {
        let report =
            ReportBuilder::build("a.jpg", Some(""), &[detection(0.5)], None, &GeoResult::Unknown);
        assert_eq!(report.details().detected_image, "a.jpg");
        assert_eq!(report.details().submitter, ANONYMOUS_SUBMITTER);
    }
}
