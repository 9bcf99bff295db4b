//! Post-creation status changes.

use std::str::FromStr;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::report::{ReportId, ReportStatus};
use crate::storage::{ReportStore, UpdateOutcome};

/// Which status moves are allowed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransitionPolicy {
    /// Any status may follow any status.
    #[default]
    Unconstrained,
    /// Pending -> InProgress -> Resolved, forward only. Steps may be skipped.
    Linear,
}

impl TransitionPolicy {
    pub fn allows(self, from: ReportStatus, to: ReportStatus) -> bool {
        match self {
            TransitionPolicy::Unconstrained => true,
            TransitionPolicy::Linear => to.rank() >= from.rank(),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unconstrained" => Ok(TransitionPolicy::Unconstrained),
            "linear" => Ok(TransitionPolicy::Linear),
            other => Err(PipelineError::invalid_argument(format!(
                "unknown transition policy '{}'",
                other
            ))),
        }
    }
}

pub struct StatusWorkflow {
    store: Arc<ReportStore>,
    policy: TransitionPolicy,
}

impl StatusWorkflow {
    pub fn new(store: Arc<ReportStore>) -> Self {
        Self::with_policy(store, TransitionPolicy::default())
    }

    pub fn with_policy(store: Arc<ReportStore>, policy: TransitionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Change a report's status. Last writer wins between concurrent calls.
    pub fn set_status(&self, id: ReportId, new_status: &str) -> PipelineResult<UpdateOutcome> {
        let target: ReportStatus = new_status.parse()?;

        if self.policy != TransitionPolicy::Unconstrained {
            let current = match self.store.find_by_id(id) {
                Ok(report) => report.status(),
                Err(err) if err.kind == crate::error::ErrorKind::NotFound => {
                    return Ok(UpdateOutcome::NotFound)
                }
                Err(err) => return Err(err),
            };
            if !self.policy.allows(current, target) {
                return Err(PipelineError::invalid_argument(format!(
                    "report {} cannot move from {} to {}",
                    id, current, target
                )));
            }
        }

        self.store.update_status(id, target.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::geo::GeoResult;
    use crate::report::ReportBuilder;

    fn seeded() -> (Arc<ReportStore>, ReportId) {
        let store = Arc::new(ReportStore::in_memory());
        let report = ReportBuilder::build("a.jpg", None, &[], None, &GeoResult::Unknown);
        let id = store.create(&report).unwrap();
        (store, id)
    }

    #[test]
    fn unconstrained_allows_moving_backwards() {
        let (store, id) = seeded();
        let workflow = StatusWorkflow::new(store.clone());
        assert_eq!(workflow.set_status(id, "Resolved").unwrap(), UpdateOutcome::Updated);
        assert_eq!(workflow.set_status(id, "Pending").unwrap(), UpdateOutcome::Updated);
        assert_eq!(store.find_by_id(id).unwrap().status(), ReportStatus::Pending);
    }

    #[test]
    fn linear_rejects_backward_moves() {
        let (store, id) = seeded();
        let workflow = StatusWorkflow::with_policy(store.clone(), TransitionPolicy::Linear);
        assert_eq!(workflow.set_status(id, "InProgress").unwrap(), UpdateOutcome::Updated);
        assert_eq!(workflow.set_status(id, "InProgress").unwrap(), UpdateOutcome::Unchanged);

        let err = workflow.set_status(id, "Pending").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert_eq!(store.find_by_id(id).unwrap().status(), ReportStatus::InProgress);

        let missing = ReportId::from_bytes([9u8; 12]);
        assert_eq!(workflow.set_status(missing, "Resolved").unwrap(), UpdateOutcome::NotFound);
    }

    #[test]
    fn policy_table() {
        use ReportStatus::*;
        assert!(TransitionPolicy::Unconstrained.allows(Resolved, Pending));
        assert!(TransitionPolicy::Linear.allows(Pending, Resolved));
        assert!(!TransitionPolicy::Linear.allows(Resolved, InProgress));
    }

    #[test]
    fn policy_names_parse_case_insensitively() {
        assert_eq!(" Linear ".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Linear);
        assert_eq!(
            "unconstrained".parse::<TransitionPolicy>().unwrap(),
            TransitionPolicy::Unconstrained
        );
        let err = "lineer".parse::<TransitionPolicy>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }
}
