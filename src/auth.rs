//! Operator access gating.
//!
//! Credential storage lives outside this crate. The console only consumes a
//! yes/no `CredentialVerifier`; an `OperatorSession` can only be obtained
//! through a successful `login`, and the operator-only operations take one.

use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::report::ReportId;
use crate::storage::{ReportFilter, ReportListing, ReportStore, UpdateOutcome};
use crate::workflow::StatusWorkflow;

pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, email: &str, password: &str) -> bool;
}

impl<F> CredentialVerifier for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn verify(&self, email: &str, password: &str) -> bool {
        self(email, password)
    }
}

/// Proof of a successful operator login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorSession {
    email: String,
}

impl OperatorSession {
    pub fn email(&self) -> &str {
        &self.email
    }
}

pub struct OperatorConsole {
    store: Arc<ReportStore>,
    workflow: StatusWorkflow,
    verifier: Box<dyn CredentialVerifier>,
}

impl OperatorConsole {
    pub fn new(
        workflow: StatusWorkflow,
        store: Arc<ReportStore>,
        verifier: Box<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            store,
            workflow,
            verifier,
        }
    }

    pub fn login(&self, email: &str, password: &str) -> PipelineResult<OperatorSession> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() || !self.verifier.verify(email, password) {
            log::warn!("operator login rejected");
            return Err(PipelineError::unauthorized());
        }
        log::info!("operator {} logged in", email);
        Ok(OperatorSession {
            email: email.to_string(),
        })
    }

    /// Every report, regardless of submitter.
    pub fn list_reports(&self, _session: &OperatorSession) -> ReportListing<'_> {
        self.store.find_all(ReportFilter::All)
    }

    pub fn set_status(
        &self,
        session: &OperatorSession,
        id: ReportId,
        new_status: &str,
    ) -> PipelineResult<UpdateOutcome> {
        log::debug!("operator {} sets report {} to '{}'", session.email, id, new_status);
        self.workflow.set_status(id, new_status)
    }
}
