//! Error taxonomy for the report kernel boundary.
//!
//! Collaborators (detector runtimes, codecs, SQLite, HTTP clients) report
//! failures as `anyhow::Error`. Those are translated into a `PipelineError`
//! at the call site so that every failure leaving the kernel carries a stable
//! `ErrorKind` plus a human-readable message.

use std::fmt;

/// Stable error kinds surfaced by the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Upload bytes could not be decoded as an image.
    InvalidImage,
    /// Detector failed to initialize or crashed during inference.
    ModelUnavailable,
    /// Persistence or artifact write failed.
    StorageFailure,
    /// No report matches the identifier.
    NotFound,
    /// A required argument was missing or malformed.
    InvalidArgument,
    /// Operator credentials were rejected.
    Unauthorized,
}

impl ErrorKind {
    /// Stable code string.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidImage => "INVALID_IMAGE",
            ErrorKind::ModelUnavailable => "MODEL_UNAVAILABLE",
            ErrorKind::StorageFailure => "STORAGE_FAILURE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
        }
    }

    /// Caller-input problems, as opposed to server-side failures.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidImage
                | ErrorKind::NotFound
                | ErrorKind::InvalidArgument
                | ErrorKind::Unauthorized
        )
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{}: {}", .kind.code(), .message)]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_image(err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::InvalidImage, format!("image decode failed: {}", err))
    }

    pub fn model_unavailable(err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::ModelUnavailable, format!("detector unavailable: {}", err))
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        Self::new(ErrorKind::StorageFailure, format!("storage failure: {}", err))
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} not found", what))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, "invalid email or password")
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
