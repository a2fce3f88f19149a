//! Error types for the label sync domain.
//!
//! [`ClientError`] is what a [`crate::LabelClient`] implementation returns for
//! a single remote call. [`SyncError`] is the taxonomy the rest of the system
//! works with: configuration problems that abort a run before any network
//! activity, per-repository validation failures that skip one repository, and
//! per-item fetch/apply failures that are collected and reported together.

use std::time::Duration;

use thiserror::Error;

use crate::{OrgName, RepoName, UpdateReason};

// ---------------------------------------------------------------------------
// Client errors
// ---------------------------------------------------------------------------

/// Failure of one call against the remote label API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The API answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the response body.
        message: String,
    },

    /// The request never produced a response (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The rate limit is exhausted.
    #[error("rate limit exceeded, resets in {reset_in:?}")]
    RateLimited {
        /// Time until the limit resets, when the server reported it.
        reset_in: Option<Duration>,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The addressed repository, label or issue does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A failure produced on purpose by a test double.
    #[error("injected failure: {0}")]
    Injected(String),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors produced while syncing labels.
///
/// Only [`SyncError::ConfigInvalid`] is fatal on its own. Everything else is
/// scoped to one repository or one update and is collected into
/// [`SyncError::Aggregate`] once all work has been attempted.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The taxonomy document or the operational parameters are unusable.
    ///
    /// Raised before any remote call is made.
    #[error("invalid config: {message}")]
    ConfigInvalid {
        /// Description of the configuration problem.
        message: String,
    },

    /// A repository's current labels collide under case folding.
    ///
    /// The repository is skipped; other repositories proceed.
    #[error("invalid labels in {repo}: {message}")]
    RepoLabelsInvalid {
        /// Repository whose labels are invalid.
        repo: RepoName,
        /// Description of the collision.
        message: String,
    },

    /// Listing repositories or labels failed.
    #[error("failed to list {what} for {org}: {source}")]
    Fetch {
        /// Organisation being read.
        org: OrgName,
        /// `"repos"` or `"labels of <repo>"`.
        what: String,
        /// Underlying client failure.
        #[source]
        source: ClientError,
    },

    /// A remote mutation failed.
    #[error("failed to apply {reason} to {org}/{repo} ({label}): {source}")]
    Apply {
        /// Organisation of the repository.
        org: OrgName,
        /// Repository the update targets.
        repo: RepoName,
        /// Why the update was planned.
        reason: UpdateReason,
        /// Label (or `label on #issue`) the call addressed.
        label: String,
        /// Underlying client failure.
        #[source]
        source: ClientError,
    },

    /// An update whose reason does not match the labels it carries.
    #[error("unknown label operation {reason} for {repo}")]
    UnknownAction {
        /// Repository the update targets.
        repo: RepoName,
        /// Reason recorded on the malformed update.
        reason: UpdateReason,
    },

    /// A worker task panicked before finishing its queue.
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    /// Several independent failures from one stage or one run.
    #[error("{} operation(s) failed: {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<SyncError>),
}

impl SyncError {
    /// Builds a [`SyncError::ConfigInvalid`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Collapses a list of errors: `None` when empty, the error itself when
    /// there is exactly one, otherwise [`SyncError::Aggregate`].
    pub fn aggregate(mut errors: Vec<SyncError>) -> Option<SyncError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Aggregate(errors)),
        }
    }

    /// Returns the leaf errors, flattening nested aggregates.
    pub fn leaves(&self) -> Vec<&SyncError> {
        match self {
            Self::Aggregate(errors) => errors.iter().flat_map(SyncError::leaves).collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[SyncError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
