//! Label taxonomy domain for `label_sync`.
//!
//! This crate holds every domain concept: the desired-state label tree, its
//! partition into required/archaic/dead sets, the pure reconciler that turns
//! the tree and the observed repository labels into planned updates, and the
//! [`LabelClient`] port the engine uses to reach the remote system.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//! The current time is always passed in, never read.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`OrgName`, `RepoName`, `LabelKey`, etc.) |
//! | [`types`] | Shared value types (`LabelState`, `Repo`, `Issue`, `Timestamp`) |
//! | [`taxonomy`] | The label tree, document parsing and uniqueness validation |
//! | [`classify`] | Required / archaic / dead partition |
//! | [`update`] | Planned updates and their reasons |
//! | [`reconcile`] | The diff from observed labels to planned updates |
//! | [`client`] | The `LabelClient` port trait |
//! | [`memory`] | In-memory `LabelClient` for tests |
//! | [`config`] | Operational parameters for a sync run |
//! | [`errors`] | Client and sync error types |

pub mod classify;
pub mod client;
pub mod config;
pub mod errors;
pub mod identifiers;
pub mod memory;
pub mod reconcile;
pub mod taxonomy;
pub mod types;
pub mod update;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use classify::{ArchaicLabel, Classification};
pub use client::{IssueSearch, LabelClient, RepoLabels};
pub use config::{OrgSpec, RepoFilter, SyncConfig, DEFAULT_WORKERS};
pub use errors::{ClientError, SyncError};
pub use identifiers::{IssueNumber, LabelKey, OrgName, RepoName, SyncRunId};
pub use memory::{ClientCall, InMemoryClient};
pub use reconcile::{plan_repo, reconcile, reconcile_classified, Reconciliation};
pub use taxonomy::{Configuration, Label, LabelTarget};
pub use types::{Issue, LabelState, Repo, Timestamp};
pub use update::{count_updates, RepoUpdates, Update, UpdateReason};
