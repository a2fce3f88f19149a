//! `label_sync` GitHub adapter.
//!
//! Implements [`labels::LabelClient`] against the GitHub REST API:
//!
//! - [`GitHubClient`] talks to the API with a bearer token, follows
//!   pagination and maps HTTP failures onto [`labels::ClientError`];
//! - [`Throttle`] caps its request rate and [`RetryPolicy`] bounds how long
//!   it waits out an exhausted rate limit;
//! - [`DryRunClient`] wraps any client, forwards reads and only logs
//!   mutations.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain reconciliation rules.
//! Authentication, pagination, path encoding, throttling and rate-limit
//! retries are handled here; the [`labels`] and `engine` crates never see them.

mod client;
mod dry_run;
mod throttle;
mod wire;

pub use client::{GitHubClient, DEFAULT_ENDPOINT};
pub use dry_run::DryRunClient;
pub use throttle::{RetryPolicy, Throttle, DEFAULT_TOKENS_PER_HOUR, DEFAULT_TOKEN_BURST};
