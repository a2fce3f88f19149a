//! `label_sync` engine: fetch, reconcile and apply, one organisation at a time.
//!
//! The [`Engine`] sequences the stages around the pure reconciler in the
//! [`labels`] crate:
//!
//! 1. list the organisation's repositories and filter them;
//! 2. list every repository's labels on a bounded worker pool;
//! 3. reconcile the taxonomy against those labels;
//! 4. when the run is confirmed, apply the planned updates on a second pool.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The engine sequences calls between the domain
//! logic in [`labels`] and whatever [`labels::LabelClient`] it was given. It
//! contains no reconciliation rules of its own.

pub mod apply;
pub mod fetch;
mod pool;

use std::sync::Arc;

use labels::{
    count_updates, reconcile, Configuration, LabelClient, OrgName, OrgSpec, RepoUpdates,
    SyncConfig, SyncError, Timestamp,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

pub use apply::{apply_one, apply_updates};
pub use fetch::{load_labels, load_repos, FetchedLabels};

/// What happened to one organisation.
#[derive(Debug, Clone, Serialize)]
pub struct OrgReport {
    /// Organisation or user processed.
    pub org: OrgName,
    /// Repositories selected by the filter.
    pub repos: usize,
    /// Updates planned, per repository.
    pub updates: RepoUpdates,
    /// Whether the updates were sent to the remote system.
    pub applied: bool,
}

/// Result of syncing one organisation: the report plus every non-fatal error.
#[derive(Debug)]
pub struct OrgSync {
    /// What was planned and whether it was applied.
    pub report: OrgReport,
    /// Fetch, validation and apply failures, in stage order.
    pub errors: Vec<SyncError>,
}

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct SyncRun {
    /// One report per organisation that got as far as planning.
    pub reports: Vec<OrgReport>,
    /// Every non-fatal error across all organisations.
    pub errors: Vec<SyncError>,
}

impl SyncRun {
    /// Returns the collected errors as one error, if there were any.
    pub fn error(self) -> Option<SyncError> {
        SyncError::aggregate(self.errors)
    }
}

/// Drives fetch, reconcile and apply with a fixed client and configuration.
pub struct Engine {
    client: Arc<dyn LabelClient>,
    config: SyncConfig,
}

impl Engine {
    /// Creates an engine. The client variant (live, dry-run, in-memory) is
    /// decided by the caller.
    pub fn new(client: Arc<dyn LabelClient>, config: SyncConfig) -> Self {
        Self { client, config }
    }

    /// Returns the run configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Syncs every configured organisation in order.
    ///
    /// A failure confined to one organisation (listing its repositories, a
    /// repository's labels, an update) is recorded and the next organisation
    /// still runs.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] without contacting the remote
    /// system when the taxonomy is invalid.
    pub async fn run(
        &self,
        taxonomy: &Configuration,
        now: Timestamp,
    ) -> Result<SyncRun, SyncError> {
        taxonomy.validate()?;

        let mut run = SyncRun::default();
        for org in &self.config.orgs {
            match self.sync_org(taxonomy, org, now).await {
                Ok(synced) => {
                    run.reports.push(synced.report);
                    run.errors.extend(synced.errors);
                }
                Err(err @ SyncError::ConfigInvalid { .. }) => return Err(err),
                Err(err) => run.errors.push(err),
            }
        }
        Ok(run)
    }

    /// Syncs one organisation.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] for an invalid taxonomy and
    /// [`SyncError::Fetch`] when the repository listing fails. Failures of
    /// individual repositories or updates are returned in [`OrgSync::errors`].
    #[instrument(skip_all, fields(org = %org.name))]
    pub async fn sync_org(
        &self,
        taxonomy: &Configuration,
        org: &OrgSpec,
        now: Timestamp,
    ) -> Result<OrgSync, SyncError> {
        info!(org = %org.name, "Reading repos");
        let repos = load_repos(self.client.as_ref(), org, &self.config.filter).await?;
        let repo_count = repos.len();

        info!(org = %org.name, "Found {} repos", repo_count);
        let fetched = load_labels(
            Arc::clone(&self.client),
            &org.name,
            repos,
            self.config.workers,
        )
        .await;
        let mut errors = fetched.errors;

        info!(org = %org.name, "Syncing labels for {} repos", fetched.labels.len());
        let reconciliation = reconcile(taxonomy, &fetched.labels, now)?;
        errors.extend(reconciliation.errors);
        let updates = reconciliation.updates;

        if let Some(plan) = render_plan(&updates) {
            debug!(org = %org.name, "planned updates:\n{plan}");
        }

        let applied = if !self.config.confirm {
            info!(
                org = %org.name,
                planned = count_updates(&updates),
                "Running without --confirm, no mutations made"
            );
            false
        } else {
            if let Err(err) = apply_updates(
                Arc::clone(&self.client),
                &org.name,
                &updates,
                self.config.workers,
            )
            .await
            {
                errors.push(err);
            }
            true
        };

        Ok(OrgSync {
            report: OrgReport {
                org: org.name.clone(),
                repos: repo_count,
                updates,
                applied,
            },
            errors,
        })
    }
}

/// Pretty JSON of a plan for the debug log; `None` when it cannot be encoded.
fn render_plan(updates: &impl Serialize) -> Option<String> {
    match serde_json::to_string_pretty(updates) {
        Ok(plan) => Some(plan),
        Err(err) => {
            warn!(error = %err, "failed to encode planned updates");
            None
        }
    }
}
