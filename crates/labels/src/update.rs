//! Planned label mutations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{LabelState, RepoName};

/// Why an update was planned. Decides which remote calls apply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateReason {
    /// A required label is absent; create it.
    Missing,
    /// A label exists under an old name or the wrong case; rename it.
    Rename,
    /// A required label has the wrong colour or description.
    Change,
    /// A retired label whose date has passed; delete it.
    Dead,
    /// An old name coexists with its replacement; move issues across.
    Migrate,
}

impl UpdateReason {
    /// Returns the lowercase name used in logs and plan dumps.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Rename => "rename",
            Self::Change => "change",
            Self::Dead => "dead",
            Self::Migrate => "migrate",
        }
    }
}

impl std::fmt::Display for UpdateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutation planned for one repository.
///
/// `missing` carries only `wanted`, `dead` only `current`; the other reasons
/// carry both. The constructors are the only way the reconciler builds
/// updates, so the shape always matches the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Repository the update targets.
    pub repo: RepoName,
    /// Why the update was planned.
    pub reason: UpdateReason,
    /// The label as it exists now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<LabelState>,
    /// The label as it should be afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wanted: Option<LabelState>,
}

impl Update {
    /// Create `wanted`.
    pub fn missing(repo: RepoName, wanted: LabelState) -> Self {
        tracing::info!(repo = %repo, label = %wanted.name, "create");
        Self {
            repo,
            reason: UpdateReason::Missing,
            current: None,
            wanted: Some(wanted),
        }
    }

    /// Rename `current` to `wanted`, also setting its colour and description.
    pub fn rename(repo: RepoName, current: LabelState, wanted: LabelState) -> Self {
        tracing::info!(repo = %repo, from = %current.name, to = %wanted.name, "rename");
        Self {
            repo,
            reason: UpdateReason::Rename,
            current: Some(current),
            wanted: Some(wanted),
        }
    }

    /// Update the colour and description of `current` to those of `wanted`.
    pub fn change(repo: RepoName, current: LabelState, wanted: LabelState) -> Self {
        tracing::info!(repo = %repo, label = %wanted.name, color = %wanted.color, "change");
        Self {
            repo,
            reason: UpdateReason::Change,
            current: Some(current),
            wanted: Some(wanted),
        }
    }

    /// Delete `current`.
    pub fn dead(repo: RepoName, current: LabelState) -> Self {
        tracing::info!(repo = %repo, label = %current.name, "kill");
        Self {
            repo,
            reason: UpdateReason::Dead,
            current: Some(current),
            wanted: None,
        }
    }

    /// Move every open issue from `current` to `wanted`, then drop `current`.
    pub fn migrate(repo: RepoName, current: LabelState, wanted: LabelState) -> Self {
        tracing::info!(repo = %repo, from = %current.name, to = %wanted.name, "migrate");
        Self {
            repo,
            reason: UpdateReason::Migrate,
            current: Some(current),
            wanted: Some(wanted),
        }
    }
}

/// Planned updates keyed by repository, each list in application order.
pub type RepoUpdates = BTreeMap<RepoName, Vec<Update>>;

/// Counts the updates across every repository.
pub fn count_updates(updates: &RepoUpdates) -> usize {
    updates.values().map(Vec::len).sum()
}
