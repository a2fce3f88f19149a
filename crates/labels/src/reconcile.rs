//! Diffing a classified taxonomy against the labels repositories carry today.
//!
//! [`reconcile`] is pure: it reads the taxonomy, the observed labels and the
//! instant used for retirement decisions, and returns the updates that would
//! converge every repository. Nothing here talks to the remote system.

use std::collections::BTreeMap;

use crate::taxonomy::check_unique_states;
use crate::{
    Classification, Configuration, LabelKey, LabelState, RepoLabels, RepoName, RepoUpdates,
    SyncError, Timestamp, Update,
};

/// Result of reconciling every repository in a snapshot.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Updates for every repository whose labels could be reconciled.
    pub updates: RepoUpdates,
    /// One [`SyncError::RepoLabelsInvalid`] per skipped repository.
    pub errors: Vec<SyncError>,
}

/// Validates and classifies `config`, then plans updates for every
/// repository in `snapshot`.
///
/// # Errors
///
/// Returns [`SyncError::ConfigInvalid`] before planning anything when the
/// taxonomy contains duplicate names. Repositories with colliding labels do
/// not fail the call; they are reported in [`Reconciliation::errors`].
pub fn reconcile(
    config: &Configuration,
    snapshot: &RepoLabels,
    now: Timestamp,
) -> Result<Reconciliation, SyncError> {
    config.validate()?;
    let classification = Classification::classify(&config.labels, now);
    Ok(reconcile_classified(&classification, snapshot))
}

/// Plans updates for every repository against an existing classification.
pub fn reconcile_classified(
    classification: &Classification,
    snapshot: &RepoLabels,
) -> Reconciliation {
    let mut result = Reconciliation::default();
    for (repo, labels) in snapshot {
        match plan_repo(classification, repo, labels) {
            Ok(updates) if updates.is_empty() => {}
            Ok(updates) => {
                result.updates.insert(repo.clone(), updates);
            }
            Err(err) => result.errors.push(err),
        }
    }
    result
}

/// Plans the updates for one repository.
///
/// Order within the returned list: deletions of dead labels, renames of
/// archaic labels, then creations, case renames and changes of required
/// labels, and finally migrations. Migrations go last because they need an
/// issue search that only makes sense once names and colours have settled.
///
/// # Errors
///
/// Returns [`SyncError::RepoLabelsInvalid`] when two observed labels collide
/// under case folding.
pub fn plan_repo(
    classification: &Classification,
    repo: &RepoName,
    labels: &[LabelState],
) -> Result<Vec<Update>, SyncError> {
    check_unique_states(labels).map_err(|message| SyncError::RepoLabelsInvalid {
        repo: repo.clone(),
        message,
    })?;

    let mut updates = Vec::new();
    let mut current: BTreeMap<LabelKey, LabelState> = BTreeMap::new();
    for label in labels {
        let key = label.key();
        if classification.dead.contains_key(&key) {
            updates.push(Update::dead(repo.clone(), label.clone()));
        }
        current.insert(key, label.clone());
    }

    let mut migrations = Vec::new();
    for (key, archaic) in &classification.archaic {
        let Some(existing) = current.get(key).cloned() else {
            continue;
        };
        let wanted = archaic.target.clone();
        let wanted_key = wanted.key();
        if current.contains_key(&wanted_key) {
            migrations.push(Update::migrate(repo.clone(), existing, wanted));
        } else {
            updates.push(Update::rename(repo.clone(), existing, wanted.clone()));
            current.insert(wanted_key, wanted);
        }
    }

    for (key, required) in &classification.required {
        let wanted = required.state();
        match current.get(key) {
            None => updates.push(Update::missing(repo.clone(), wanted)),
            Some(existing) if existing.name != wanted.name => {
                updates.push(Update::rename(repo.clone(), existing.clone(), wanted));
            }
            Some(existing)
                if existing.color != wanted.color || existing.description != wanted.description =>
            {
                updates.push(Update::change(repo.clone(), existing.clone(), wanted));
            }
            Some(_) => {}
        }
    }

    updates.extend(migrations);
    Ok(updates)
}
