//! Executing planned updates against the remote system.

use std::sync::Arc;

use labels::{
    count_updates, ClientError, IssueSearch, LabelClient, LabelState, OrgName, RepoName,
    RepoUpdates, SyncError, Update, UpdateReason,
};
use tracing::{debug, info, instrument, warn};

use crate::pool;

/// Applies every update in `updates` on a pool of `workers` tasks.
///
/// Updates are independent: each is attempted even if others fail, and
/// nothing that succeeded is retried or rolled back. Re-running the sync
/// converges whatever is left.
///
/// # Errors
///
/// Returns the failures of every update that did not fully apply, as one
/// error or a [`SyncError::Aggregate`].
#[instrument(skip_all, fields(org = %org, updates = count_updates(updates)))]
pub async fn apply_updates(
    client: Arc<dyn LabelClient>,
    org: &OrgName,
    updates: &RepoUpdates,
    workers: usize,
) -> Result<(), SyncError> {
    let mut queue = Vec::with_capacity(count_updates(updates));
    for (repo, repo_updates) in updates {
        info!(org = %org, repo = %repo, "Applying {} changes", repo_updates.len());
        queue.extend(repo_updates.iter().cloned());
    }
    let total = queue.len();

    let org = org.clone();
    let outcome = pool::run(queue, workers, move |update: Update| {
        let client = Arc::clone(&client);
        let org = org.clone();
        async move { apply_one(client.as_ref(), &org, &update).await }
    })
    .await;

    info!(
        applied = outcome.results.len(),
        failed = outcome.errors.len(),
        total,
        "finished applying updates"
    );
    SyncError::aggregate(outcome.errors).map_or(Ok(()), Err)
}

/// Where an update lands, for error reporting.
struct Target<'a> {
    org: &'a OrgName,
    repo: &'a RepoName,
    reason: UpdateReason,
}

impl Target<'_> {
    fn error(&self, label: impl Into<String>, source: ClientError) -> SyncError {
        SyncError::Apply {
            org: self.org.clone(),
            repo: self.repo.clone(),
            reason: self.reason,
            label: label.into(),
            source,
        }
    }
}

/// Applies one update, choosing the remote calls by its reason.
pub async fn apply_one(
    client: &dyn LabelClient,
    org: &OrgName,
    update: &Update,
) -> Result<(), SyncError> {
    let repo = &update.repo;
    let target = Target {
        org,
        repo,
        reason: update.reason,
    };
    debug!(org = %org, repo = %repo, why = %update.reason, "running update");

    match (update.reason, &update.current, &update.wanted) {
        (UpdateReason::Missing, None, Some(wanted)) => client
            .add_repo_label(org, repo, &wanted.name, &wanted.description, &wanted.color)
            .await
            .map_err(|e| target.error(&wanted.name, e)),
        (UpdateReason::Rename | UpdateReason::Change, Some(current), Some(wanted)) => client
            .update_repo_label(
                org,
                repo,
                &current.name,
                &wanted.name,
                &wanted.description,
                &wanted.color,
            )
            .await
            .map_err(|e| target.error(&current.name, e)),
        (UpdateReason::Dead, Some(current), None) => client
            .delete_repo_label(org, repo, &current.name)
            .await
            .map_err(|e| target.error(&current.name, e)),
        (UpdateReason::Migrate, Some(current), Some(wanted)) => {
            migrate(client, &target, current, wanted).await
        }
        (reason, _, _) => Err(SyncError::UnknownAction {
            repo: repo.clone(),
            reason,
        }),
    }
}

/// Moves open issues from `current` to `wanted`.
///
/// With no issue left that carries `current` without `wanted`, the old label
/// is deleted. Otherwise each issue gets `wanted` added and then `current`
/// removed; when the add fails the removal is skipped for that issue only.
async fn migrate(
    client: &dyn LabelClient,
    target: &Target<'_>,
    current: &LabelState,
    wanted: &LabelState,
) -> Result<(), SyncError> {
    let (org, repo) = (target.org, target.repo);
    let search = IssueSearch::open_with_without(org, repo, &current.name, &wanted.name);
    let issues = client
        .find_issues(&search, "", false)
        .await
        .map_err(|e| target.error(&current.name, e))?;

    if issues.is_empty() {
        info!(
            org = %org,
            repo = %repo,
            label = %current.name,
            "no issues left to migrate, deleting label"
        );
        return client
            .delete_repo_label(org, repo, &current.name)
            .await
            .map_err(|e| target.error(&current.name, e));
    }

    let mut errors = Vec::new();
    for issue in issues {
        let number = issue.number;
        if let Err(e) = client.add_label(org, repo, number, &wanted.name).await {
            warn!(
                org = %org,
                repo = %repo,
                issue = %number,
                label = %wanted.name,
                error = %e,
                "failed to add label, keeping old one"
            );
            errors.push(target.error(format!("{} on {number}", wanted.name), e));
            continue;
        }
        if let Err(e) = client.remove_label(org, repo, number, &current.name).await {
            errors.push(target.error(format!("{} on {number}", current.name), e));
        }
    }
    SyncError::aggregate(errors).map_or(Ok(()), Err)
}
