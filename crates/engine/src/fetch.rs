//! Reading repositories and their current labels.

use std::sync::Arc;

use labels::{
    LabelClient, LabelState, OrgName, OrgSpec, Repo, RepoFilter, RepoLabels, RepoName, SyncError,
};
use tracing::{error, info, instrument};

use crate::pool;

/// Lists the repositories of `org` that pass `filter`.
///
/// # Errors
///
/// Returns [`SyncError::Fetch`] when the listing call fails.
#[instrument(skip_all, fields(org = %org.name, is_user = org.is_user))]
pub async fn load_repos(
    client: &dyn LabelClient,
    org: &OrgSpec,
    filter: &RepoFilter,
) -> Result<Vec<Repo>, SyncError> {
    let repos = client
        .get_repos(&org.name, org.is_user)
        .await
        .map_err(|source| SyncError::Fetch {
            org: org.name.clone(),
            what: "repos".to_string(),
            source,
        })?;
    Ok(repos
        .into_iter()
        .filter(|r| filter.allows(&org.name, &r.name))
        .collect())
}

/// Labels fetched for a set of repositories.
#[derive(Debug, Default)]
pub struct FetchedLabels {
    /// Labels of every repository whose listing succeeded.
    pub labels: RepoLabels,
    /// One [`SyncError::Fetch`] per repository whose listing failed.
    pub errors: Vec<SyncError>,
}

/// Lists the labels of every repository on a pool of `workers` tasks.
///
/// A repository whose listing fails is left out of
/// [`FetchedLabels::labels`] rather than treated as having no labels, so it
/// is never planned against.
#[instrument(skip_all, fields(org = %org, repos = repos.len()))]
pub async fn load_labels(
    client: Arc<dyn LabelClient>,
    org: &OrgName,
    repos: Vec<Repo>,
    workers: usize,
) -> FetchedLabels {
    let org = org.clone();
    let outcome = pool::run(repos, workers, move |repo: Repo| {
        let client = Arc::clone(&client);
        let org = org.clone();
        async move {
            info!(org = %org, repo = %repo.name, "Listing labels for repo");
            match client.get_repo_labels(&org, &repo.name).await {
                Ok(labels) => Ok::<(RepoName, Vec<LabelState>), SyncError>((repo.name, labels)),
                Err(source) => {
                    error!(
                        org = %org,
                        repo = %repo.name,
                        error = %source,
                        "Failed listing labels for repo"
                    );
                    Err(SyncError::Fetch {
                        org,
                        what: format!("labels of {}", repo.name),
                        source,
                    })
                }
            }
        }
    })
    .await;

    FetchedLabels {
        labels: outcome.results.into_iter().collect(),
        errors: outcome.errors,
    }
}
