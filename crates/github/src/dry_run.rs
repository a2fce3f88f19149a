//! Read-only wrapper around another client.

use async_trait::async_trait;
use labels::{
    ClientError, Issue, IssueNumber, IssueSearch, LabelClient, LabelState, OrgName, Repo, RepoName,
};
use tracing::info;

use crate::GitHubClient;

/// Forwards reads to the wrapped client and turns every mutation into a log
/// line.
///
/// Used when a sync runs without `--confirm`, so that a plan can be computed
/// against real data with no risk of changing it.
#[derive(Debug, Clone)]
pub struct DryRunClient<C = GitHubClient> {
    inner: C,
}

impl<C: LabelClient> DryRunClient<C> {
    /// Wraps `inner`.
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: LabelClient> LabelClient for DryRunClient<C> {
    async fn get_repos(&self, org: &OrgName, is_user: bool) -> Result<Vec<Repo>, ClientError> {
        self.inner.get_repos(org, is_user).await
    }

    async fn get_repo_labels(
        &self,
        org: &OrgName,
        repo: &RepoName,
    ) -> Result<Vec<LabelState>, ClientError> {
        self.inner.get_repo_labels(org, repo).await
    }

    async fn add_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        name: &str,
        _description: &str,
        color: &str,
    ) -> Result<(), ClientError> {
        info!(org = %org, repo = %repo, label = name, color, "dry run: would create label");
        Ok(())
    }

    async fn update_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        current_name: &str,
        new_name: &str,
        _description: &str,
        color: &str,
    ) -> Result<(), ClientError> {
        info!(
            org = %org,
            repo = %repo,
            from = current_name,
            to = new_name,
            color,
            "dry run: would update label"
        );
        Ok(())
    }

    async fn delete_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        name: &str,
    ) -> Result<(), ClientError> {
        info!(org = %org, repo = %repo, label = name, "dry run: would delete label");
        Ok(())
    }

    async fn add_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        number: IssueNumber,
        name: &str,
    ) -> Result<(), ClientError> {
        info!(
            org = %org,
            repo = %repo,
            issue = %number,
            label = name,
            "dry run: would label issue"
        );
        Ok(())
    }

    async fn remove_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        number: IssueNumber,
        name: &str,
    ) -> Result<(), ClientError> {
        info!(
            org = %org,
            repo = %repo,
            issue = %number,
            label = name,
            "dry run: would unlabel issue"
        );
        Ok(())
    }

    async fn find_issues(
        &self,
        query: &IssueSearch,
        order: &str,
        ascending: bool,
    ) -> Result<Vec<Issue>, ClientError> {
        self.inner.find_issues(query, order, ascending).await
    }
}
