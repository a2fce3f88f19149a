//! The port through which the engine reads and mutates remote labels.
//!
//! Infrastructure crates implement [`LabelClient`]: the live GitHub client,
//! a dry-run wrapper that only reads, and [`crate::InMemoryClient`] for
//! tests. Callers hold an `Arc<dyn LabelClient>` and never know which one.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ClientError, Issue, IssueNumber, LabelState, OrgName, Repo, RepoName};

/// Labels currently observed on each repository.
pub type RepoLabels = BTreeMap<RepoName, Vec<LabelState>>;

/// Label and issue operations against a remote repository host.
#[async_trait]
pub trait LabelClient: Send + Sync {
    /// Lists the repositories of an organisation, or of a user when `is_user`.
    async fn get_repos(&self, org: &OrgName, is_user: bool) -> Result<Vec<Repo>, ClientError>;

    /// Lists every label defined on a repository.
    async fn get_repo_labels(
        &self,
        org: &OrgName,
        repo: &RepoName,
    ) -> Result<Vec<LabelState>, ClientError>;

    /// Creates a label.
    async fn add_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), ClientError>;

    /// Renames and/or recolours the label currently called `current_name`.
    async fn update_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        current_name: &str,
        new_name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), ClientError>;

    /// Deletes a label from the repository, and with it from every issue.
    async fn delete_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        name: &str,
    ) -> Result<(), ClientError>;

    /// Adds an existing repository label to one issue.
    async fn add_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        number: IssueNumber,
        name: &str,
    ) -> Result<(), ClientError>;

    /// Removes a label from one issue.
    async fn remove_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        number: IssueNumber,
        name: &str,
    ) -> Result<(), ClientError>;

    /// Searches issues and pull requests.
    ///
    /// `order` is the search sort key (empty for best match).
    async fn find_issues(
        &self,
        query: &IssueSearch,
        order: &str,
        ascending: bool,
    ) -> Result<Vec<Issue>, ClientError>;
}

/// An issue search: open issues in one repository that carry one label and
/// lack another.
///
/// Renders to GitHub search syntax through [`std::fmt::Display`]:
/// `is:open repo:ORG/REPO label:"OLD" -label:"NEW"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSearch {
    /// Organisation owning the repository.
    pub org: OrgName,
    /// Repository to search.
    pub repo: RepoName,
    /// Label every result must carry.
    pub with_label: String,
    /// Label no result may carry.
    pub without_label: String,
}

impl IssueSearch {
    /// Open issues in `org/repo` labelled `with_label` but not `without_label`.
    pub fn open_with_without(
        org: &OrgName,
        repo: &RepoName,
        with_label: &str,
        without_label: &str,
    ) -> Self {
        Self {
            org: org.clone(),
            repo: repo.clone(),
            with_label: with_label.to_string(),
            without_label: without_label.to_string(),
        }
    }
}

impl std::fmt::Display for IssueSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "is:open repo:{}/{} label:\"{}\" -label:\"{}\"",
            self.org, self.repo, self.with_label, self.without_label
        )
    }
}
