//! JSON shapes exchanged with the GitHub REST API.

use labels::{ClientError, Issue, IssueNumber, LabelState, Repo, RepoName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct WireRepo {
    pub name: String,
}

impl TryFrom<WireRepo> for Repo {
    type Error = ClientError;

    fn try_from(repo: WireRepo) -> Result<Self, Self::Error> {
        RepoName::new(&repo.name)
            .map(|name| Repo { name })
            .ok_or_else(|| ClientError::Decode(format!("invalid repository name {:?}", repo.name)))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireLabel {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl From<WireLabel> for LabelState {
    fn from(label: WireLabel) -> Self {
        LabelState::new(label.name, label.color, label.description.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireIssue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
}

impl From<WireIssue> for Issue {
    fn from(issue: WireIssue) -> Self {
        Issue {
            number: IssueNumber::new(issue.number),
            title: issue.title,
        }
    }
}

/// One page of `/search/issues`.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchPage {
    pub items: Vec<WireIssue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubError {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateLabel<'a> {
    pub name: &'a str,
    pub color: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateLabel<'a> {
    pub new_name: &'a str,
    pub color: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddLabels<'a> {
    pub labels: [&'a str; 1],
}
