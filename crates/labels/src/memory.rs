//! In-memory [`LabelClient`] used as a test double.
//!
//! Holds repositories, their labels and the labels on their issues, applies
//! mutations the way GitHub does (case-insensitive label lookup, renames and
//! deletions propagate to issues), records every call in order, and can be
//! told to fail selected calls.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::{
    ClientError, Issue, IssueNumber, IssueSearch, LabelClient, LabelKey, LabelState, OrgName,
    Repo, RepoLabels, RepoName,
};

/// A call received by an [`InMemoryClient`], in the order received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    /// `get_repos`
    GetRepos {
        /// Organisation or user listed.
        org: OrgName,
        /// Whether a user listing was requested.
        is_user: bool,
    },
    /// `get_repo_labels`
    GetRepoLabels {
        /// Repository listed.
        repo: RepoName,
    },
    /// `add_repo_label`
    AddRepoLabel {
        /// Repository mutated.
        repo: RepoName,
        /// Label created.
        name: String,
    },
    /// `update_repo_label`
    UpdateRepoLabel {
        /// Repository mutated.
        repo: RepoName,
        /// Name before the update.
        current: String,
        /// Name after the update.
        new_name: String,
    },
    /// `delete_repo_label`
    DeleteRepoLabel {
        /// Repository mutated.
        repo: RepoName,
        /// Label deleted.
        name: String,
    },
    /// `add_label`
    AddLabel {
        /// Repository of the issue.
        repo: RepoName,
        /// Issue labelled.
        number: IssueNumber,
        /// Label added.
        name: String,
    },
    /// `remove_label`
    RemoveLabel {
        /// Repository of the issue.
        repo: RepoName,
        /// Issue unlabelled.
        number: IssueNumber,
        /// Label removed.
        name: String,
    },
    /// `find_issues`
    FindIssues {
        /// Rendered search query.
        query: String,
    },
}

type FailurePredicate = Box<dyn Fn(&ClientCall) -> bool + Send + Sync>;

#[derive(Debug, Default)]
struct RepoState {
    labels: Vec<LabelState>,
    issues: BTreeMap<IssueNumber, Vec<String>>,
}

impl RepoState {
    fn position(&self, name: &str) -> Option<usize> {
        let key = LabelKey::from_name(name);
        self.labels.iter().position(|l| l.key() == key)
    }
}

#[derive(Default)]
struct State {
    repos: BTreeMap<OrgName, BTreeMap<RepoName, RepoState>>,
    calls: Vec<ClientCall>,
    failures: Vec<FailurePredicate>,
}

impl State {
    fn record(&mut self, call: ClientCall) -> Result<(), ClientError> {
        let failed = self.failures.iter().any(|fails| fails(&call));
        let description = format!("{call:?}");
        self.calls.push(call);
        if failed {
            Err(ClientError::Injected(description))
        } else {
            Ok(())
        }
    }

    fn repo_mut(&mut self, org: &OrgName, repo: &RepoName) -> Result<&mut RepoState, ClientError> {
        self.repos
            .get_mut(org)
            .and_then(|repos| repos.get_mut(repo))
            .ok_or_else(|| ClientError::NotFound(format!("repository {org}/{repo}")))
    }
}

/// In-memory label host. See the [module docs](self).
#[derive(Default)]
pub struct InMemoryClient {
    state: Mutex<State>,
}

impl std::fmt::Debug for InMemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryClient").finish_non_exhaustive()
    }
}

impl InMemoryClient {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a repository with the given labels.
    pub fn with_repo(mut self, org: &OrgName, repo: &RepoName, labels: Vec<LabelState>) -> Self {
        self.state_mut()
            .repos
            .entry(org.clone())
            .or_default()
            .insert(repo.clone(), RepoState {
                labels,
                issues: BTreeMap::new(),
            });
        self
    }

    /// Adds an open issue carrying `labels` to an existing repository.
    ///
    /// # Panics
    ///
    /// Panics if `org/repo` was not registered with [`Self::with_repo`].
    pub fn with_issue(
        mut self,
        org: &OrgName,
        repo: &RepoName,
        number: u64,
        labels: &[&str],
    ) -> Self {
        let Ok(state) = self.state_mut().repo_mut(org, repo) else {
            panic!("issue #{number} added to unregistered repository {org}/{repo}");
        };
        state.issues.insert(
            IssueNumber::new(number),
            labels.iter().map(|l| (*l).to_string()).collect(),
        );
        self
    }

    /// Makes every call matching `predicate` fail after being recorded.
    pub fn fail_when(
        mut self,
        predicate: impl Fn(&ClientCall) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.state_mut().failures.push(Box::new(predicate));
        self
    }

    /// Returns every call received so far, in order.
    pub fn calls(&self) -> Vec<ClientCall> {
        self.state().calls.clone()
    }

    /// Returns the current labels of a repository.
    pub fn labels(&self, org: &OrgName, repo: &RepoName) -> Vec<LabelState> {
        self.state()
            .repos
            .get(org)
            .and_then(|repos| repos.get(repo))
            .map(|r| r.labels.clone())
            .unwrap_or_default()
    }

    /// Returns the labels currently on an issue.
    pub fn issue_labels(&self, org: &OrgName, repo: &RepoName, number: u64) -> Vec<String> {
        self.state()
            .repos
            .get(org)
            .and_then(|repos| repos.get(repo))
            .and_then(|r| r.issues.get(&IssueNumber::new(number)))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the labels of every repository in `org`.
    pub fn snapshot(&self, org: &OrgName) -> RepoLabels {
        self.state()
            .repos
            .get(org)
            .map(|repos| {
                repos
                    .iter()
                    .map(|(name, r)| (name.clone(), r.labels.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

fn already_exists(name: &str) -> ClientError {
    ClientError::Api {
        status: 422,
        message: format!("label {name} already_exists"),
    }
}

#[async_trait]
impl LabelClient for InMemoryClient {
    async fn get_repos(&self, org: &OrgName, is_user: bool) -> Result<Vec<Repo>, ClientError> {
        let mut state = self.state();
        state.record(ClientCall::GetRepos {
            org: org.clone(),
            is_user,
        })?;
        Ok(state
            .repos
            .get(org)
            .map(|repos| repos.keys().map(|name| Repo { name: name.clone() }).collect())
            .unwrap_or_default())
    }

    async fn get_repo_labels(
        &self,
        org: &OrgName,
        repo: &RepoName,
    ) -> Result<Vec<LabelState>, ClientError> {
        let mut state = self.state();
        state.record(ClientCall::GetRepoLabels { repo: repo.clone() })?;
        Ok(state.repo_mut(org, repo)?.labels.clone())
    }

    async fn add_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        state.record(ClientCall::AddRepoLabel {
            repo: repo.clone(),
            name: name.to_string(),
        })?;
        let target = state.repo_mut(org, repo)?;
        if target.position(name).is_some() {
            return Err(already_exists(name));
        }
        target.labels.push(LabelState::new(name, color, description));
        Ok(())
    }

    async fn update_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        current_name: &str,
        new_name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        state.record(ClientCall::UpdateRepoLabel {
            repo: repo.clone(),
            current: current_name.to_string(),
            new_name: new_name.to_string(),
        })?;
        let target = state.repo_mut(org, repo)?;
        let index = target
            .position(current_name)
            .ok_or_else(|| ClientError::NotFound(format!("label {current_name}")))?;
        if let Some(other) = target.position(new_name) {
            if other != index {
                return Err(already_exists(new_name));
            }
        }
        let old_key = target.labels[index].key();
        target.labels[index] = LabelState::new(new_name, color, description);
        for labels in target.issues.values_mut() {
            for label in labels.iter_mut() {
                if LabelKey::from_name(label) == old_key {
                    *label = new_name.to_string();
                }
            }
        }
        Ok(())
    }

    async fn delete_repo_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        name: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        state.record(ClientCall::DeleteRepoLabel {
            repo: repo.clone(),
            name: name.to_string(),
        })?;
        let target = state.repo_mut(org, repo)?;
        let index = target
            .position(name)
            .ok_or_else(|| ClientError::NotFound(format!("label {name}")))?;
        target.labels.remove(index);
        let key = LabelKey::from_name(name);
        for labels in target.issues.values_mut() {
            labels.retain(|l| LabelKey::from_name(l) != key);
        }
        Ok(())
    }

    async fn add_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        number: IssueNumber,
        name: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        state.record(ClientCall::AddLabel {
            repo: repo.clone(),
            number,
            name: name.to_string(),
        })?;
        let labels = state
            .repo_mut(org, repo)?
            .issues
            .get_mut(&number)
            .ok_or_else(|| ClientError::NotFound(format!("issue {number}")))?;
        let key = LabelKey::from_name(name);
        if !labels.iter().any(|l| LabelKey::from_name(l) == key) {
            labels.push(name.to_string());
        }
        Ok(())
    }

    async fn remove_label(
        &self,
        org: &OrgName,
        repo: &RepoName,
        number: IssueNumber,
        name: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        state.record(ClientCall::RemoveLabel {
            repo: repo.clone(),
            number,
            name: name.to_string(),
        })?;
        let labels = state
            .repo_mut(org, repo)?
            .issues
            .get_mut(&number)
            .ok_or_else(|| ClientError::NotFound(format!("issue {number}")))?;
        let key = LabelKey::from_name(name);
        labels.retain(|l| LabelKey::from_name(l) != key);
        Ok(())
    }

    /// Results come back in issue-number order; `order` and `ascending` are
    /// accepted but not applied.
    async fn find_issues(
        &self,
        query: &IssueSearch,
        _order: &str,
        _ascending: bool,
    ) -> Result<Vec<Issue>, ClientError> {
        let mut state = self.state();
        state.record(ClientCall::FindIssues {
            query: query.to_string(),
        })?;
        let with = LabelKey::from_name(&query.with_label);
        let without = LabelKey::from_name(&query.without_label);
        let target = state.repo_mut(&query.org, &query.repo)?;
        Ok(target
            .issues
            .iter()
            .filter(|(_, labels)| {
                let has = |key: &LabelKey| labels.iter().any(|l| LabelKey::from_name(l) == *key);
                has(&with) && !has(&without)
            })
            .map(|(number, _)| Issue {
                number: *number,
                title: String::new(),
            })
            .collect())
    }
}
