//! Operational parameters for a sync run.
//!
//! The CLI builds one [`SyncConfig`] from its flags and hands it to the
//! engine. Nothing in the domain or engine reads flags or the environment.

use std::collections::BTreeSet;

use crate::{OrgName, RepoName, SyncError};

/// Worker pool size used when none is configured.
pub const DEFAULT_WORKERS: usize = 20;

/// An organisation to sync, or a user's repositories when written `user:NAME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgSpec {
    /// Organisation or user login.
    pub name: OrgName,
    /// Whether `name` is a user rather than an organisation.
    pub is_user: bool,
}

impl OrgSpec {
    /// Parses `kubernetes` or `user:octocat`. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] when the name is empty.
    pub fn parse(value: &str) -> Result<Self, SyncError> {
        let value = value.trim();
        let (name, is_user) = match value.split_once(':') {
            Some(("user", login)) if !login.contains(':') => (login, true),
            _ => (value, false),
        };
        let name = OrgName::new(name)
            .ok_or_else(|| SyncError::config(format!("empty organisation in {value:?}")))?;
        Ok(Self { name, is_user })
    }
}

/// Which repositories of an organisation take part in a run.
///
/// Entries are `org/repo` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RepoFilter {
    /// Every repository.
    #[default]
    All,
    /// Only the listed repositories.
    Only(BTreeSet<String>),
    /// Every repository except the listed ones.
    Skip(BTreeSet<String>),
}

impl RepoFilter {
    /// Builds a filter from an allow-list and a deny-list, at most one of
    /// which may be non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] when both lists are given.
    pub fn from_lists(only: &[String], skip: &[String]) -> Result<Self, SyncError> {
        let collect = |items: &[String]| -> BTreeSet<String> {
            items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        let (only, skip) = (collect(only), collect(skip));
        match (only.is_empty(), skip.is_empty()) {
            (false, false) => Err(SyncError::config("--only and --skip cannot both be set")),
            (false, true) => Ok(Self::Only(only)),
            (true, false) => Ok(Self::Skip(skip)),
            (true, true) => Ok(Self::All),
        }
    }

    /// Returns whether `org/repo` takes part in the run.
    pub fn allows(&self, org: &OrgName, repo: &RepoName) -> bool {
        let full = format!("{org}/{repo}");
        match self {
            Self::All => true,
            Self::Only(only) => only.contains(&full),
            Self::Skip(skip) => !skip.contains(&full),
        }
    }
}

/// Everything the engine needs to know about a run besides the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Organisations to process, in order.
    pub orgs: Vec<OrgSpec>,
    /// Repository selection.
    pub filter: RepoFilter,
    /// Whether planned updates are applied. `false` stops after planning.
    pub confirm: bool,
    /// Size of the fetch and apply worker pools.
    pub workers: usize,
}

impl SyncConfig {
    /// Validates and assembles a run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] when no organisation is given or
    /// `workers` is zero.
    pub fn new(
        orgs: Vec<OrgSpec>,
        filter: RepoFilter,
        confirm: bool,
        workers: usize,
    ) -> Result<Self, SyncError> {
        if orgs.is_empty() {
            return Err(SyncError::config("no organisations to sync"));
        }
        if workers == 0 {
            return Err(SyncError::config("worker pool size must be at least 1"));
        }
        Ok(Self {
            orgs,
            filter,
            confirm,
            workers,
        })
    }
}
