//! Shared value types for the label domain.
//!
//! These are the shapes exchanged with the remote system: the flat state of a
//! label as GitHub stores it, the repositories and issues returned by listing
//! and search calls, and the wall-clock [`Timestamp`] used to decide which
//! retired labels are due for deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IssueNumber, LabelKey, RepoName};

// ---------------------------------------------------------------------------
// Label state
// ---------------------------------------------------------------------------

/// The flat state of a label in a repository: name, colour and description.
///
/// Used for labels observed on a repository and for the `current`/`wanted`
/// sides of an [`crate::Update`]. Unlike [`crate::Label`] it carries no
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelState {
    /// Display name, with the case GitHub stores.
    pub name: String,
    /// `rrggbb` hex colour without a leading `#`.
    pub color: String,
    /// Free-text description; empty when unset.
    #[serde(default)]
    pub description: String,
}

impl LabelState {
    /// Creates a label state.
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            description: description.into(),
        }
    }

    /// Returns the case-folded identity of this label.
    pub fn key(&self) -> LabelKey {
        LabelKey::from_name(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Remote objects
// ---------------------------------------------------------------------------

/// A repository returned by an organisation or user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    /// Repository name without the owner prefix.
    pub name: RepoName,
}

/// An issue or pull request returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number within its repository.
    pub number: IssueNumber,
    /// Issue title, for logging.
    #[serde(default)]
    pub title: String,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly. Serialises as an RFC 3339 string, which is the format of
/// `deleteAfter` in the taxonomy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 timestamp such as `2017-08-01T00:00:00Z`.
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering_follows_wall_clock() {
        let early = Timestamp::parse_rfc3339("2017-08-01T00:00:00Z").unwrap();
        let late = Timestamp::parse_rfc3339("2017-08-01T00:00:01Z").unwrap();
        assert!(late > early);
        assert!(Timestamp::parse_rfc3339("not a date").is_none());
    }

    #[test]
    fn test_label_state_key_ignores_case() {
        let label = LabelState::new("Needs-Rebase", "e11d21", "");
        assert_eq!(label.key().as_str(), "needs-rebase");
    }
}
