//! The desired-state label taxonomy.
//!
//! A [`Configuration`] is a list of top-level [`Label`]s. Each label may list
//! the names it was previously known by in `previously`, recursively, so one
//! tree records both what a repository should look like today and every name
//! that has to be migrated away from.
//!
//! The document is YAML:
//!
//! ```yaml
//! labels:
//!   - name: triage/needs-information
//!     color: ee9900
//!     description: Indicates an issue needs more information.
//!     target: issues
//!     previously:
//!       - name: needs-sig
//!         color: ee9900
//!         description: ""
//!         target: issues
//!         deleteAfter: 2019-01-01T00:00:00Z
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{LabelKey, LabelState, SyncError, Timestamp};

/// What a label can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelTarget {
    /// Pull requests only.
    Prs,
    /// Issues only.
    Issues,
    /// Issues and pull requests.
    #[default]
    Both,
}

/// One node of the taxonomy tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// Current name of the label.
    pub name: String,
    /// `rrggbb` hex colour.
    pub color: String,
    /// What the label means and who can apply it.
    #[serde(default)]
    pub description: String,
    /// What the label can be applied to.
    #[serde(default)]
    pub target: LabelTarget,
    /// Which automation plugin adds or removes the label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prow_plugin: String,
    /// What human, plugin or bot adds the label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub added_by: String,
    /// Names this label was previously known by, newest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previously: Vec<Label>,
    /// Once this instant has passed the label is deleted from every repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_after: Option<Timestamp>,
}

impl Label {
    /// Creates a label with no history and no retirement date.
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            description: description.into(),
            target: LabelTarget::default(),
            prow_plugin: String::new(),
            added_by: String::new(),
            previously: Vec::new(),
            delete_after: None,
        }
    }

    /// Sets what the label applies to.
    pub fn with_target(mut self, target: LabelTarget) -> Self {
        self.target = target;
        self
    }

    /// Appends a previous name.
    pub fn with_previous(mut self, previous: Label) -> Self {
        self.previously.push(previous);
        self
    }

    /// Sets the retirement date.
    pub fn retired_at(mut self, at: Timestamp) -> Self {
        self.delete_after = Some(at);
        self
    }

    /// Returns the case-folded identity of this label.
    pub fn key(&self) -> LabelKey {
        LabelKey::from_name(&self.name)
    }

    /// Returns the flat name/colour/description of this node.
    pub fn state(&self) -> LabelState {
        LabelState::new(&self.name, &self.color, &self.description)
    }
}

/// The full taxonomy: every label that should exist, with its history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Top-level labels.
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Configuration {
    /// Parses and validates a YAML taxonomy document.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] when the document does not parse
    /// or when two labels anywhere in the tree share a name.
    pub fn from_yaml_str(document: &str) -> Result<Self, SyncError> {
        let config: Configuration = serde_yaml::from_str(document)
            .map_err(|e| SyncError::config(format!("failed to parse labels: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that no two labels, at any depth, share a lowercase name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigInvalid`] naming both colliding paths.
    pub fn validate(&self) -> Result<(), SyncError> {
        check_unique(&self.labels, "", &mut HashMap::new()).map_err(SyncError::config)
    }

    /// Returns the top-level labels that apply to exactly `target`.
    pub fn labels_by_target(&self, target: LabelTarget) -> Vec<&Label> {
        self.labels.iter().filter(|l| l.target == target).collect()
    }
}

/// Walks `labels` recursively, recording each lowercase name with its dotted
/// path (`.parent.child`). Returns a message on the first collision.
fn check_unique(
    labels: &[Label],
    parent: &str,
    seen: &mut HashMap<LabelKey, String>,
) -> Result<(), String> {
    for label in labels {
        let key = label.key();
        let path = format!("{parent}.{key}");
        if let Some(other) = seen.get(&key) {
            return Err(format!("duplicate label {key} at {path} and {other}"));
        }
        seen.insert(key, path.clone());
        check_unique(&label.previously, &path, seen)?;
    }
    Ok(())
}

/// Checks a flat list of observed labels for case-folded duplicates.
pub(crate) fn check_unique_states(labels: &[LabelState]) -> Result<(), String> {
    let mut seen: HashMap<LabelKey, &str> = HashMap::new();
    for label in labels {
        let key = label.key();
        if let Some(other) = seen.get(&key) {
            return Err(format!(
                "duplicate label {key}: {:?} and {:?}",
                other, label.name
            ));
        }
        seen.insert(key, &label.name);
    }
    Ok(())
}
