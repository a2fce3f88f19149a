//! Partitioning of the taxonomy tree into required, archaic and dead labels.

use std::collections::BTreeMap;

use crate::{Label, LabelKey, LabelState, Timestamp};

/// A previous name that should be migrated to its current label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchaicLabel {
    /// The historical node itself.
    pub label: Label,
    /// Resolved state of the top-level label this name now lives under.
    pub target: LabelState,
}

/// The three label sets derived from a taxonomy at one instant.
///
/// Keys are case-folded names. A name appears in at most one set because
/// the taxonomy forbids duplicate names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Labels every repository must carry.
    pub required: BTreeMap<LabelKey, Label>,
    /// Previous names to rename or migrate to their current label.
    pub archaic: BTreeMap<LabelKey, ArchaicLabel>,
    /// Names whose retirement date has passed; deleted outright.
    pub dead: BTreeMap<LabelKey, Label>,
}

impl Classification {
    /// Walks `labels` depth-first and sorts every node into a set.
    ///
    /// - a top-level node that is not past its retirement date is required;
    /// - any node whose `delete_after` lies before `now` is dead;
    /// - any other historical node is archaic, pointing at its top-level
    ///   ancestor no matter how deep the rename chain goes.
    pub fn classify(labels: &[Label], now: Timestamp) -> Self {
        let mut sets = Self::default();
        sets.walk(labels, now, None);
        sets
    }

    fn walk(&mut self, labels: &[Label], now: Timestamp, root: Option<&Label>) {
        for label in labels {
            let expired = label.delete_after.is_some_and(|at| now > at);
            match root {
                _ if expired => {
                    self.dead.insert(label.key(), label.clone());
                }
                None => {
                    self.required.insert(label.key(), label.clone());
                }
                Some(root) => {
                    self.archaic.insert(
                        label.key(),
                        ArchaicLabel {
                            label: label.clone(),
                            target: root.state(),
                        },
                    );
                }
            }
            self.walk(&label.previously, now, Some(root.unwrap_or(label)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: &str) -> Timestamp {
        Timestamp::parse_rfc3339(value).unwrap()
    }

    fn now() -> Timestamp {
        at("2020-06-01T00:00:00Z")
    }

    fn key(name: &str) -> LabelKey {
        LabelKey::from_name(name)
    }

    #[test]
    fn test_top_level_labels_are_required() {
        let labels = vec![Label::new("Bug", "d73a4a", ""), Label::new("lgtm", "15dd18", "")];
        let sets = Classification::classify(&labels, now());
        assert_eq!(sets.required.len(), 2);
        assert_eq!(sets.required[&key("bug")].name, "Bug");
        assert!(sets.archaic.is_empty());
        assert!(sets.dead.is_empty());
    }

    #[test]
    fn test_history_resolves_to_the_top_level_ancestor() {
        let labels = vec![Label::new("triage/needs-information", "ee9900", "more info")
            .with_previous(
                Label::new("needs-sig", "ffffff", "")
                    .with_previous(Label::new("needs-sig-label", "000000", "")),
            )];
        let sets = Classification::classify(&labels, now());

        assert_eq!(sets.archaic.len(), 2);
        for name in ["needs-sig", "needs-sig-label"] {
            let archaic = &sets.archaic[&key(name)];
            assert_eq!(archaic.label.name, name);
            assert_eq!(archaic.target.name, "triage/needs-information");
            assert_eq!(archaic.target.color, "ee9900");
        }
    }

    #[test]
    fn test_expired_labels_are_dead_at_any_depth() {
        let past = at("2019-01-01T00:00:00Z");
        let labels = vec![
            Label::new("retired", "000000", "").retired_at(past),
            Label::new("current", "111111", "").with_previous(
                Label::new("older", "222222", "")
                    .with_previous(Label::new("oldest", "333333", "").retired_at(past)),
            ),
        ];
        let sets = Classification::classify(&labels, now());

        assert!(sets.dead.contains_key(&key("retired")));
        assert!(sets.dead.contains_key(&key("oldest")));
        assert!(sets.archaic.contains_key(&key("older")));
        assert!(!sets.archaic.contains_key(&key("oldest")));
        assert!(!sets.required.contains_key(&key("retired")));
    }

    #[test]
    fn test_history_below_a_dead_label_still_migrates_to_the_root() {
        let past = at("2019-01-01T00:00:00Z");
        let labels = vec![Label::new("current", "111111", "").with_previous(
            Label::new("older", "222222", "")
                .retired_at(past)
                .with_previous(Label::new("oldest", "333333", "")),
        )];
        let sets = Classification::classify(&labels, now());

        assert!(sets.dead.contains_key(&key("older")));
        assert_eq!(sets.archaic[&key("oldest")].target.name, "current");
    }

    #[test]
    fn test_retirement_in_the_future_keeps_history_archaic() {
        let future = at("2030-01-01T00:00:00Z");
        let labels = vec![Label::new("current", "111111", "")
            .with_previous(Label::new("older", "222222", "").retired_at(future))];
        let sets = Classification::classify(&labels, now());

        assert!(sets.archaic.contains_key(&key("older")));
        assert!(sets.dead.is_empty());
    }

    #[test]
    fn test_top_level_label_with_future_retirement_stays_required() {
        let future = at("2030-01-01T00:00:00Z");
        let labels = vec![Label::new("sunsetting", "111111", "").retired_at(future)];
        let sets = Classification::classify(&labels, now());

        assert!(sets.required.contains_key(&key("sunsetting")));
        assert!(sets.dead.is_empty());
    }

    #[test]
    fn test_retirement_exactly_now_is_not_yet_dead() {
        let labels = vec![Label::new("edge", "111111", "").retired_at(now())];
        let sets = Classification::classify(&labels, now());
        assert!(sets.dead.is_empty());
    }
}
