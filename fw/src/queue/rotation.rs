//! Base rotation construction
//!
//! The rotation is built once by fair interleaving: step through every
//! group's target list one element at a time, round-robin across groups,
//! until all are exhausted. No group can monopolize the early rotation
//! slots, no matter how long its list is.

use serde::{Deserialize, Serialize};

/// One unit of work: a URL plus the grouping key it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// The URL to poll
    pub url: String,

    /// Grouping key, used for fair interleaving and observation routing
    pub group: String,
}

/// Build the base rotation from per-group target lists
pub fn interleave(groups: &[(String, Vec<String>)]) -> Vec<Target> {
    let longest = groups.iter().map(|(_, targets)| targets.len()).max().unwrap_or(0);

    let mut rotation = Vec::new();
    for i in 0..longest {
        for (name, targets) in groups {
            if let Some(url) = targets.get(i) {
                rotation.push(Target {
                    url: url.clone(),
                    group: name.clone(),
                });
            }
        }
    }
    rotation
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn group(name: &str, targets: &[&str]) -> (String, Vec<String>) {
        (name.to_string(), targets.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_round_robin_with_remainder() {
        let rotation = interleave(&[group("P1", &["p1a", "p1b"]), group("P2", &["p2a"])]);
        let urls: Vec<&str> = rotation.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["p1a", "p2a", "p1b"]);
    }

    #[test]
    fn test_groups_tagged_on_targets() {
        let rotation = interleave(&[group("P1", &["a"]), group("P2", &["b"])]);
        assert_eq!(rotation[0].group, "P1");
        assert_eq!(rotation[1].group, "P2");
    }

    #[test]
    fn test_empty_input() {
        assert!(interleave(&[]).is_empty());
        assert!(interleave(&[group("P1", &[])]).is_empty());
    }

    proptest! {
        /// Interleaving never drops or duplicates a target, and each group's
        /// targets keep their original relative order
        #[test]
        fn prop_interleave_is_a_fair_permutation(
            lists in proptest::collection::vec(proptest::collection::vec("[a-z]{1,8}", 0..6), 0..5)
        ) {
            let groups: Vec<(String, Vec<String>)> = lists
                .into_iter()
                .enumerate()
                .map(|(i, targets)| (format!("g{i}"), targets))
                .collect();

            let rotation = interleave(&groups);

            let expected: usize = groups.iter().map(|(_, t)| t.len()).sum();
            prop_assert_eq!(rotation.len(), expected);

            for (name, targets) in &groups {
                let seen: Vec<&str> = rotation
                    .iter()
                    .filter(|t| &t.group == name)
                    .map(|t| t.url.as_str())
                    .collect();
                let original: Vec<&str> = targets.iter().map(|s| s.as_str()).collect();
                prop_assert_eq!(seen, original);
            }
        }
    }
}
