//! Rolling, deduplicated list of recent mistakes for a course

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of mistakes kept per course
pub const RECENT_MISTAKES_CAPACITY: usize = 10;

/// Recent mistakes, oldest first.
///
/// Never holds more than [`RECENT_MISTAKES_CAPACITY`] entries and never holds
/// the same string twice. Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RecentMistakes {
    entries: VecDeque<String>,
}

impl RecentMistakes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge newly reported mistakes.
    ///
    /// Strings already present are skipped; the oldest entries are evicted
    /// once the capacity is exceeded. Returns true if anything changed.
    pub fn merge<I, S>(&mut self, mistakes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changed = false;
        for mistake in mistakes {
            let mistake = mistake.as_ref();
            if self.entries.iter().any(|m| m == mistake) {
                continue;
            }
            self.entries.push_back(mistake.to_string());
            changed = true;
        }
        while self.entries.len() > RECENT_MISTAKES_CAPACITY {
            self.entries.pop_front();
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, mistake: &str) -> bool {
        self.entries.iter().any(|m| m == mistake)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl From<Vec<String>> for RecentMistakes {
    /// Restores a persisted list, re-applying the invariants in case the
    /// stored blob was edited or written by an older client.
    fn from(list: Vec<String>) -> Self {
        let mut mistakes = RecentMistakes::new();
        mistakes.merge(list);
        mistakes
    }
}

impl From<RecentMistakes> for Vec<String> {
    fn from(mistakes: RecentMistakes) -> Self {
        mistakes.entries.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_merge_skips_duplicates() {
        let mut m = RecentMistakes::new();
        assert!(m.merge(["a", "b"]));
        assert!(!m.merge(["a"]));
        assert!(m.merge(["b", "c", "c"]));
        assert_eq!(m.to_vec(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let mut m = RecentMistakes::new();
        m.merge((0..8).map(|i| format!("m{}", i)));
        m.merge((8..13).map(|i| format!("m{}", i)));
        assert_eq!(m.len(), RECENT_MISTAKES_CAPACITY);
        assert!(!m.contains("m0"));
        assert!(!m.contains("m2"));
        assert!(m.contains("m3"));
        assert_eq!(m.iter().last(), Some("m12"));
    }

    #[test]
    fn test_invariants_hold_over_many_turns() {
        let mut m = RecentMistakes::new();
        for turn in 0..50 {
            let reported: Vec<String> =
                (0..(turn % 4)).map(|i| format!("mistake-{}", (turn * 3 + i) % 17)).collect();
            m.merge(&reported);

            assert!(m.len() <= RECENT_MISTAKES_CAPACITY);
            let unique: HashSet<&str> = m.iter().collect();
            assert_eq!(unique.len(), m.len());
        }
    }

    #[test]
    fn test_restore_reapplies_invariants() {
        let stored: Vec<String> = ["x", "x"]
            .iter()
            .map(|s| s.to_string())
            .chain((0..12).map(|i| i.to_string()))
            .collect();
        let json = serde_json::to_string(&stored).unwrap();
        let m: RecentMistakes = serde_json::from_str(&json).unwrap();
        assert_eq!(m.len(), RECENT_MISTAKES_CAPACITY);
        assert_eq!(serde_json::to_value(&m).unwrap().as_array().unwrap().len(), 10);
    }
}
