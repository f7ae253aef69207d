//! Segments and their per-segment records
//!
//! A segment owns its personal best split, its best segment, the history of
//! durations recorded by each attempt and a table of named comparisons.

use crate::error::EditError;
use crate::types::{IndexedTime, Time};
use serde::{Deserialize, Serialize};

/// Name of the comparison backed by the personal best splits
pub const PERSONAL_BEST_COMPARISON_NAME: &str = "Personal Best";

/// Prefix reserved for comparisons injected by races
pub const RACE_COMPARISON_PREFIX: &str = "[Race]";

/// A comparison name that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComparisonName(String);

impl ComparisonName {
    /// Validate a comparison name.
    ///
    /// Names must be non-blank and must not start with [`RACE_COMPARISON_PREFIX`].
    pub fn new(name: impl Into<String>) -> Result<Self, EditError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EditError::InvalidComparisonName(
                "comparison name cannot be blank".to_string(),
            ));
        }
        if name.starts_with(RACE_COMPARISON_PREFIX) {
            return Err(EditError::InvalidComparisonName(format!(
                "'{}' cannot start with {}",
                name, RACE_COMPARISON_PREFIX
            )));
        }
        Ok(Self(name))
    }

    pub fn personal_best() -> Self {
        Self(PERSONAL_BEST_COMPARISON_NAME.to_string())
    }

    /// Name owned by the crate itself, known to be valid
    pub(crate) fn reserved(name: &'static str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_personal_best(&self) -> bool {
        self.0 == PERSONAL_BEST_COMPARISON_NAME
    }
}

impl TryFrom<String> for ComparisonName {
    type Error = EditError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ComparisonName> for String {
    fn from(name: ComparisonName) -> Self {
        name.0
    }
}

impl std::fmt::Display for ComparisonName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ComparisonEntry {
    name: ComparisonName,
    time: Time,
}

/// Insertion-ordered mapping from comparison name to cumulative time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Comparisons {
    entries: Vec<ComparisonEntry>,
}

impl Comparisons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time for a name; absent in both methods if the name is unknown
    pub fn get(&self, name: &str) -> Time {
        self.get_opt(name).copied().unwrap_or_default()
    }

    pub fn get_opt(&self, name: &str) -> Option<&Time> {
        self.entries
            .iter()
            .find(|entry| entry.name.as_str() == name)
            .map(|entry| &entry.time)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_opt(name).is_some()
    }

    /// Insert or replace; a replaced entry keeps its position
    pub fn insert(&mut self, name: ComparisonName, time: Time) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.time = time,
            None => self.entries.push(ComparisonEntry { name, time }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Time> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.name.as_str() == name)?;
        Some(self.entries.remove(position).time)
    }

    /// Rename in place; returns false when `old` is not present
    pub fn rename(&mut self, old: &str, new: ComparisonName) -> bool {
        self.entries.retain(|entry| entry.name != new || entry.name.as_str() == old);
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.name.as_str() == old)
        {
            Some(entry) => {
                entry.name = new;
                true
            }
            None => false,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &ComparisonName> {
        self.entries.iter().map(|entry| &entry.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ComparisonName, &Time)> {
        self.entries.iter().map(|entry| (&entry.name, &entry.time))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Durations a segment took in each attempt, sorted and unique by index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<IndexedTime>", into = "Vec<IndexedTime>")]
pub struct SegmentHistory {
    entries: Vec<IndexedTime>,
}

impl SegmentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: i32) -> Option<&Time> {
        self.position(index).ok().map(|pos| &self.entries[pos].time)
    }

    pub fn get_mut(&mut self, index: i32) -> Option<&mut Time> {
        match self.position(index) {
            Ok(pos) => Some(&mut self.entries[pos].time),
            Err(_) => None,
        }
    }

    pub fn contains(&self, index: i32) -> bool {
        self.position(index).is_ok()
    }

    /// Record a time for an attempt, replacing any existing entry
    pub fn insert(&mut self, index: i32, time: Time) {
        match self.position(index) {
            Ok(pos) => self.entries[pos].time = time,
            Err(pos) => self.entries.insert(pos, IndexedTime::new(time, index)),
        }
    }

    pub fn remove(&mut self, index: i32) -> Option<Time> {
        let pos = self.position(index).ok()?;
        Some(self.entries.remove(pos).time)
    }

    pub fn min_index(&self) -> Option<i32> {
        self.entries.first().map(|entry| entry.index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedTime> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, index: i32) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&index, |entry| entry.index)
    }
}

impl From<Vec<IndexedTime>> for SegmentHistory {
    fn from(entries: Vec<IndexedTime>) -> Self {
        let mut history = SegmentHistory::new();
        for entry in entries {
            history.insert(entry.index, entry.time);
        }
        history
    }
}

impl From<SegmentHistory> for Vec<IndexedTime> {
    fn from(history: SegmentHistory) -> Self {
        history.entries
    }
}

/// One ordered step of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    /// Opaque icon reference owned by the presentation layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub personal_best_split_time: Time,
    #[serde(default)]
    pub best_segment_time: Time,
    #[serde(default)]
    pub segment_history: SegmentHistory,
    #[serde(default)]
    pub comparisons: Comparisons,
}

impl Segment {
    /// Create an empty segment
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Cumulative time of a comparison, with "Personal Best" mapped to the PB split
    pub fn comparison(&self, name: &str) -> Time {
        if name == PERSONAL_BEST_COMPARISON_NAME {
            self.personal_best_split_time
        } else {
            self.comparisons.get(name)
        }
    }

    pub fn has_comparison(&self, name: &str) -> bool {
        name == PERSONAL_BEST_COMPARISON_NAME || self.comparisons.contains(name)
    }

    pub fn set_comparison(&mut self, name: &ComparisonName, time: Time) {
        if name.is_personal_best() {
            self.personal_best_split_time = time;
        } else {
            self.comparisons.insert(name.clone(), time);
        }
    }

    /// Every comparison this segment carries, personal best first
    pub fn comparison_names(&self) -> Vec<ComparisonName> {
        std::iter::once(ComparisonName::personal_best())
            .chain(self.comparisons.names().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimingMethod;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn real(seconds: i64) -> Time {
        Time::new(Some(Duration::seconds(seconds)), None)
    }

    #[test]
    fn test_comparison_name_rejects_race_prefix() {
        assert!(ComparisonName::new("[Race] someone").is_err());
        assert!(ComparisonName::new("  ").is_err());
        assert!(ComparisonName::new("Race Pace").is_ok());
    }

    #[test]
    fn test_comparison_name_validated_on_deserialize() {
        let parsed: Result<ComparisonName, _> = serde_json::from_str(r#""[Race] x""#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_comparisons_keep_insertion_order() {
        let mut comparisons = Comparisons::new();
        comparisons.insert(ComparisonName::new("b").unwrap(), real(1));
        comparisons.insert(ComparisonName::new("a").unwrap(), real(2));
        comparisons.insert(ComparisonName::new("b").unwrap(), real(3));

        let names: Vec<&str> = comparisons.names().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(comparisons.get("b"), real(3));
        assert_eq!(comparisons.get("missing"), Time::default());
    }

    #[test]
    fn test_comparisons_rename_and_remove() {
        let mut comparisons = Comparisons::new();
        comparisons.insert(ComparisonName::new("old").unwrap(), real(1));
        assert!(comparisons.rename("old", ComparisonName::new("new").unwrap()));
        assert!(!comparisons.contains("old"));
        assert_eq!(comparisons.remove("new"), Some(real(1)));
        assert!(comparisons.is_empty());
    }

    #[test]
    fn test_history_sorted_and_unique() {
        let mut history = SegmentHistory::new();
        history.insert(3, real(3));
        history.insert(1, real(1));
        history.insert(3, real(30));

        let indices: Vec<i32> = history.iter().map(|entry| entry.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(history.get(3), Some(&real(30)));
        assert_eq!(history.min_index(), Some(1));
        assert_eq!(history.remove(2), None);
    }

    #[test]
    fn test_history_deserialize_deduplicates() {
        let json = r#"[{"time":{"real_time":"0:02"},"index":2},{"time":{"real_time":"0:01"},"index":1}]"#;
        let history: SegmentHistory = serde_json::from_str(json).unwrap();
        let indices: Vec<i32> = history.iter().map(|entry| entry.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_personal_best_comparison_aliases_split() {
        let mut segment = Segment::new("Level 1");
        segment.set_comparison(&ComparisonName::personal_best(), real(42));
        assert_eq!(segment.personal_best_split_time, real(42));
        assert_eq!(
            segment.comparison(PERSONAL_BEST_COMPARISON_NAME)[TimingMethod::RealTime],
            Some(Duration::seconds(42))
        );
        assert!(segment.comparisons.is_empty());
    }
}
