//! Run aggregate
//!
//! A run is the ordered, never-empty list of segments plus the metadata that
//! describes the attempts made at it. This module also hosts the run-wide
//! consistency pass ([`Run::fix_splits`]) and the helpers the reconciler relies
//! on for walking attempt history.

use crate::comparisons::GENERATED_COMPARISON_NAMES;
use crate::error::EditError;
use crate::format::{duration_text, parse_duration};
use crate::segment::{ComparisonName, Segment, PERSONAL_BEST_COMPARISON_NAME};
use crate::types::{sub_durations, Time, TimingMethod};
use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A full run definition with its attempt history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub game_name: String,
    #[serde(default)]
    pub category_name: String,
    /// Time the timer starts at
    #[serde(default = "Duration::zero", with = "duration_text")]
    pub offset: Duration,
    #[serde(default)]
    pub attempt_count: u32,
    /// Highest attempt index ever recorded
    #[serde(default)]
    pub run_history_count: i32,
    pub(crate) segments: Vec<Segment>,
    /// User comparisons, unique and never a reserved or generated name
    #[serde(default, deserialize_with = "deserialize_custom_comparisons")]
    pub custom_comparisons: Vec<ComparisonName>,
    #[serde(skip)]
    pub has_changed: bool,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            game_name: String::new(),
            category_name: String::new(),
            offset: Duration::zero(),
            attempt_count: 0,
            run_history_count: 0,
            segments: vec![Segment::new("")],
            custom_comparisons: Vec::new(),
            has_changed: false,
        }
    }
}

impl Run {
    /// Create a run from segments; fails when there are none
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self, EditError> {
        if segments.is_empty() {
            return Err(EditError::EmptyRun);
        }
        Ok(Self {
            segments,
            ..Default::default()
        })
    }

    /// Create a run of empty segments with the given names
    pub fn with_segment_names<I, S>(names: I) -> Result<Self, EditError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_segments(names.into_iter().map(Segment::new).collect())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Mutable access to segment contents; the segment count cannot change here
    pub fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    pub fn segment_mut(&mut self, index: usize) -> Result<&mut Segment, EditError> {
        self.check_index(index)?;
        Ok(&mut self.segments[index])
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), EditError> {
        if index < self.segments.len() {
            Ok(())
        } else {
            Err(EditError::SegmentOutOfRange {
                index,
                len: self.segments.len(),
            })
        }
    }

    /// Set the attempt count, clamping negative input to zero
    pub fn set_attempt_count(&mut self, count: i64) {
        self.attempt_count = count.clamp(0, u32::MAX as i64) as u32;
    }

    /// Parse and set the start offset; the run is unchanged on failure
    pub fn set_offset(&mut self, text: &str) -> Result<(), EditError> {
        self.offset = parse_duration(text)?;
        Ok(())
    }

    /// Lowest attempt index in any segment history, never above 1
    pub fn min_segment_history_index(&self) -> i32 {
        self.segments
            .iter()
            .filter_map(|segment| segment.segment_history.min_index())
            .fold(1, i32::min)
    }

    /// Preserve a segment's best time as a history entry below every attempt
    pub fn import_best_segment(&mut self, index: usize) -> Result<(), EditError> {
        self.check_index(index)?;
        let best = self.segments[index].best_segment_time;
        if best.is_empty() {
            return Ok(());
        }
        let slot = self.min_segment_history_index() - 1;
        log::debug!(
            "importing best segment of '{}' at history index {}",
            self.segments[index].name,
            slot
        );
        self.segments[index].segment_history.insert(slot, best);
        Ok(())
    }

    /// Local segment durations derived from the personal best splits.
    ///
    /// Each value is the split minus the last present split before it; a
    /// segment without a split has no duration.
    pub fn segment_times(&self, method: TimingMethod) -> Vec<Option<Duration>> {
        let mut previous = Duration::zero();
        self.segments
            .iter()
            .map(|segment| match segment.personal_best_split_time[method] {
                Some(split) => {
                    let delta = split.checked_sub(&previous);
                    previous = split;
                    delta
                }
                None => None,
            })
            .collect()
    }

    /// Every comparison name present anywhere in the run, personal best first
    pub fn comparison_names(&self) -> Vec<ComparisonName> {
        let mut names = vec![ComparisonName::personal_best()];
        let stored = self
            .custom_comparisons
            .iter()
            .cloned()
            .chain(self.segments.iter().flat_map(|s| s.comparisons.names().cloned()));
        for name in stored {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// True if a name is already taken by any comparison
    pub fn has_comparison(&self, name: &str) -> bool {
        name == PERSONAL_BEST_COMPARISON_NAME
            || GENERATED_COMPARISON_NAMES.contains(&name)
            || self.custom_comparisons.iter().any(|c| c.as_str() == name)
            || self.segments.iter().any(|s| s.comparisons.contains(name))
    }

    /// Register a new custom comparison
    pub fn add_custom_comparison(&mut self, name: &str) -> Result<ComparisonName, EditError> {
        let name = ComparisonName::new(name)?;
        if self.has_comparison(name.as_str()) {
            return Err(EditError::DuplicateComparison(name.to_string()));
        }
        self.custom_comparisons.push(name.clone());
        Ok(name)
    }

    /// Rename a custom comparison on the run and every segment
    pub fn rename_custom_comparison(
        &mut self,
        old: &str,
        new: &str,
    ) -> Result<ComparisonName, EditError> {
        let position = self
            .custom_comparisons
            .iter()
            .position(|c| c.as_str() == old)
            .ok_or_else(|| EditError::UnknownComparison(old.to_string()))?;
        let new_name = ComparisonName::new(new)?;
        if new_name.as_str() == old {
            return Ok(new_name);
        }
        if self.has_comparison(new_name.as_str()) {
            return Err(EditError::DuplicateComparison(new_name.to_string()));
        }

        self.custom_comparisons[position] = new_name.clone();
        for segment in &mut self.segments {
            segment.comparisons.rename(old, new_name.clone());
        }
        Ok(new_name)
    }

    /// Remove a custom comparison from the run and every segment
    pub fn remove_custom_comparison(&mut self, name: &str) -> Result<(), EditError> {
        let position = self
            .custom_comparisons
            .iter()
            .position(|c| c.as_str() == name)
            .ok_or_else(|| EditError::UnknownComparison(name.to_string()))?;
        self.custom_comparisons.remove(position);
        for segment in &mut self.segments {
            segment.comparisons.remove(name);
        }
        Ok(())
    }

    /// Restore split ordering and best segment minimality for both methods.
    pub fn fix_splits(&mut self) {
        for method in TimingMethod::ALL {
            self.fix_comparison_order(method);
            self.fix_best_segments(method);
        }
    }

    fn fix_comparison_order(&mut self, method: TimingMethod) {
        for name in self.comparison_names() {
            let mut previous: Option<Duration> = None;
            for segment in &mut self.segments {
                let mut time = segment.comparison(name.as_str());
                if let (Some(current), Some(floor)) = (time[method], previous) {
                    if current < floor {
                        log::debug!(
                            "raising '{}' {} of '{}' to previous split",
                            name,
                            method.as_str(),
                            segment.name
                        );
                        time[method] = Some(floor);
                        segment.set_comparison(&name, time);
                    }
                }
                if time[method].is_some() {
                    previous = time[method];
                }
            }
        }
    }

    fn fix_best_segments(&mut self, method: TimingMethod) {
        let mut previous_split = Some(Duration::zero());
        for segment in &mut self.segments {
            let split = segment.personal_best_split_time[method];
            let mut best = segment.best_segment_time[method];

            let candidates = std::iter::once(sub_durations(split, previous_split)).chain(
                segment
                    .segment_history
                    .iter()
                    .map(|entry| entry.time[method]),
            );
            for candidate in candidates.flatten() {
                if best.map_or(true, |current| candidate < current) {
                    best = Some(candidate);
                }
            }

            segment.best_segment_time[method] = best;
            previous_split = split;
        }
    }

    /// Report every broken ordering or minimality invariant
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for method in TimingMethod::ALL {
            let mut previous: Option<Duration> = None;
            for (index, segment) in self.segments.iter().enumerate() {
                if let Some(split) = segment.personal_best_split_time[method] {
                    if previous.map_or(false, |floor| split < floor) {
                        violations.push(InvariantViolation::SplitOrder { segment: index, method });
                    }
                    previous = Some(split);
                }

                let best = segment.best_segment_time;
                for entry in segment.segment_history.iter() {
                    let entry_time = entry.time[method];
                    let too_slow = match (best[method], entry_time) {
                        (None, Some(_)) => true,
                        (Some(_), Some(_)) => entry.time.is_less(&best, method),
                        _ => false,
                    };
                    if too_slow {
                        violations.push(InvariantViolation::BestSegmentNotMinimal {
                            segment: index,
                            method,
                            attempt: entry.index,
                        });
                    }
                }
            }
        }
        violations
    }

    /// Load a run from JSON
    pub fn from_json(json: &str) -> Result<Self, EditError> {
        let run: Run = serde_json::from_str(json)?;
        if run.segments.is_empty() {
            return Err(EditError::EmptyRun);
        }
        Ok(run)
    }

    /// Serialize the run to JSON
    pub fn to_json(&self) -> Result<String, EditError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize the run to indented JSON
    pub fn to_json_pretty(&self) -> Result<String, EditError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::ops::Index<usize> for Run {
    type Output = Segment;

    fn index(&self, index: usize) -> &Segment {
        &self.segments[index]
    }
}

fn deserialize_custom_comparisons<'de, D>(deserializer: D) -> Result<Vec<ComparisonName>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let names = Vec::<ComparisonName>::deserialize(deserializer)?;
    for (position, name) in names.iter().enumerate() {
        if name.is_personal_best() || GENERATED_COMPARISON_NAMES.contains(&name.as_str()) {
            return Err(D::Error::custom(format!(
                "'{}' cannot be a custom comparison",
                name
            )));
        }
        if names[..position].contains(name) {
            return Err(D::Error::custom(format!(
                "custom comparison '{}' is listed twice",
                name
            )));
        }
    }
    Ok(names)
}

/// A broken run invariant found by [`Run::check_invariants`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// A split is earlier than the split before it
    SplitOrder { segment: usize, method: TimingMethod },
    /// A history duration beats the recorded best segment
    BestSegmentNotMinimal {
        segment: usize,
        method: TimingMethod,
        attempt: i32,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::SplitOrder { segment, method } => write!(
                f,
                "segment {} {} split is earlier than the previous split",
                segment,
                method.as_str()
            ),
            InvariantViolation::BestSegmentNotMinimal {
                segment,
                method,
                attempt,
            } => write!(
                f,
                "segment {} {} best segment is slower than attempt {}",
                segment,
                method.as_str(),
                attempt
            ),
        }
    }
}

/// Shorthand used by tests across the crate
#[cfg(test)]
pub(crate) fn real_time(seconds: i64) -> Time {
    Time::new(Some(Duration::seconds(seconds)), None)
}
