//! Run editing session
//!
//! [`RunEditor`] owns a run and applies user edits to it. Every edit runs the
//! same sequence: validate input, mutate, restore run invariants, regenerate
//! comparisons, then queue [`RunEvent`]s for whoever renders or persists the run.

use crate::comparisons::{AverageSegmentsGenerator, ComparisonGenerator};
use crate::error::EditError;
use crate::format::parse_optional_duration;
use crate::reconcile;
use crate::run::Run;
use crate::segment::{ComparisonName, PERSONAL_BEST_COMPARISON_NAME};
use crate::types::TimingMethod;
use chrono::Duration;
use serde::Serialize;

/// Change notification produced by an edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunEdited,
    SegmentRemovedOrAdded,
    ComparisonRenamed { old_name: String, new_name: String },
    ComparisonRemoved { name: String },
}

/// Stateful editor for a single run.
pub struct RunEditor {
    run: Run,
    selected_method: TimingMethod,
    generators: Vec<Box<dyn ComparisonGenerator>>,
    segment_times: Vec<Option<Duration>>,
    events: Vec<RunEvent>,
    changed_segments: Vec<String>,
}

impl RunEditor {
    /// Create an editor working on real time with the default generators
    pub fn new(run: Run) -> Self {
        Self::with_method(run, TimingMethod::RealTime)
    }

    /// Create an editor working on a specific timing method
    pub fn with_method(run: Run, method: TimingMethod) -> Self {
        let segment_times = run.segment_times(method);
        Self {
            run,
            selected_method: method,
            generators: vec![Box::new(AverageSegmentsGenerator::new())],
            segment_times,
            events: Vec::new(),
            changed_segments: Vec::new(),
        }
    }

    /// Replace the comparison generators run after every edit
    pub fn with_generators(mut self, generators: Vec<Box<dyn ComparisonGenerator>>) -> Self {
        self.generators = generators;
        self
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn into_run(self) -> Run {
        self.run
    }

    pub fn selected_method(&self) -> TimingMethod {
        self.selected_method
    }

    pub fn set_selected_method(&mut self, method: TimingMethod) {
        self.selected_method = method;
        self.segment_times = self.run.segment_times(method);
    }

    /// Local segment durations of the personal best for the selected method
    pub fn segment_times(&self) -> &[Option<Duration>] {
        &self.segment_times
    }

    /// Names of segments touched by value edits since the editor was created
    pub fn changed_segments(&self) -> &[String] {
        &self.changed_segments
    }

    /// Take every queued event
    pub fn drain_events(&mut self) -> Vec<RunEvent> {
        std::mem::take(&mut self.events)
    }

    /// Restore invariants and regenerate comparisons.
    pub fn fix(&mut self) {
        self.run.fix_splits();
        for generator in &self.generators {
            generator.generate_all(&mut self.run);
        }
        self.segment_times = self.run.segment_times(self.selected_method);
    }

    fn run_edited(&mut self) {
        self.run.has_changed = true;
        self.events.push(RunEvent::RunEdited);
    }

    fn segment_edited(&mut self, index: usize) {
        self.fix();
        self.run_edited();
        let name = self.run[index].name.clone();
        if !self.changed_segments.contains(&name) {
            self.changed_segments.push(name);
        }
    }

    fn structure_edited(&mut self) {
        self.fix();
        self.run_edited();
        self.events.push(RunEvent::SegmentRemovedOrAdded);
    }

    fn parse_time(&self, index: usize, text: &str) -> Result<Option<Duration>, EditError> {
        parse_optional_duration(text).map_err(|e| {
            log::warn!("rejected time for segment {}: {}", index, e);
            e
        })
    }

    /// Insert an empty segment before `index`
    pub fn insert_above(&mut self, index: usize) -> Result<(), EditError> {
        self.run.check_index(index)?;
        reconcile::insert_segment(&mut self.run, index)?;
        self.structure_edited();
        Ok(())
    }

    /// Insert an empty segment after `index`
    pub fn insert_below(&mut self, index: usize) -> Result<(), EditError> {
        self.run.check_index(index)?;
        reconcile::insert_segment(&mut self.run, index + 1)?;
        self.structure_edited();
        Ok(())
    }

    pub fn remove_segment(&mut self, index: usize) -> Result<(), EditError> {
        reconcile::delete_segment(&mut self.run, index)?;
        self.structure_edited();
        Ok(())
    }

    /// Remove several segments, highest index first.
    ///
    /// Indices out of range are skipped and the last remaining segment is
    /// never removed. Returns how many segments were removed.
    pub fn remove_segments(&mut self, indices: &[usize]) -> usize {
        let mut ordered = indices.to_vec();
        ordered.sort_unstable_by(|a, b| b.cmp(a));
        ordered.dedup();

        let mut removed = 0;
        for index in ordered {
            if self.run.len() <= 1 || index >= self.run.len() {
                continue;
            }
            if reconcile::delete_segment(&mut self.run, index).is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            self.structure_edited();
        }
        removed
    }

    /// Swap a segment with the one above it; no-op for the first segment
    pub fn move_up(&mut self, index: usize) -> Result<(), EditError> {
        self.run.check_index(index)?;
        if index == 0 {
            return Ok(());
        }
        reconcile::swap_adjacent(&mut self.run, index - 1)?;
        self.fix();
        self.run_edited();
        Ok(())
    }

    /// Swap a segment with the one below it; no-op for the last segment
    pub fn move_down(&mut self, index: usize) -> Result<(), EditError> {
        self.run.check_index(index)?;
        if index + 1 >= self.run.len() {
            return Ok(());
        }
        reconcile::swap_adjacent(&mut self.run, index)?;
        self.fix();
        self.run_edited();
        Ok(())
    }

    pub fn set_segment_name(&mut self, index: usize, name: &str) -> Result<(), EditError> {
        self.run.segment_mut(index)?.name = name.to_string();
        self.run_edited();
        Ok(())
    }

    pub fn set_icon(&mut self, index: usize, icon: Option<String>) -> Result<(), EditError> {
        self.run.segment_mut(index)?.icon = icon;
        self.run_edited();
        Ok(())
    }

    /// Set the personal best split from text; blank clears it
    pub fn set_split_time(&mut self, index: usize, text: &str) -> Result<(), EditError> {
        self.run.check_index(index)?;
        let value = self.parse_time(index, text)?;
        let method = self.selected_method;
        self.run.segments_mut()[index].personal_best_split_time[method] = value;
        self.segment_edited(index);
        Ok(())
    }

    /// Set the best segment from text; blank clears it
    pub fn set_best_segment_time(&mut self, index: usize, text: &str) -> Result<(), EditError> {
        self.run.check_index(index)?;
        let value = self.parse_time(index, text)?;
        let method = self.selected_method;
        self.run.segments_mut()[index].best_segment_time[method] = value;
        self.segment_edited(index);
        Ok(())
    }

    /// Set a local segment time from text and re-derive the splits
    pub fn set_segment_time(&mut self, index: usize, text: &str) -> Result<(), EditError> {
        self.run.check_index(index)?;
        let value = self.parse_time(index, text)?;
        let mut deltas = self.run.segment_times(self.selected_method);
        deltas[index] = value;
        reconcile::derive_from_deltas(&mut self.run, self.selected_method, &deltas)?;
        self.segment_edited(index);
        Ok(())
    }

    /// Set a cumulative comparison time from text; blank clears it
    pub fn set_comparison_time(
        &mut self,
        index: usize,
        comparison: &str,
        text: &str,
    ) -> Result<(), EditError> {
        self.run.check_index(index)?;
        let name = if comparison == PERSONAL_BEST_COMPARISON_NAME {
            ComparisonName::personal_best()
        } else {
            self.run
                .custom_comparisons
                .iter()
                .find(|c| c.as_str() == comparison)
                .cloned()
                .ok_or_else(|| EditError::UnknownComparison(comparison.to_string()))?
        };
        let value = self.parse_time(index, text)?;

        let method = self.selected_method;
        let segment = &mut self.run.segments_mut()[index];
        let time = segment.comparison(name.as_str()).with(method, value);
        segment.set_comparison(&name, time);
        self.segment_edited(index);
        Ok(())
    }

    pub fn set_game_name(&mut self, name: &str) {
        self.run.game_name = name.to_string();
        self.run_edited();
    }

    pub fn set_category_name(&mut self, name: &str) {
        self.run.category_name = name.to_string();
        self.run_edited();
    }

    pub fn set_offset(&mut self, text: &str) -> Result<(), EditError> {
        self.run.set_offset(text).map_err(|e| {
            log::warn!("rejected offset: {}", e);
            e
        })?;
        self.run.has_changed = true;
        Ok(())
    }

    pub fn set_attempt_count(&mut self, count: i64) {
        self.run.set_attempt_count(count);
        self.run_edited();
    }

    pub fn add_comparison(&mut self, name: &str) -> Result<(), EditError> {
        self.run.add_custom_comparison(name)?;
        self.run_edited();
        Ok(())
    }

    pub fn rename_comparison(&mut self, old: &str, new: &str) -> Result<(), EditError> {
        let new_name = self.run.rename_custom_comparison(old, new)?;
        if new_name.as_str() != old {
            self.events.push(RunEvent::ComparisonRenamed {
                old_name: old.to_string(),
                new_name: new_name.to_string(),
            });
        }
        self.run_edited();
        Ok(())
    }

    pub fn remove_comparison(&mut self, name: &str) -> Result<(), EditError> {
        self.run.remove_custom_comparison(name)?;
        self.events.push(RunEvent::ComparisonRemoved {
            name: name.to_string(),
        });
        self.run_edited();
        Ok(())
    }
}
