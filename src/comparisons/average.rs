//! Average Segments comparison
//!
//! Builds a cumulative comparison out of recency-weighted mean segment
//! durations. Each attempt contributes to a segment only when the duration it
//! recorded there can be attributed to that segment alone.

use super::ComparisonGenerator;
use crate::error::EditError;
use crate::run::Run;
use crate::segment::ComparisonName;
use crate::types::{duration_from_seconds, duration_to_seconds, TimingMethod};
use chrono::Duration;

pub const AVERAGE_SEGMENTS_COMPARISON_NAME: &str = "Average Segments";

/// Weight ratio between an attempt and the one after it
pub const DEFAULT_RECENCY_DECAY: f64 = 0.9;

/// Generator for the "Average Segments" comparison
#[derive(Debug, Clone, Copy)]
pub struct AverageSegmentsGenerator {
    decay: f64,
}

impl Default for AverageSegmentsGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl AverageSegmentsGenerator {
    pub fn new() -> Self {
        Self {
            decay: DEFAULT_RECENCY_DECAY,
        }
    }

    /// Create a generator with a custom recency decay in (0, 1]; 1.0 is a plain mean
    pub fn with_decay(decay: f64) -> Result<Self, EditError> {
        if decay > 0.0 && decay <= 1.0 {
            Ok(Self { decay })
        } else {
            Err(EditError::InvalidDecay(decay))
        }
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    /// Durations each segment contributes, in attempt order.
    fn contributing_durations(run: &Run, method: TimingMethod) -> Vec<Vec<Duration>> {
        let mut all_history = vec![Vec::new(); run.len()];

        for attempt in 1..=run.run_history_count {
            // A null duration means the split was skipped and merged into the next one
            let mut skip_next = false;
            for (index, segment) in run.segments().iter().enumerate() {
                let Some(time) = segment.segment_history.get(attempt) else {
                    break;
                };
                match time[method] {
                    None => skip_next = true,
                    Some(duration) if !skip_next => all_history[index].push(duration),
                    Some(_) => skip_next = false,
                }
            }
        }

        all_history
    }
}

/// Recency-weighted mean; the last element weighs 1.0 and each earlier one
/// `decay` times the one after it.
///
/// Returns `None` for no durations or a decay outside (0, 1].
pub fn weighted_mean(durations: &[Duration], decay: f64) -> Option<Duration> {
    if durations.is_empty() || !(decay > 0.0 && decay <= 1.0) {
        return None;
    }

    let count = durations.len();
    let mut total_weight = 0.0;
    let mut weighted_sum = 0.0;
    for (i, duration) in durations.iter().enumerate() {
        let weight = decay.powi((count - i - 1) as i32);
        total_weight += weight;
        weighted_sum += weight * duration_to_seconds(*duration);
    }

    Some(duration_from_seconds(weighted_sum / total_weight))
}

impl ComparisonGenerator for AverageSegmentsGenerator {
    fn name(&self) -> &str {
        AVERAGE_SEGMENTS_COMPARISON_NAME
    }

    fn generate(&self, run: &mut Run, method: TimingMethod) {
        let all_history = Self::contributing_durations(run, method);
        let name = ComparisonName::reserved(AVERAGE_SEGMENTS_COMPARISON_NAME);

        let mut total = Some(Duration::zero());
        for (segment, durations) in run.segments_mut().iter_mut().zip(&all_history) {
            // Once a segment has no average, every later one stays empty
            total = match (total, weighted_mean(durations, self.decay)) {
                (Some(sum), Some(mean)) => sum.checked_add(&mean),
                _ => None,
            };

            let mut time = segment.comparisons.get(name.as_str());
            time[method] = total;
            segment.comparisons.insert(name.clone(), time);
        }

        log::debug!(
            "generated {} for {} over {} attempts",
            AVERAGE_SEGMENTS_COMPARISON_NAME,
            method.as_str(),
            run.run_history_count
        );
    }
}
