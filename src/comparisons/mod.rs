//! Comparison generators
//!
//! A generator derives a named cumulative comparison from a run's history and
//! writes it into every segment's comparison table.

pub mod average;

use crate::run::Run;
use crate::types::TimingMethod;

pub use average::{weighted_mean, AverageSegmentsGenerator, AVERAGE_SEGMENTS_COMPARISON_NAME};

/// Names owned by generators; users cannot create custom comparisons with them
pub const GENERATED_COMPARISON_NAMES: &[&str] = &[AVERAGE_SEGMENTS_COMPARISON_NAME];

/// Trait for deriving a comparison from run history
pub trait ComparisonGenerator {
    /// Comparison name written into each segment
    fn name(&self) -> &str;

    /// Regenerate the comparison for one timing method
    fn generate(&self, run: &mut Run, method: TimingMethod);

    /// Regenerate the comparison for every timing method
    fn generate_all(&self, run: &mut Run) {
        for method in TimingMethod::ALL {
            self.generate(run, method);
        }
    }
}
