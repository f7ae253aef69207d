//! runsplits - run timing data model and segment-history reconciliation
//!
//! A run is an ordered list of segments. Every attempt records how long each
//! segment took, and the run keeps personal best splits, best segments and
//! named comparisons derived from that history. This crate keeps those records
//! consistent while segments are inserted, deleted, reordered or retimed.
//!
//! ## Modules
//!
//! - **Data model**: [`types`], [`segment`], [`run`]
//! - **Comparisons**: [`comparisons`] generators such as Average Segments
//! - **Reconciliation**: [`reconcile`] structural edits on a run
//! - **Editing**: [`editor`] validated, notifying edit session

pub mod comparisons;
pub mod editor;
pub mod error;
pub mod format;
pub mod reconcile;
pub mod run;
pub mod segment;
pub mod types;

pub use comparisons::{AverageSegmentsGenerator, ComparisonGenerator};
pub use editor::{RunEditor, RunEvent};
pub use error::EditError;
pub use run::{InvariantViolation, Run};
pub use segment::{ComparisonName, Segment, SegmentHistory};
pub use types::{IndexedTime, Time, TimingMethod};

/// Crate version reported by the CLI
pub const RUNSPLITS_VERSION: &str = env!("CARGO_PKG_VERSION");
