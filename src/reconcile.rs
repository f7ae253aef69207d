//! Structural edits on a run
//!
//! Inserting, deleting and reordering segments changes which boundaries the
//! recorded history refers to. The functions here rewrite segment history,
//! best segments and comparisons so that the run stays internally consistent.
//! They mutate the run in place and leave the run-wide consistency pass
//! ([`Run::fix_splits`]) and comparison regeneration to the caller.

use crate::error::EditError;
use crate::run::Run;
use crate::segment::Segment;
use crate::types::{add_durations, Time, TimingMethod};
use chrono::Duration;
use std::ops::RangeInclusive;

/// Attempt indices a reconciliation pass has to visit
fn attempt_indices(run: &Run) -> RangeInclusive<i32> {
    run.min_segment_history_index()..=run.run_history_count
}

/// Insert an empty segment so that it ends up at `index`.
///
/// The segment currently at `index` keeps its best segment as an imported
/// history entry, and the new segment records a skipped split for every
/// attempt, so durations recorded after it are treated as spanning both.
pub fn insert_segment(run: &mut Run, index: usize) -> Result<(), EditError> {
    if index > run.len() {
        return Err(EditError::SegmentOutOfRange {
            index,
            len: run.len(),
        });
    }

    if index < run.len() {
        run.import_best_segment(index)?;
    }

    let mut segment = Segment::new("");
    for attempt in attempt_indices(run) {
        segment.segment_history.insert(attempt, Time::default());
    }

    log::debug!("inserting segment at {}", index);
    run.segments.insert(index, segment);
    Ok(())
}

/// Remove the segment at `index`, folding its history into the next segment.
pub fn delete_segment(run: &mut Run, index: usize) -> Result<(), EditError> {
    run.check_index(index)?;
    if run.len() <= 1 {
        return Err(EditError::LastSegment);
    }

    if index + 1 < run.len() {
        for method in TimingMethod::ALL {
            merge_into_successor(run, index, method);
        }
    }

    let removed = run.segments.remove(index);
    log::debug!("deleted segment '{}' at {}", removed.name, index);
    Ok(())
}

fn merge_into_successor(run: &mut Run, index: usize, method: TimingMethod) {
    let attempts = attempt_indices(run);
    let (head, tail) = run.segments.split_at_mut(index + 1);
    let deleted = &head[index];

    for attempt in attempts {
        let Some(deleted_time) = deleted.segment_history.get(attempt) else {
            // Without the deleted boundary the merged duration is unknown
            tail[0].segment_history.remove(attempt);
            continue;
        };

        let Some(duration) = deleted_time[method] else {
            continue;
        };

        // Add to the first later segment that recorded this attempt
        for segment in tail.iter_mut() {
            if let Some(time) = segment.segment_history.get_mut(attempt) {
                if let Some(existing) = time[method] {
                    time[method] = existing.checked_add(&duration);
                    break;
                }
            }
        }
    }

    let successor = &mut tail[0];
    let mut best = add_durations(
        deleted.best_segment_time[method],
        successor.best_segment_time[method],
    );
    for entry in successor.segment_history.iter() {
        if let Some(candidate) = entry.time[method] {
            if best.map_or(true, |current| candidate < current) {
                best = Some(candidate);
            }
        }
    }
    successor.best_segment_time[method] = best;
}

/// Exchange the segments at `index` and `index + 1`.
///
/// Cumulative comparisons are re-split so the pair still ends at the same
/// time while the inner boundary moves with the segments.
pub fn swap_adjacent(run: &mut Run, index: usize) -> Result<(), EditError> {
    match index.checked_add(1) {
        Some(next) => run.check_index(next)?,
        None => {
            return Err(EditError::SegmentOutOfRange {
                index,
                len: run.len(),
            })
        }
    }

    for attempt in attempt_indices(run) {
        let incomplete = run.segments[index..=index + 1].iter().any(|segment| {
            segment
                .segment_history
                .get(attempt)
                .map_or(false, |time| time.real_time.is_none())
        });
        if incomplete {
            run.segments[index].segment_history.remove(attempt);
            run.segments[index + 1].segment_history.remove(attempt);
        }
    }

    let names: Vec<_> = run.segments[index]
        .comparison_names()
        .into_iter()
        .filter(|name| run.segments[index + 1].has_comparison(name.as_str()))
        .collect();

    for name in names {
        let previous = if index > 0 {
            run.segments[index - 1].comparison(name.as_str())
        } else {
            Time::zero()
        };
        let first = run.segments[index].comparison(name.as_str());
        let second = run.segments[index + 1].comparison(name.as_str());

        let first_local = first - previous;
        let second_local = second - first;
        let new_second = previous + second_local;
        let new_first = new_second + first_local;

        run.segments[index + 1].set_comparison(&name, new_second);
        run.segments[index].set_comparison(&name, new_first);
    }

    run.segments.swap(index, index + 1);
    log::debug!("swapped segments {} and {}", index, index + 1);
    Ok(())
}

/// Rewrite the personal best splits of one method from local segment times.
///
/// A time typed for a segment that has no split yet (other than the last one)
/// is carried forward and taken out of the next committed segment time.
pub fn derive_from_deltas(
    run: &mut Run,
    method: TimingMethod,
    deltas: &[Option<Duration>],
) -> Result<(), EditError> {
    if deltas.len() != run.len() {
        return Err(EditError::DeltaCountMismatch {
            expected: run.len(),
            actual: deltas.len(),
        });
    }

    let last = run.len() - 1;
    let mut previous = Duration::zero();
    let mut carry = Duration::zero();

    for (index, (segment, delta)) in run.segments.iter_mut().zip(deltas).enumerate() {
        let split = &mut segment.personal_best_split_time[method];
        match delta {
            None => {
                if let Some(known) = *split {
                    previous = known;
                }
                *split = None;
            }
            Some(delta) if split.is_none() && index < last => {
                carry = carry + *delta;
            }
            Some(delta) => {
                let committed = previous + (*delta - carry);
                *split = Some(committed);
                carry = Duration::zero();
                previous = committed;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::real_time;
    use crate::segment::ComparisonName;
    use pretty_assertions::assert_eq;

    fn secs(value: i64) -> Option<Duration> {
        Some(Duration::seconds(value))
    }

    fn both(real: i64, game: i64) -> Time {
        Time::new(secs(real), secs(game))
    }

    /// Three segments, two attempts, all real time
    fn sample_run() -> Run {
        let mut run = Run::with_segment_names(["A", "B", "C"]).unwrap();
        run.run_history_count = 2;
        let durations = [[10, 20, 30], [12, 18, 33]];
        for (attempt, row) in durations.iter().enumerate() {
            for (segment, value) in row.iter().enumerate() {
                run.segments[segment]
                    .segment_history
                    .insert(attempt as i32 + 1, real_time(*value));
            }
        }
        run.segments[0].best_segment_time = real_time(10);
        run.segments[1].best_segment_time = real_time(18);
        run.segments[2].best_segment_time = real_time(30);
        run.segments[0].personal_best_split_time = real_time(10);
        run.segments[1].personal_best_split_time = real_time(30);
        run.segments[2].personal_best_split_time = real_time(60);
        run
    }

    fn splits(run: &Run, method: TimingMethod) -> Vec<Option<Duration>> {
        run.segments()
            .iter()
            .map(|s| s.personal_best_split_time[method])
            .collect()
    }

    #[test]
    fn test_delete_merges_history_into_successor() {
        let mut run = sample_run();
        delete_segment(&mut run, 0).unwrap();

        assert_eq!(run.len(), 2);
        assert_eq!(run[0].name, "B");
        assert_eq!(run[0].segment_history.get(1), Some(&real_time(30)));
        assert_eq!(run[0].segment_history.get(2), Some(&real_time(30)));
        // 10 + 18 and both merged attempts take 30
        assert_eq!(run[0].best_segment_time, real_time(28));
    }

    #[test]
    fn test_delete_drops_attempts_missing_the_deleted_segment() {
        let mut run = sample_run();
        run.segments[0].segment_history.remove(2);
        delete_segment(&mut run, 0).unwrap();

        assert_eq!(run[0].segment_history.get(1), Some(&real_time(30)));
        assert_eq!(run[0].segment_history.get(2), None);
    }

    #[test]
    fn test_delete_skips_successor_with_null_duration() {
        let mut run = sample_run();
        run.segments[1]
            .segment_history
            .insert(1, Time::default());
        delete_segment(&mut run, 0).unwrap();

        // Attempt 1's 10s lands on C, the first segment with a time
        assert_eq!(run[0].segment_history.get(1), Some(&Time::default()));
        assert_eq!(run[1].segment_history.get(1), Some(&real_time(40)));
        assert_eq!(run[1].segment_history.get(2), Some(&real_time(33)));
    }

    #[test]
    fn test_delete_best_segment_is_sum_when_no_attempt_covers_span() {
        let mut run = sample_run();
        run.segments[0].best_segment_time = both(5, 4);
        run.segments[1].best_segment_time = both(15, 14);
        delete_segment(&mut run, 0).unwrap();
        assert_eq!(run[0].best_segment_time, both(20, 18));
    }

    #[test]
    fn test_delete_last_segment_removes_without_merge() {
        let mut run = sample_run();
        delete_segment(&mut run, 2).unwrap();
        assert_eq!(run.len(), 2);
        assert_eq!(run[1].segment_history.get(1), Some(&real_time(20)));
    }

    #[test]
    fn test_delete_preconditions() {
        let mut run = Run::with_segment_names(["Only"]).unwrap();
        assert!(matches!(delete_segment(&mut run, 0), Err(EditError::LastSegment)));
        let mut run = sample_run();
        assert!(matches!(
            delete_segment(&mut run, 3),
            Err(EditError::SegmentOutOfRange { index: 3, len: 3 })
        ));
        assert_eq!(run.len(), 3);
    }

    #[test]
    fn test_delete_keeps_split_order_after_fix() {
        let mut run = sample_run();
        delete_segment(&mut run, 1).unwrap();
        run.fix_splits();
        assert!(run.check_invariants().is_empty());
        assert_eq!(splits(&run, TimingMethod::RealTime), vec![secs(10), secs(60)]);
    }

    #[test]
    fn test_swap_preserves_pair_span() {
        let mut run = sample_run();
        let target = ComparisonName::new("Target").unwrap();
        for (i, value) in [9, 29, 58].iter().enumerate() {
            run.segments[i].comparisons.insert(target.clone(), real_time(*value));
        }

        swap_adjacent(&mut run, 1).unwrap();

        assert_eq!(run[1].name, "C");
        assert_eq!(run[2].name, "B");
        // B took 20 and C took 30 after A's 10
        assert_eq!(run[1].personal_best_split_time, real_time(40));
        assert_eq!(run[2].personal_best_split_time, real_time(60));
        // Target: 9 before the pair, then C's 29 and B's 20
        assert_eq!(run[1].comparisons.get("Target"), real_time(38));
        // The pair still ends where C used to
        assert_eq!(run[2].comparisons.get("Target"), real_time(58));
    }

    #[test]
    fn test_swap_first_pair_uses_zero_start() {
        let mut run = sample_run();
        swap_adjacent(&mut run, 0).unwrap();
        assert_eq!(run[0].name, "B");
        assert_eq!(run[0].personal_best_split_time, real_time(20));
        assert_eq!(run[1].personal_best_split_time, real_time(30));
        // Histories travel with their segments
        assert_eq!(run[0].segment_history.get(1), Some(&real_time(20)));
        assert_eq!(run[0].best_segment_time, real_time(18));
    }

    #[test]
    fn test_swap_drops_attempts_without_real_time() {
        let mut run = sample_run();
        run.segments[2]
            .segment_history
            .insert(2, Time::new(None, secs(33)));
        swap_adjacent(&mut run, 1).unwrap();

        assert_eq!(run[1].segment_history.get(2), None);
        assert_eq!(run[2].segment_history.get(2), None);
        assert_eq!(run[1].segment_history.get(1), Some(&real_time(30)));
        assert_eq!(run[0].segment_history.get(2), Some(&real_time(12)));
    }

    #[test]
    fn test_swap_out_of_range() {
        let mut run = sample_run();
        assert!(swap_adjacent(&mut run, 2).is_err());
        assert!(matches!(
            swap_adjacent(&mut run, usize::MAX),
            Err(EditError::SegmentOutOfRange { index: usize::MAX, len: 3 })
        ));
        assert_eq!(run[2].name, "C");
    }

    #[test]
    fn test_insert_imports_best_and_marks_skipped_splits() {
        let mut run = sample_run();
        insert_segment(&mut run, 1).unwrap();

        assert_eq!(run.len(), 4);
        assert_eq!(run[1].name, "");
        assert_eq!(run[2].name, "B");
        // B's best now lives at index 0 of its history
        assert_eq!(run[2].segment_history.get(0), Some(&real_time(18)));
        for attempt in 0..=2 {
            assert_eq!(run[1].segment_history.get(attempt), Some(&Time::default()));
        }
    }

    #[test]
    fn test_insert_at_end_and_out_of_range() {
        let mut run = sample_run();
        insert_segment(&mut run, 3).unwrap();
        assert_eq!(run.len(), 4);
        assert_eq!(run[3].segment_history.len(), 2);
        assert!(insert_segment(&mut run, 9).is_err());
    }

    #[test]
    fn test_derive_round_trips_segment_times() {
        let mut run = sample_run();
        let deltas = vec![secs(11), secs(19), secs(31)];
        derive_from_deltas(&mut run, TimingMethod::RealTime, &deltas).unwrap();

        assert_eq!(
            splits(&run, TimingMethod::RealTime),
            vec![secs(11), secs(30), secs(61)]
        );
        assert_eq!(run.segment_times(TimingMethod::RealTime), deltas);
    }

    #[test]
    fn test_derive_clears_absent_deltas() {
        let mut run = sample_run();
        derive_from_deltas(&mut run, TimingMethod::RealTime, &[secs(10), None, secs(25)]).unwrap();
        // The cleared split still anchors the next segment
        assert_eq!(
            splits(&run, TimingMethod::RealTime),
            vec![secs(10), None, secs(55)]
        );
    }

    #[test]
    fn test_derive_carries_time_typed_into_blank_split() {
        let mut run = sample_run();
        run.segments[1].personal_best_split_time = Time::default();
        derive_from_deltas(&mut run, TimingMethod::RealTime, &[secs(10), secs(5), secs(50)]).unwrap();

        assert_eq!(
            splits(&run, TimingMethod::RealTime),
            vec![secs(10), None, secs(55)]
        );
    }

    #[test]
    fn test_derive_final_segment_always_commits() {
        let mut run = Run::with_segment_names(["A", "B"]).unwrap();
        derive_from_deltas(&mut run, TimingMethod::GameTime, &[secs(4), secs(6)]).unwrap();
        assert_eq!(splits(&run, TimingMethod::GameTime), vec![None, secs(2)]);
        assert_eq!(splits(&run, TimingMethod::RealTime), vec![None, None]);
    }

    #[test]
    fn test_derive_rejects_wrong_length() {
        let mut run = sample_run();
        assert!(matches!(
            derive_from_deltas(&mut run, TimingMethod::RealTime, &[secs(1)]),
            Err(EditError::DeltaCountMismatch { expected: 3, actual: 1 })
        ));
        assert_eq!(splits(&run, TimingMethod::RealTime), vec![secs(10), secs(30), secs(60)]);
    }
}
