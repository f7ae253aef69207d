//! Core time types
//!
//! A [`Time`] carries one optional duration per [`TimingMethod`]. Absence is the
//! only uncertainty signal: arithmetic propagates it and comparisons refuse to
//! order an absent component.

use crate::format::optional_duration_text;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::{Add, Index, IndexMut, Sub};

/// Clock a time was measured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingMethod {
    RealTime,
    GameTime,
}

impl TimingMethod {
    /// Both methods, in the order generators and reconcilers visit them
    pub const ALL: [TimingMethod; 2] = [TimingMethod::RealTime, TimingMethod::GameTime];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimingMethod::RealTime => "real_time",
            TimingMethod::GameTime => "game_time",
        }
    }
}

/// A pair of optional durations, one per timing method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    #[serde(default, with = "optional_duration_text")]
    pub real_time: Option<Duration>,
    #[serde(default, with = "optional_duration_text")]
    pub game_time: Option<Duration>,
}

impl Time {
    pub fn new(real_time: Option<Duration>, game_time: Option<Duration>) -> Self {
        Self {
            real_time,
            game_time,
        }
    }

    /// Both components present and zero
    pub fn zero() -> Self {
        Self::new(Some(Duration::zero()), Some(Duration::zero()))
    }

    pub fn get(&self, method: TimingMethod) -> Option<Duration> {
        self[method]
    }

    /// Copy of this time with one component replaced
    pub fn with(mut self, method: TimingMethod, value: Option<Duration>) -> Self {
        self[method] = value;
        self
    }

    /// True when neither component is present
    pub fn is_empty(&self) -> bool {
        self.real_time.is_none() && self.game_time.is_none()
    }

    /// Order two times by one method; `None` when either side is absent
    pub fn compare(&self, other: &Time, method: TimingMethod) -> Option<Ordering> {
        match (self[method], other[method]) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        }
    }

    /// `self < other` for a method, false when either side is absent
    pub fn is_less(&self, other: &Time, method: TimingMethod) -> bool {
        self.compare(other, method) == Some(Ordering::Less)
    }
}

/// Null-propagating addition of two optional durations
pub fn add_durations(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    a?.checked_add(&b?)
}

/// Null-propagating subtraction of two optional durations
pub fn sub_durations(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    a?.checked_sub(&b?)
}

/// Seconds in a duration as a float
pub fn duration_to_seconds(duration: Duration) -> f64 {
    match duration.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => duration.num_milliseconds() as f64 / 1e3,
    }
}

/// Duration from float seconds, rounded to the nearest nanosecond
pub fn duration_from_seconds(seconds: f64) -> Duration {
    Duration::nanoseconds((seconds * 1e9).round() as i64)
}

impl Index<TimingMethod> for Time {
    type Output = Option<Duration>;

    fn index(&self, method: TimingMethod) -> &Self::Output {
        match method {
            TimingMethod::RealTime => &self.real_time,
            TimingMethod::GameTime => &self.game_time,
        }
    }
}

impl IndexMut<TimingMethod> for Time {
    fn index_mut(&mut self, method: TimingMethod) -> &mut Self::Output {
        match method {
            TimingMethod::RealTime => &mut self.real_time,
            TimingMethod::GameTime => &mut self.game_time,
        }
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Time {
        Time::new(
            add_durations(self.real_time, rhs.real_time),
            add_durations(self.game_time, rhs.game_time),
        )
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Time {
        Time::new(
            sub_durations(self.real_time, rhs.real_time),
            sub_durations(self.game_time, rhs.game_time),
        )
    }
}

/// A time recorded for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedTime {
    pub time: Time,
    /// Attempt number; values at or below zero hold imported best segments
    pub index: i32,
}

impl IndexedTime {
    pub fn new(time: Time, index: i32) -> Self {
        Self { time, index }
    }
}
