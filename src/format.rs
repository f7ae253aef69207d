//! Time text parsing and formatting
//!
//! User-typed durations look like `1:23:45.678`, `4:05.5`, `12,25` or `-0:03`.
//! Hours and minutes are optional, the fractional separator may be `.` or `,`,
//! and fractions are kept to nanosecond precision. Formatting emits the
//! shortest text that parses back to the same duration.

use crate::error::EditError;
use chrono::Duration;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Parse a duration typed by a user.
pub fn parse_duration(input: &str) -> Result<Duration, EditError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EditError::invalid_time(input, "empty time"));
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() > 3 {
        return Err(EditError::invalid_time(input, "too many ':' separators"));
    }

    let (seconds_part, larger_parts) = parts
        .split_last()
        .ok_or_else(|| EditError::invalid_time(input, "empty time"))?;

    let out_of_range = || EditError::invalid_time(input, "time out of range");

    let mut whole_minutes: i128 = 0;
    for part in larger_parts {
        let value = parse_digits(part).ok_or_else(|| {
            EditError::invalid_time(input, format!("'{}' is not a whole number", part))
        })?;
        whole_minutes = whole_minutes
            .checked_mul(60)
            .and_then(|minutes| minutes.checked_add(value))
            .ok_or_else(out_of_range)?;
    }

    let normalized = seconds_part.replace(',', ".");
    let (whole, fraction) = match normalized.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (normalized.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(EditError::invalid_time(input, "missing seconds"));
    }

    let seconds = if whole.is_empty() {
        0
    } else {
        parse_digits(whole).ok_or_else(|| {
            EditError::invalid_time(input, format!("'{}' is not a number of seconds", whole))
        })?
    };

    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(EditError::invalid_time(
            input,
            format!("'{}' is not a fraction of a second", fraction),
        ));
    }

    // Digits past nanosecond precision are truncated
    let mut fraction_nanos: i128 = 0;
    for (position, digit) in fraction.chars().take(9).enumerate() {
        let digit = digit.to_digit(10).unwrap_or(0) as i128;
        fraction_nanos += digit * 10_i128.pow(8 - position as u32);
    }

    let mut total = whole_minutes
        .checked_mul(60)
        .and_then(|seconds_total| seconds_total.checked_add(seconds))
        .and_then(|seconds_total| seconds_total.checked_mul(NANOS_PER_SECOND))
        .and_then(|nanos| nanos.checked_add(fraction_nanos))
        .ok_or_else(out_of_range)?;
    if negative {
        total = -total;
    }

    let nanos = i64::try_from(total).map_err(|_| out_of_range())?;
    Ok(Duration::nanoseconds(nanos))
}

/// Parse a duration where blank text means "no time".
pub fn parse_optional_duration(input: &str) -> Result<Option<Duration>, EditError> {
    if input.trim().is_empty() {
        Ok(None)
    } else {
        parse_duration(input).map(Some)
    }
}

fn parse_digits(text: &str) -> Option<i128> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse::<i128>().ok()
}

/// Format a duration as `H:MM:SS.fff`, `M:SS.fff` below one hour.
pub fn format_duration(duration: Duration) -> String {
    let negative = duration < Duration::zero();
    let magnitude = if negative { -duration } else { duration };

    let total_seconds = magnitude.num_seconds();
    let nanos = magnitude.subsec_nanos();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut text = String::new();
    if negative {
        text.push('-');
    }
    if hours > 0 {
        text.push_str(&format!("{}:{:02}:{:02}", hours, minutes, seconds));
    } else {
        text.push_str(&format!("{}:{:02}", minutes, seconds));
    }

    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }

    text
}

/// Format an optional duration, blank when absent.
pub fn format_optional_duration(duration: Option<Duration>) -> String {
    duration.map(format_duration).unwrap_or_default()
}

/// Serde adapter storing a `Duration` as formatted time text.
pub mod duration_text {
    use super::{format_duration, parse_duration};
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter storing an `Option<Duration>` as formatted time text or null.
pub mod optional_duration_text {
    use super::{format_duration, parse_duration};
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&format_duration(*duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|text| parse_duration(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_seconds_only() {
        assert_eq!(parse_duration("12").unwrap(), Duration::seconds(12));
        assert_eq!(parse_duration("12.5").unwrap(), Duration::milliseconds(12_500));
        assert_eq!(parse_duration("12,25").unwrap(), Duration::milliseconds(12_250));
        assert_eq!(parse_duration(".5").unwrap(), Duration::milliseconds(500));
    }

    #[test]
    fn test_parse_minutes_and_hours() {
        assert_eq!(parse_duration("1:30").unwrap(), Duration::seconds(90));
        assert_eq!(
            parse_duration("1:02:03.004").unwrap(),
            Duration::milliseconds(3_723_004)
        );
        assert_eq!(parse_duration(" 0:05 ").unwrap(), Duration::seconds(5));
    }

    #[test]
    fn test_parse_negative() {
        assert_eq!(parse_duration("-0:03").unwrap(), Duration::seconds(-3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("1:2:3:4").is_err());
        assert!(parse_duration("1::3").is_err());
        assert!(parse_duration("1.2.3").is_err());
        assert!(parse_duration("1:").is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range_times() {
        for input in [
            "1234567890123456789012345678901:00",
            "99999999999999999999999999999999:0:0",
            "99999999999999999999999",
            "1:99999999999999999999999999999999999",
        ] {
            match parse_duration(input) {
                Err(EditError::InvalidTime { input: rejected, .. }) => {
                    assert_eq!(rejected, input)
                }
                other => panic!("expected InvalidTime for {}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_parse_optional_blank_is_none() {
        assert_eq!(parse_optional_duration("   ").unwrap(), None);
        assert_eq!(
            parse_optional_duration("3").unwrap(),
            Some(Duration::seconds(3))
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(5)), "0:05");
        assert_eq!(format_duration(Duration::milliseconds(90_500)), "1:30.5");
        assert_eq!(format_duration(Duration::milliseconds(3_723_004)), "1:02:03.004");
        assert_eq!(format_duration(Duration::seconds(-3)), "-0:03");
        assert_eq!(format_optional_duration(None), "");
    }

    #[test]
    fn test_format_then_parse_keeps_nanoseconds() {
        let original = Duration::nanoseconds(4_321_987_654_321);
        let text = format_duration(original);
        assert_eq!(parse_duration(&text).unwrap(), original);
    }
}
