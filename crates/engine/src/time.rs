use crate::error::{EngineError, Result};

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Parses an SRT-style timestamp into milliseconds.
///
/// Accepts `HH:MM:SS,mmm`, `HH:MM:SS.mmm`, `HH:MM:SS` and `MM:SS`. The
/// fractional part is a decimal fraction of a second, so `,5` is 500 ms.
/// An empty string parses as zero.
///
/// # Example
/// ```
/// use align_engine::time::parse_srt_time;
///
/// assert_eq!(parse_srt_time("00:01:02,345").expect("valid"), 62_345);
/// assert_eq!(parse_srt_time("01:02.5").expect("valid"), 62_500);
/// ```
pub fn parse_srt_time(value: &str) -> Result<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    let invalid = || EngineError::InvalidTimestamp(trimmed.to_string());
    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [hours, minutes, seconds] => (parse_field(hours)?, parse_field(minutes)?, *seconds),
        [minutes, seconds] => (0, parse_field(minutes)?, *seconds),
        _ => return Err(invalid()),
    };

    let (whole, fraction) = match seconds.split_once(|c: char| c == ',' || c == '.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };
    let whole = parse_field(whole)?;
    let millis = match fraction {
        Some(fraction) => parse_fraction_ms(fraction).ok_or_else(invalid)?,
        None => 0,
    };

    if minutes >= 60 && parts.len() == 3 {
        return Err(invalid());
    }

    hours
        .checked_mul(MS_PER_HOUR)
        .and_then(|total| total.checked_add(minutes.checked_mul(MS_PER_MINUTE)?))
        .and_then(|total| total.checked_add(whole.checked_mul(MS_PER_SECOND)?))
        .and_then(|total| total.checked_add(millis))
        .ok_or_else(invalid)
}

/// Formats milliseconds as an SRT timestamp (`HH:MM:SS,mmm`).
///
/// Negative values are clamped to zero.
///
/// # Example
/// ```
/// use align_engine::time::format_srt_time;
///
/// assert_eq!(format_srt_time(3_723_004), "01:02:03,004");
/// ```
pub fn format_srt_time(ms: i64) -> String {
    let ms = ms.max(0);
    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (ms % MS_PER_MINUTE) / MS_PER_SECOND;
    let millis = ms % MS_PER_SECOND;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

fn parse_field(value: &str) -> Result<i64> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(EngineError::InvalidTimestamp(value.to_string()));
    }
    value
        .parse::<i64>()
        .map_err(|_| EngineError::InvalidTimestamp(value.to_string()))
}

fn parse_fraction_ms(fraction: &str) -> Option<i64> {
    if fraction.is_empty() || !fraction.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    // Only millisecond precision is kept.
    let mut millis = 0;
    let mut scale = 100;
    for digit in fraction.bytes().take(3) {
        millis += i64::from(digit - b'0') * scale;
        scale /= 10;
    }
    Some(millis)
}
