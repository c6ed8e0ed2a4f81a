//! # Frequency Parsing
//!
//! Converts the human-readable pacing strings used in scenario files into
//! the number of milliseconds a runner sleeps between two events.
//!
//! Accepted forms:
//!
//! - `"instant"`: no pacing at all (`0`)
//! - `"<N> per second"`: `round(1000 / N)`
//! - `"<N> per minute"`: `round(60000 / N)`
//!
//! ```rust
//! # use deepstream_bench::frequency::parse_frequency;
//! assert_eq!(parse_frequency("instant").unwrap(), 0);
//! assert_eq!(parse_frequency("5 per second").unwrap(), 200);
//! assert_eq!(parse_frequency("2 per minute").unwrap(), 30_000);
//! ```

use crate::error::FrequencyError;

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;

/// Parse a frequency string into an interval in milliseconds.
pub fn parse_frequency(freq: &str) -> Result<u64, FrequencyError> {
    if freq == "instant" {
        return Ok(0);
    }

    let (count, unit) = match freq.split_once(" per ") {
        Some((count, unit)) => (count, Some(unit)),
        None => (freq, None),
    };

    let count = match leading_integer(count) {
        Some(n) if n > 0 => n as f64,
        _ => return Err(FrequencyError::InvalidCount(freq.to_string())),
    };

    let window = match unit {
        Some("minute") => MS_PER_MINUTE,
        Some("second") => MS_PER_SECOND,
        _ => return Err(FrequencyError::InvalidUnit(freq.to_string())),
    };

    Ok((window / count).round() as u64)
}

/// Read the integer at the start of `s`, ignoring leading whitespace and
/// anything after the digits. Negative counts are treated as unparseable.
fn leading_integer(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_has_no_pacing() {
        assert_eq!(parse_frequency("instant").unwrap(), 0);
    }

    #[test]
    fn test_per_second_and_minute() {
        assert_eq!(parse_frequency("5 per second").unwrap(), 200);
        assert_eq!(parse_frequency("1 per second").unwrap(), 1000);
        assert_eq!(parse_frequency("3 per second").unwrap(), 333);
        assert_eq!(parse_frequency("2 per minute").unwrap(), 30_000);
        assert_eq!(parse_frequency("7 per minute").unwrap(), 8571);
    }

    #[test]
    fn test_rounds_to_nearest_millisecond() {
        // 1000 / 3000 = 0.33 rounds down to zero, i.e. no pacing
        assert_eq!(parse_frequency("3000 per second").unwrap(), 0);
        // 1000 / 400 = 2.5 rounds half away from zero
        assert_eq!(parse_frequency("400 per second").unwrap(), 3);
    }

    #[test]
    fn test_count_prefix_is_lenient() {
        assert_eq!(parse_frequency(" 5 per second").unwrap(), 200);
        assert_eq!(parse_frequency("5x per second").unwrap(), 200);
    }

    #[test]
    fn test_zero_or_missing_count_is_rejected() {
        assert_eq!(
            parse_frequency("0 per second"),
            Err(FrequencyError::InvalidCount("0 per second".to_string()))
        );
        assert!(matches!(
            parse_frequency("many per second"),
            Err(FrequencyError::InvalidCount(_))
        ));
        assert!(matches!(
            parse_frequency("-4 per second"),
            Err(FrequencyError::InvalidCount(_))
        ));
        assert!(matches!(parse_frequency(""), Err(FrequencyError::InvalidCount(_))));
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        assert_eq!(
            parse_frequency("5 per fortnight"),
            Err(FrequencyError::InvalidUnit("5 per fortnight".to_string()))
        );
        assert!(matches!(parse_frequency("5"), Err(FrequencyError::InvalidUnit(_))));
        assert!(matches!(
            parse_frequency("5 per seconds"),
            Err(FrequencyError::InvalidUnit(_))
        ));
    }
}
