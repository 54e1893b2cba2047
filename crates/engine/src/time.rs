//! Conversion between seconds and the `MM:SS` / `HH:MM:SS` text users type.

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3_600;

/// Parses `MM:SS` or `HH:MM:SS` into seconds, strictly.
///
/// Every segment must be a non-empty run of ASCII digits. Segment values are
/// not range-checked, so `"1:75"` is 135 seconds.
///
/// # Example
/// ```
/// use engine::try_parse_timestamp;
///
/// assert_eq!(try_parse_timestamp("1:05"), Some(65.0));
/// assert_eq!(try_parse_timestamp("01:01:01"), Some(3_661.0));
/// assert_eq!(try_parse_timestamp("1:0x"), None);
/// ```
pub fn try_parse_timestamp(text: &str) -> Option<f64> {
    let mut values = [0_u64; 3];
    let mut count = 0_usize;

    for segment in text.trim().split(':') {
        if count == values.len() {
            return None;
        }
        values[count] = parse_segment(segment)?;
        count += 1;
    }

    let total = match count {
        2 => values[0]
            .checked_mul(SECONDS_PER_MINUTE)?
            .checked_add(values[1])?,
        3 => values[0]
            .checked_mul(SECONDS_PER_HOUR)?
            .checked_add(values[1].checked_mul(SECONDS_PER_MINUTE)?)?
            .checked_add(values[2])?,
        _ => return None,
    };

    Some(total as f64)
}

/// Parses `MM:SS` or `HH:MM:SS`, falling back to `0` for anything else.
///
/// # Example
/// ```
/// use engine::parse_timestamp;
///
/// assert_eq!(parse_timestamp("garbage"), 0.0);
/// ```
pub fn parse_timestamp(text: &str) -> f64 {
    try_parse_timestamp(text).unwrap_or(0.0)
}

/// Formats seconds as `MM:SS`, or `HH:MM:SS` once an hour is reached.
///
/// Fractions are floored. Negative and non-finite input renders as `00:00`.
///
/// # Example
/// ```
/// use engine::format_timestamp;
///
/// assert_eq!(format_timestamp(65.0), "01:05");
/// assert_eq!(format_timestamp(3_661.9), "01:01:01");
/// ```
pub fn format_timestamp(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = whole / SECONDS_PER_HOUR;
    let minutes = (whole % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
    let secs = whole % SECONDS_PER_MINUTE;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

fn parse_segment(segment: &str) -> Option<u64> {
    if segment.is_empty() || !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, parse_timestamp, try_parse_timestamp};

    #[test]
    fn formats_minutes_and_seconds_below_one_hour() {
        assert_eq!(format_timestamp(65.0), "01:05");
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(3_599.99), "59:59");
    }

    #[test]
    fn formats_hours_once_reached() {
        assert_eq!(format_timestamp(3_661.0), "01:01:01");
        assert_eq!(format_timestamp(36_000.0), "10:00:00");
    }

    #[test]
    fn format_treats_negative_and_nan_as_zero() {
        assert_eq!(format_timestamp(-4.0), "00:00");
        assert_eq!(format_timestamp(f64::NAN), "00:00");
    }

    #[test]
    fn parses_two_and_three_segment_shapes() {
        assert_eq!(parse_timestamp("1:05"), 65.0);
        assert_eq!(parse_timestamp("01:01:01"), 3_661.0);
        assert_eq!(parse_timestamp(" 02:00 "), 120.0);
    }

    #[test]
    fn wrong_shapes_fall_back_to_zero() {
        assert_eq!(parse_timestamp("garbage"), 0.0);
        assert_eq!(parse_timestamp("42"), 0.0);
        assert_eq!(parse_timestamp("1:2:3:4"), 0.0);
        assert_eq!(parse_timestamp(""), 0.0);
    }

    #[test]
    fn strict_parse_rejects_partial_text() {
        assert_eq!(try_parse_timestamp("1:"), None);
        assert_eq!(try_parse_timestamp(":30"), None);
        assert_eq!(try_parse_timestamp("1:-5"), None);
        assert_eq!(try_parse_timestamp("1:5.5"), None);
        assert_eq!(try_parse_timestamp("99999999999999999999:00"), None);
    }

    #[test]
    fn parse_inverts_format_for_whole_seconds() {
        for seconds in (0_u64..20_000).step_by(7).chain([86_399, 86_400, 359_999, 360_000]) {
            let text = format_timestamp(seconds as f64);
            assert_eq!(parse_timestamp(&text), seconds as f64, "round trip of {text}");
        }
    }
}
