//! Cue timestamp parsing and formatting.
//!
//! Accepted forms: `HH:MM:SS,mmm` (SubRip), `HH:MM:SS.mmm` and `MM:SS.mmm`
//! (WebVTT). Fractions may have 1 to 9 digits.

use std::time::Duration;

/// Parse a subtitle timestamp.
pub fn parse_timestamp(value: &str) -> Result<Duration, String> {
    let cleaned = value.trim();
    if cleaned.is_empty() {
        return Err("empty timestamp".to_string());
    }

    let (clock, fraction) = match cleaned.rfind(['.', ',']) {
        Some(pos) => (&cleaned[..pos], Some(&cleaned[pos + 1..])),
        None => (cleaned, None),
    };

    let fields: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match fields.as_slice() {
        [h, m, s] => (
            parse_field(h, "hours")?,
            parse_field(m, "minutes")?,
            parse_field(s, "seconds")?,
        ),
        [m, s] => (0, parse_field(m, "minutes")?, parse_field(s, "seconds")?),
        _ => return Err(format!("'{value}' is not HH:MM:SS.mmm or MM:SS.mmm")),
    };

    if minutes >= 60 {
        return Err(format!("minutes out of range in '{value}'"));
    }
    if seconds >= 60 {
        return Err(format!("seconds out of range in '{value}'"));
    }

    let nanos = match fraction {
        Some(digits) => {
            parse_fraction(digits).ok_or_else(|| format!("invalid fraction in '{value}'"))?
        }
        None => 0,
    };

    let whole = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .ok_or_else(|| format!("timestamp '{value}' overflows"))?;
    Ok(Duration::new(whole, nanos))
}

fn parse_field(raw: &str, name: &str) -> Result<u64, String> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid {name} component '{raw}'"));
    }
    raw.parse::<u64>()
        .map_err(|e| format!("invalid {name} component '{raw}': {e}"))
}

fn parse_fraction(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut padded = digits.to_string();
    padded.push_str(&"0".repeat(9 - digits.len()));
    padded.parse::<u32>().ok()
}

/// Format as SubRip timestamp: HH:MM:SS,mmm
pub fn format_srt_time(time: Duration) -> String {
    let (hours, minutes, seconds, millis) = split_millis(time);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format as WebVTT timestamp: HH:MM:SS.mmm
pub fn format_vtt_time(time: Duration) -> String {
    let (hours, minutes, seconds, millis) = split_millis(time);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn split_millis(time: Duration) -> (u128, u128, u128, u128) {
    let total_ms = time.as_millis();
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_srt_and_vtt_forms() {
        assert_eq!(
            parse_timestamp("00:00:01,000").unwrap(),
            Duration::from_secs(1)
        );
        assert_eq!(
            parse_timestamp("01:01:01.500").unwrap(),
            Duration::from_millis(3_661_500)
        );
        assert_eq!(
            parse_timestamp("02:03.250").unwrap(),
            Duration::from_millis(123_250)
        );
        assert_eq!(
            parse_timestamp("00:00:02.5").unwrap(),
            Duration::from_millis(2500)
        );
        assert_eq!(parse_timestamp("00:00:04").unwrap(), Duration::from_secs(4));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("abc").is_err());
        assert!(parse_timestamp("00:61:00,000").is_err());
        assert!(parse_timestamp("00:00:75,000").is_err());
        assert!(parse_timestamp("1:2:3:4").is_err());
        assert!(parse_timestamp("00:00:01,12a").is_err());
        assert!(parse_timestamp("-1:00:00,000").is_err());
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(format_srt_time(Duration::ZERO), "00:00:00,000");
        assert_eq!(
            format_srt_time(Duration::from_millis(3_661_500)),
            "01:01:01,500"
        );
        assert_eq!(
            format_vtt_time(Duration::from_millis(3_661_500)),
            "01:01:01.500"
        );
    }
}
