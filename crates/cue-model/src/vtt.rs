//! WebVTT (`.vtt`) front end.
//!
//! Cue settings (`line:`, `position:` ...) and `NOTE`, `STYLE` and `REGION`
//! blocks are ignored; placement comes from the televid style instead.

use televid_common::error::{TelevidError, TelevidResult};

use crate::cue::{strip_markup, Cue, RawCue};
use crate::srt::{blocks, parse_timing};
use crate::timestamp::format_vtt_time;

/// Parse WebVTT text into raw cues in document order.
pub fn parse_vtt(input: &str) -> TelevidResult<Vec<RawCue>> {
    let all = blocks(input);
    let mut iter = all.into_iter();

    match iter.next() {
        Some(header) if header.lines[0].starts_with("WEBVTT") => {}
        Some(header) => {
            return Err(TelevidError::malformed_cue(
                0,
                Some(header.first_line),
                "missing WEBVTT header",
            ))
        }
        None => return Ok(Vec::new()),
    }

    let mut cues = Vec::new();
    for block in iter {
        let first = block.lines[0];
        if first.starts_with("NOTE") || first == "STYLE" || first == "REGION" {
            continue;
        }

        let index = cues.len();
        // First line is either the timing line or an identifier.
        let (offset, timing) = if first.contains("-->") {
            (0, first)
        } else {
            match block.lines.get(1) {
                Some(second) if second.contains("-->") => (1, *second),
                _ => {
                    return Err(TelevidError::malformed_cue(
                        index,
                        Some(block.first_line),
                        "block has no timing line",
                    ))
                }
            }
        };

        let (start, end) = parse_timing(timing, index, block.first_line + offset)?;
        let text = strip_markup(&block.lines[offset + 1..].join("\n"));

        cues.push(RawCue {
            index,
            line: Some(block.first_line),
            start,
            end,
            text,
            style: None,
        });
    }

    Ok(cues)
}

/// Serialize cues as WebVTT.
pub fn write_vtt<'a>(cues: impl IntoIterator<Item = &'a Cue>) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for cue in cues {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(cue.start),
            format_vtt_time(cue.end),
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_vtt() {
        let input = "WEBVTT - demo\n\nNOTE this is ignored\nacross lines\n\nintro\n00:01.000 --> 00:02.000 line:10% align:start\n<v Roger>Hi there\n\n00:00:03.000 --> 00:00:04.250\nSecond\n";
        let cues = parse_vtt(input).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start, Duration::from_secs(1));
        assert_eq!(cues[0].text, "Hi there");
        assert_eq!(cues[1].index, 1);
        assert_eq!(cues[1].end, Duration::from_millis(4250));
    }

    #[test]
    fn test_vtt_requires_header() {
        let err = parse_vtt("00:01.000 --> 00:02.000\nHi\n").unwrap_err();
        assert!(matches!(err, TelevidError::MalformedCue { .. }));
    }

    #[test]
    fn test_empty_vtt_document() {
        assert!(parse_vtt("WEBVTT\n").unwrap().is_empty());
        assert!(parse_vtt("").unwrap().is_empty());
    }

    #[test]
    fn test_write_vtt() {
        let cue = Cue {
            index: 0,
            start: Duration::from_millis(1500),
            end: Duration::from_secs(3),
            text: "Hello".to_string(),
            style: "default".to_string(),
        };
        assert_eq!(
            write_vtt([&cue]),
            "WEBVTT\n\n00:00:01.500 --> 00:00:03.000\nHello\n\n"
        );
    }
}
