//! SubRip (`.srt`) front end.

use televid_common::error::{TelevidError, TelevidResult};

use crate::cue::{strip_markup, Cue, RawCue};
use crate::timestamp::{format_srt_time, parse_timestamp};

/// A block of non-blank lines with the 1-based line number of its first line.
pub(crate) struct Block<'a> {
    pub first_line: usize,
    pub lines: Vec<&'a str>,
}

/// Split text into blank-line separated blocks.
pub(crate) fn blocks(input: &str) -> Vec<Block<'_>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut out = Vec::new();
    let mut current: Option<Block<'_>> = None;

    for (i, line) in input.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if let Some(block) = current.take() {
                out.push(block);
            }
            continue;
        }
        current
            .get_or_insert_with(|| Block {
                first_line: i + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }
    if let Some(block) = current {
        out.push(block);
    }
    out
}

/// Parse a `start --> end [settings]` timing line.
pub(crate) fn parse_timing(
    line: &str,
    index: usize,
    line_no: usize,
) -> TelevidResult<(std::time::Duration, std::time::Duration)> {
    let (left, right) = line.split_once("-->").ok_or_else(|| {
        TelevidError::malformed_cue(index, Some(line_no), format!("missing '-->' in '{line}'"))
    })?;
    let end_token = right.split_whitespace().next().unwrap_or("");
    let start = parse_timestamp(left)
        .map_err(|e| TelevidError::malformed_cue(index, Some(line_no), e))?;
    let end = parse_timestamp(end_token)
        .map_err(|e| TelevidError::malformed_cue(index, Some(line_no), e))?;
    Ok((start, end))
}

/// Parse SubRip text into raw cues in document order.
pub fn parse_srt(input: &str) -> TelevidResult<Vec<RawCue>> {
    let mut cues = Vec::new();

    for (index, block) in blocks(input).into_iter().enumerate() {
        let mut lines = block.lines.iter().copied().enumerate();

        // Sequence numbers are optional and not trusted for ordering.
        let (offset, timing) = match lines.next() {
            Some((_, first)) if first.contains("-->") => (0, first),
            Some((_, _)) => match lines.next() {
                Some((o, second)) if second.contains("-->") => (o, second),
                _ => {
                    return Err(TelevidError::malformed_cue(
                        index,
                        Some(block.first_line),
                        "block has no timing line",
                    ))
                }
            },
            None => continue,
        };

        let (start, end) = parse_timing(timing, index, block.first_line + offset)?;
        let text = strip_markup(&lines.map(|(_, l)| l).collect::<Vec<_>>().join("\n"));

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

/// Serialize cues as SubRip, numbering them from 1 in track order.
pub fn write_srt<'a>(cues: impl IntoIterator<Item = &'a Cue>) -> String {
    let mut output = String::new();

    for (i, cue) in cues.into_iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cue.start),
            format_srt_time(cue.end),
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::{parse_cues, CueFormat, ParseOptions};
    use std::time::Duration;

    const SAMPLE: &str = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,500\r\n<i>Hello</i>\r\nworld\r\n\r\n2\r\n00:00:00,500 --> 00:00:01,000 X1:10 X2:20\r\nFirst\r\n";

    #[test]
    fn test_parse_srt_blocks() {
        let cues = parse_srt(SAMPLE).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start, Duration::from_secs(1));
        assert_eq!(cues[0].end, Duration::from_millis(2500));
        assert_eq!(cues[0].text, "Hello\nworld");
        assert_eq!(cues[0].line, Some(1));
        assert_eq!(cues[1].end, Duration::from_secs(1));
        assert_eq!(cues[1].line, Some(6));
    }

    #[test]
    fn test_parse_srt_without_sequence_numbers() {
        let cues = parse_srt("00:00:01,000 --> 00:00:02,000\nNo number\n").unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "No number");
    }

    #[test]
    fn test_parse_srt_reports_bad_timestamp() {
        let err = parse_srt("1\n00:00:01,000 --> 00:00:0x,000\nBad\n").unwrap_err();
        match err {
            TelevidError::MalformedCue { index, line, .. } => {
                assert_eq!(index, 0);
                assert_eq!(line, Some(2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_srt_missing_timing_line() {
        assert!(parse_srt("1\nJust text\nmore text\n").is_err());
    }

    #[test]
    fn test_srt_track_is_sorted() {
        let track = parse_cues(SAMPLE, CueFormat::Srt, &ParseOptions::default()).unwrap();
        assert_eq!(track.cues()[0].text, "First");
        assert_eq!(track.cues()[0].index, 1);
    }

    #[test]
    fn test_write_srt() {
        let track = parse_cues(SAMPLE, CueFormat::Srt, &ParseOptions::default()).unwrap();
        let srt = write_srt(&track);
        assert!(srt.starts_with("1\n00:00:00,500 --> 00:00:01,000\nFirst\n\n2\n"));
        assert!(srt.contains("00:00:01,000 --> 00:00:02,500\nHello\nworld\n"));

        let reparsed = parse_cues(&srt, CueFormat::Srt, &ParseOptions::default()).unwrap();
        assert_eq!(reparsed.len(), 2);
    }
}
