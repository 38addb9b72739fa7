//! JSON front end.
//!
//! Accepts either a bare array of cues or a document with inline styles:
//!
//! ```json
//! { "styles": [{ "name": "lower", "anchor": "bottom_center" }],
//!   "cues": [{ "start": 1.0, "end": "00:00:02.500", "text": "Hi", "style": "lower" }] }
//! ```
//!
//! Times are seconds (number) or timestamp strings.

use std::time::Duration;

use serde::Deserialize;
use televid_common::error::{TelevidError, TelevidResult};

use crate::cue::RawCue;
use crate::style::{StyleDefinition, StyleSheet};
use crate::timestamp::parse_timestamp;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Bare(Vec<JsonCue>),
    Full {
        #[serde(default)]
        styles: Vec<StyleDefinition>,
        cues: Vec<JsonCue>,
    },
}

#[derive(Debug, Deserialize)]
struct JsonCue {
    start: JsonTime,
    end: JsonTime,
    #[serde(default)]
    text: String,
    #[serde(default)]
    style: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonTime {
    Seconds(f64),
    Stamp(String),
}

impl JsonTime {
    fn to_duration(&self) -> Result<Duration, String> {
        match self {
            JsonTime::Seconds(secs) => televid_common::clock::secs_to_duration(*secs)
                .ok_or_else(|| format!("invalid time {secs}")),
            JsonTime::Stamp(s) => parse_timestamp(s),
        }
    }
}

/// Parse a JSON cue document into raw cues and any inline styles.
pub fn parse_json(input: &str) -> TelevidResult<(Vec<RawCue>, Option<StyleSheet>)> {
    let doc: JsonDocument = serde_json::from_str(input).map_err(|e| {
        TelevidError::malformed_cue(0, Some(e.line()), format!("invalid cue JSON: {e}"))
    })?;

    let (cues, styles) = match doc {
        JsonDocument::Bare(cues) => (cues, None),
        JsonDocument::Full { styles, cues } => {
            let sheet = if styles.is_empty() {
                None
            } else {
                let mut sheet = StyleSheet::empty();
                for style in styles {
                    style.validate()?;
                    sheet.insert(style);
                }
                Some(sheet)
            };
            (cues, sheet)
        }
    };

    let raw = cues
        .into_iter()
        .enumerate()
        .map(|(index, cue)| {
            let start = cue
                .start
                .to_duration()
                .map_err(|e| TelevidError::malformed_cue(index, None, format!("start: {e}")))?;
            let end = cue
                .end
                .to_duration()
                .map_err(|e| TelevidError::malformed_cue(index, None, format!("end: {e}")))?;
            Ok(RawCue {
                index,
                line: None,
                start,
                end,
                text: cue.text.replace("\r\n", "\n"),
                style: cue.style,
            })
        })
        .collect::<TelevidResult<Vec<_>>>()?;

    Ok((raw, styles))
}
