// loader.rs: Fetching and parsing timeline payloads

use crate::timeline::{GroupingStrategy, LyricUnit, Timeline};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

// Shared HTTP client with reasonable defaults for timeouts
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("verseline/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
});

pub(crate) fn http_client() -> &'static Client {
    &HTTP_CLIENT
}

static TIME_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d{1,2}):(\d{2})[.:](\d{1,3})\]").unwrap());

/// End time granted to the last LRC line, which has no successor to borrow
/// a boundary from.
const LAST_UNIT_TAIL_SECS: f64 = 5.0;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected response: HTTP {0}")]
    Status(u16),
    #[error("malformed timeline payload: {0}")]
    Malformed(String),
}

/// A parsed timeline together with the row-folding rule chosen for it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLyrics {
    pub timeline: Timeline,
    pub grouping: GroupingStrategy,
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch the raw payload behind a locator: HTTP for URLs, the filesystem
/// for anything else.
pub async fn fetch_payload(source: &str) -> Result<String, LoadError> {
    if is_remote(source) {
        let resp = http_client().get(source).send().await?;
        if !resp.status().is_success() {
            return Err(LoadError::Status(resp.status().as_u16()));
        }
        Ok(resp.text().await?)
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}

/// Fetch and parse a timeline in one step.
pub async fn load(source: &str, gap_threshold: f64) -> Result<LoadedLyrics, LoadError> {
    let raw = fetch_payload(source).await?;
    let loaded = parse_payload(&raw, gap_threshold)?;
    debug!(
        source,
        units = loaded.timeline.len(),
        grouping = ?loaded.grouping,
        "timeline loaded"
    );
    Ok(loaded)
}

/// Parse a payload into units. JSON arrays of unit records are the primary
/// format; a plain LRC transcript is accepted as a fallback.
pub fn parse_payload(raw: &str, gap_threshold: f64) -> Result<LoadedLyrics, LoadError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LoadError::Malformed("empty payload".into()));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(records)) => Ok(parse_unit_records(records, gap_threshold)),
        Ok(_) => Err(LoadError::Malformed(
            "expected a JSON array of unit records".into(),
        )),
        Err(_) => {
            let mut units = parse_lrc(trimmed);
            if units.is_empty() {
                return Err(LoadError::Malformed(
                    "payload is neither unit records nor LRC".into(),
                ));
            }
            assign_row_per_unit(&mut units);
            Ok(LoadedLyrics {
                timeline: Timeline::new(units),
                grouping: GroupingStrategy::Explicit,
            })
        }
    }
}

/// One wire record. The text field name varies by producer (`text`, `word`,
/// or `line`); `line` doubles as a numeric grouping id in word payloads, so
/// it is kept as a raw value and split by JSON type.
#[derive(Debug, Deserialize)]
struct RawRecord {
    text: Option<String>,
    word: Option<String>,
    line: Option<Value>,
    start: Option<f64>,
    end: Option<f64>,
}

fn parse_unit_records(records: Vec<Value>, gap_threshold: f64) -> LoadedLyrics {
    let mut units = Vec::with_capacity(records.len());
    let mut saw_word_key = false;
    let mut saw_group_id = false;

    for (idx, value) in records.into_iter().enumerate() {
        let record: RawRecord = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(record = idx, error = %e, "skipping unreadable unit record");
                continue;
            }
        };
        if record.word.is_some() {
            saw_word_key = true;
        }
        let group = record
            .line
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok());
        if group.is_some() {
            saw_group_id = true;
        }
        let text = record
            .text
            .or(record.word)
            .or_else(|| {
                record
                    .line
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            warn!(record = idx, "skipping unit record without text");
            continue;
        }
        let (Some(start), Some(end)) = (record.start, record.end) else {
            warn!(record = idx, "skipping unit record without a time span");
            continue;
        };
        if !start.is_finite() || !end.is_finite() || end < start {
            warn!(record = idx, start, end, "skipping unit record with a bad time span");
            continue;
        }
        units.push(LyricUnit {
            text,
            start,
            end,
            group,
        });
    }

    let grouping = if saw_group_id {
        GroupingStrategy::Explicit
    } else if saw_word_key {
        GroupingStrategy::ByGap {
            threshold: gap_threshold,
        }
    } else {
        // Line-shaped records with no ids: every unit is its own row.
        assign_row_per_unit(&mut units);
        GroupingStrategy::Explicit
    };

    LoadedLyrics {
        timeline: Timeline::new(units),
        grouping,
    }
}

fn assign_row_per_unit(units: &mut [LyricUnit]) {
    for (ordinal, unit) in units.iter_mut().enumerate() {
        unit.group = Some(ordinal as u32);
    }
}

/// Parse `[mm:ss.xx]` tagged lines. Each line's end time is the next line's
/// start; the last line gets a fixed tail.
fn parse_lrc(raw: &str) -> Vec<LyricUnit> {
    let mut tagged: Vec<(f64, String)> = Vec::new();
    for line in raw.lines() {
        let captures: Vec<_> = TIME_TAG_RE.captures_iter(line).collect();
        if captures.is_empty() {
            continue;
        }
        let text = TIME_TAG_RE.replace_all(line, "").trim().to_string();
        if text.is_empty() {
            continue;
        }
        for cap in captures {
            let min = cap
                .get(1)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            let sec = cap
                .get(2)
                .and_then(|s| s.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            let frac = cap.get(3).map(|f| f.as_str()).unwrap_or("0");
            let scale = 10f64.powi(frac.len() as i32);
            let frac_secs = frac.parse::<u32>().unwrap_or(0) as f64 / scale;
            let start = min as f64 * 60.0 + sec as f64 + frac_secs;
            tagged.push((start, text.clone()));
        }
    }
    tagged.sort_by(|a, b| a.0.total_cmp(&b.0));
    let starts: Vec<f64> = tagged.iter().map(|(start, _)| *start).collect();
    tagged
        .into_iter()
        .enumerate()
        .map(|(i, (start, text))| {
            let end = starts
                .get(i + 1)
                .copied()
                .unwrap_or(start + LAST_UNIT_TAIL_SECS);
            LyricUnit::new(text, start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(raw: &str) -> LoadedLyrics {
        parse_payload(raw, 1.0).expect("payload should parse")
    }

    #[test]
    fn parses_text_field_records() {
        let loaded = parsed(r#"[{"text":"Hello","start":0.0,"end":1.0}]"#);
        assert_eq!(loaded.timeline.len(), 1);
        assert_eq!(loaded.timeline.units()[0].text, "Hello");
    }

    #[test]
    fn word_field_is_text_and_selects_gap_grouping() {
        let loaded = parsed(
            r#"[{"word":"never","start":0.0,"end":0.4},
                {"word":"gonna","start":0.5,"end":0.9},
                {"word":"give","start":2.5,"end":2.9}]"#,
        );
        assert_eq!(loaded.grouping, GroupingStrategy::ByGap { threshold: 1.0 });
        assert_eq!(loaded.timeline.units()[0].text, "never");
        let spans = loaded.timeline.group_spans(loaded.grouping);
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn string_line_field_is_text_with_one_row_per_record() {
        let loaded = parsed(
            r#"[{"line":"first line","start":0.0,"end":2.0},
                {"line":"second line","start":2.1,"end":4.0}]"#,
        );
        assert_eq!(loaded.grouping, GroupingStrategy::Explicit);
        assert_eq!(loaded.timeline.units()[0].text, "first line");
        let spans = loaded.timeline.group_spans(loaded.grouping);
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn numeric_line_field_groups_words_explicitly() {
        let loaded = parsed(
            r#"[{"word":"so","line":0,"start":0.0,"end":0.3},
                {"word":"close","line":0,"start":0.4,"end":0.8},
                {"word":"far","line":1,"start":4.0,"end":4.5}]"#,
        );
        assert_eq!(loaded.grouping, GroupingStrategy::Explicit);
        let spans = loaded.timeline.group_spans(loaded.grouping);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].range, 0..2);
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let loaded = parsed(
            r#"[{"text":"kept","start":0.0,"end":1.0},
                {"text":"no span"},
                {"start":1.0,"end":2.0},
                {"text":"inverted","start":5.0,"end":4.0},
                "not even an object",
                {"text":"also kept","start":2.0,"end":3.0}]"#,
        );
        let texts: Vec<_> = loaded
            .timeline
            .units()
            .iter()
            .map(|u| u.text.as_str())
            .collect();
        assert_eq!(texts, vec!["kept", "also kept"]);
    }

    #[test]
    fn empty_array_is_a_valid_empty_timeline() {
        let loaded = parsed("[]");
        assert!(loaded.timeline.is_empty());
    }

    #[test]
    fn non_array_json_is_malformed() {
        assert!(matches!(
            parse_payload(r#"{"lyrics":"nope"}"#, 1.0),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn garbage_payload_is_malformed() {
        assert!(matches!(
            parse_payload("certainly not lyrics", 1.0),
            Err(LoadError::Malformed(_))
        ));
        assert!(matches!(
            parse_payload("   ", 1.0),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn lrc_lines_borrow_end_times_from_successors() {
        let loaded = parsed("[00:12.00]First line\n[00:15.30]Second line\n");
        let units = loaded.timeline.units();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].start, 12.0);
        assert!((units[0].end - 15.3).abs() < 1e-9);
        assert!((units[1].end - (15.3 + LAST_UNIT_TAIL_SECS)).abs() < 1e-9);
        assert_eq!(loaded.grouping, GroupingStrategy::Explicit);
        assert_eq!(loaded.timeline.group_spans(loaded.grouping).len(), 2);
    }

    #[test]
    fn lrc_repeated_tags_share_text() {
        let loaded = parsed("[00:05.00][00:20.00]Chorus line\n[00:10.00]Verse\n");
        let units = loaded.timeline.units();
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].text, "Chorus line");
        assert_eq!(units[1].text, "Verse");
        assert_eq!(units[2].text, "Chorus line");
        // Ends chain through the sorted starts.
        assert_eq!(units[0].end, 10.0);
        assert_eq!(units[1].end, 20.0);
    }

    #[test]
    fn lrc_millisecond_tags_scale_correctly() {
        let loaded = parsed("[00:01.500]halfway\n");
        assert_eq!(loaded.timeline.units()[0].start, 1.5);
    }

    #[tokio::test]
    async fn loads_from_a_local_file() {
        let path = std::env::temp_dir().join(format!("verseline-load-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"[{"text":"disk","start":0.0,"end":1.0}]"#)
            .await
            .expect("write fixture");
        let loaded = load(path.to_str().expect("utf8 temp path"), 1.0)
            .await
            .expect("load fixture");
        assert_eq!(loaded.timeline.units()[0].text, "disk");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = load("/definitely/not/here.json", 1.0)
            .await
            .expect_err("missing file should fail");
        assert!(matches!(err, LoadError::Io(_)));
    }
}
