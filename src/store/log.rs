//! Log record codec.
//!
//! The log is a sequence of lines, each holding one merge record:
//!
//! ```text
//! "note/alpha": {"title":"Alpha"},
//! "note/beta": null,
//! ```
//!
//! A line's body is a JSON object entry without the surrounding braces —
//! key, colon, value, trailing comma. A `null` value is a tombstone. A
//! compacted log is one line per live key with the key's full value;
//! trailing uncompacted records may follow a snapshot and replay in order.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

/// One record as it appears in the log. `value: None` is a tombstone.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub key: String,
    pub value: Option<Value>,
}

impl LogRecord {
    pub fn patch(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }

    pub fn tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// Encode one record as a single log line, newline-terminated.
pub fn encode_record(key: &str, value: Option<&Value>) -> String {
    let key_json = Value::String(key.to_string()).to_string();
    let value_json = match value {
        Some(value) => value.to_string(),
        None => "null".to_string(),
    };
    format!("{key_json}: {value_json},\n")
}

/// Encode a full snapshot: one record per entry, in the given order.
pub fn encode_snapshot<'a>(entries: impl Iterator<Item = (&'a str, &'a Value)>) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(&encode_record(key, Some(value)));
    }
    out
}

/// Parse the full log text into records, in file order.
///
/// Any malformed line is an error; the store treats that as a corrupt log
/// and falls back to an empty collection.
pub fn parse_log(text: &str) -> Result<Vec<LogRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        records.push(
            parse_line(trimmed)
                .with_context(|| format!("malformed log record at line {}", line_no + 1))?,
        );
    }
    Ok(records)
}

/// Parse one `"key": value,` line by wrapping it in braces and reading it
/// back as a single-entry JSON object.
fn parse_line(line: &str) -> Result<LogRecord> {
    let body = line.strip_suffix(',').unwrap_or(line);
    let wrapped = format!("{{{body}}}");
    let entry: Map<String, Value> =
        serde_json::from_str(&wrapped).context("record is not a JSON object entry")?;
    if entry.len() != 1 {
        bail!("expected exactly one record per line, found {}", entry.len());
    }
    let (key, value) = entry.into_iter().next().context("record entry missing")?;
    let value = match value {
        Value::Null => None,
        other => Some(other),
    };
    Ok(LogRecord { key, value })
}
