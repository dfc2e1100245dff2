//! Watermark codec: the sync metadata embedded at the end of every generated document.
//!
//! The block is an HTML comment so it never shows up in rendered Markdown:
//!
//! ```text
//! <!-- docsync:metadata
//! {"last_sync_at":"2025-01-01T00:00:00.000Z","sources":[{"id":"1a2b","name":"Intro"}]}
//! -->
//! ```
//!
//! or, with [`WatermarkFormat::Lines`]:
//!
//! ```text
//! <!-- docsync:metadata
//! last_sync_at: 2025-01-01T00:00:00.000Z
//! source: ["1a2b","Intro"]
//! -->
//! ```
//!
//! [`decode`] understands both shapes regardless of the configured format and
//! never fails loudly: a missing or garbled block is `None`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

pub const BLOCK_START: &str = "<!-- docsync:metadata";
pub const BLOCK_END: &str = "-->";

const KEY_LAST_SYNC: &str = "last_sync_at";
const KEY_SOURCE: &str = "source";

/// Serialisation used when writing the watermark block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkFormat {
    #[default]
    Json,
    Lines,
}

/// One source item a document was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub name: String,
}

impl ManifestEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        ManifestEntry {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Decoded sync metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub last_sync_at: DateTime<Utc>,
    pub sources: Vec<ManifestEntry>,
}

#[derive(Deserialize)]
struct JsonBlock {
    last_sync_at: String,
    #[serde(default)]
    sources: Vec<ManifestEntry>,
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// `>` inside a JSON string would let a name like `a-->b` close the comment.
/// JSON escapes for the characters that could close the comment or open a
/// second marker inside it. Both decode back to the original text.
fn escape_comment(json: String) -> String {
    json.replace('<', "\\u003c").replace('>', "\\u003e")
}

/// Encode a watermark block for `manifest` synced at `sync_time`.
pub fn encode(manifest: &[ManifestEntry], sync_time: DateTime<Utc>, format: WatermarkFormat) -> String {
    let body = match format {
        WatermarkFormat::Json => {
            let sources: Vec<Value> = manifest
                .iter()
                .map(|entry| json!({ "id": entry.id, "name": entry.name }))
                .collect();
            let block = json!({ "last_sync_at": format_time(sync_time), "sources": sources });
            escape_comment(block.to_string())
        }
        WatermarkFormat::Lines => {
            let mut lines = vec![format!("{KEY_LAST_SYNC}: {}", format_time(sync_time))];
            for entry in manifest {
                let pair = json!([entry.id, entry.name]).to_string();
                lines.push(format!("{KEY_SOURCE}: {}", escape_comment(pair)));
            }
            lines.join("\n")
        }
    };
    format!("{BLOCK_START}\n{body}\n{BLOCK_END}")
}

/// Locate the last watermark block: (start of marker, end of closing `-->` if any).
fn find_block(text: &str) -> Option<(usize, Option<usize>)> {
    let start = text.rfind(BLOCK_START)?;
    let end = text[start..]
        .find(BLOCK_END)
        .map(|offset| start + offset + BLOCK_END.len());
    Some((start, end))
}

/// Extract and parse the watermark. Absence and corruption both yield `None`.
pub fn decode(text: &str) -> Option<Watermark> {
    let (start, end) = find_block(text)?;
    let Some(end) = end else {
        debug!("[META] Watermark block is not terminated");
        return None;
    };
    let inner = text[start + BLOCK_START.len()..end - BLOCK_END.len()].trim();
    let decoded = if inner.starts_with('{') {
        decode_json(inner)
    } else {
        decode_lines(inner)
    };
    if decoded.is_none() {
        debug!("[META] Watermark block could not be parsed, treating as never synced");
    }
    decoded
}

fn decode_json(inner: &str) -> Option<Watermark> {
    let block: JsonBlock = serde_json::from_str(inner).ok()?;
    Some(Watermark {
        last_sync_at: parse_time(&block.last_sync_at)?,
        sources: block.sources,
    })
}

fn decode_lines(inner: &str) -> Option<Watermark> {
    let mut last_sync_at = None;
    let mut sources = Vec::new();
    for line in inner.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (key, value) = line.split_once(':')?;
        match key.trim() {
            KEY_LAST_SYNC => last_sync_at = Some(parse_time(value)?),
            KEY_SOURCE => {
                let (id, name): (String, String) = serde_json::from_str(value.trim()).ok()?;
                sources.push(ManifestEntry { id, name });
            }
            _ => {}
        }
    }
    Some(Watermark {
        last_sync_at: last_sync_at?,
        sources,
    })
}

/// Remove every watermark block (terminated or not) and trailing whitespace.
pub fn strip(text: &str) -> String {
    let mut out = text.to_string();
    while let Some((start, end)) = find_block(&out) {
        let end = end.unwrap_or(out.len());
        out.replace_range(start..end, "");
    }
    out.trim_end().to_string()
}

/// Append a fresh watermark to `body`, replacing any block it already carries.
pub fn stamp(
    body: &str,
    manifest: &[ManifestEntry],
    sync_time: DateTime<Utc>,
    format: WatermarkFormat,
) -> String {
    format!("{}\n\n{}\n", strip(body), encode(manifest, sync_time, format))
}
