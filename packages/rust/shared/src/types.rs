//! Core record types shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance tag stamped on every imported record.
pub const ORIGIN_INTERNET: &str = "internet";

/// Maximum title length in characters before truncation.
pub const TITLE_MAX_CHARS: usize = 50;

/// Marker appended to truncated titles.
const ELLIPSIS: &str = "...";

// ---------------------------------------------------------------------------
// RawPrompt
// ---------------------------------------------------------------------------

/// A numbered list item extracted from the source document.
///
/// This is the element type of `raw_prompts.json`, the only artifact of the
/// extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPrompt {
    /// Section heading in effect when the item was read.
    pub category: String,
    /// Item text with the numeral prefix stripped.
    pub content: String,
    /// Numeral prefix of the list item. Not unique.
    pub index: u64,
    /// Optional subcategory (hand-edited raw files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

impl RawPrompt {
    pub fn new(category: impl Into<String>, index: u64, content: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            content: content.into(),
            index,
            subcategory: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Area
// ---------------------------------------------------------------------------

/// Coarse routing tag used by the consuming application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Area {
    #[default]
    Image,
    Text,
    Code,
}

impl Area {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Text => "TEXT",
            Self::Code => "CODE",
        }
    }
}

impl std::fmt::Display for Area {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EnrichedPrompt
// ---------------------------------------------------------------------------

/// A prompt ready for insertion into the remote `prompts` table.
///
/// Field names are the table's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPrompt {
    pub id: String,
    pub title: String,
    pub content_es: String,
    pub content_en: String,
    pub tags: Vec<String>,
    pub tags_en: Vec<String>,
    pub category: String,
    pub subcategory: String,
    pub origin: String,
    pub rating: u8,
    pub apps: Vec<String>,
    pub area: Area,
    /// Epoch milliseconds.
    pub last_modified: i64,
}

/// Generate a fresh opaque record identifier.
pub fn new_prompt_id() -> String {
    Uuid::now_v7().to_string()
}

/// Derive a display title from prompt content.
pub fn make_title(content: &str) -> String {
    truncate_chars(content, TITLE_MAX_CHARS)
}

/// Keep the first `max` characters of `text`, appending `...` when cut.
///
/// Counts characters, not bytes, so accented text is never split mid-glyph.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
