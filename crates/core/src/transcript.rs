//! Chat transcript entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Bodies longer than this are cut before storage
pub const MAX_BODY_CHARS: usize = 300;
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "outbound" => Self::Outbound,
            _ => Self::Inbound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Interactive,
    Template,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Interactive => "interactive",
            Self::Template => "template",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "document" => Self::Document,
            "interactive" => Self::Interactive,
            "template" => Self::Template,
            _ => Self::Text,
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Video | Self::Audio | Self::Document)
    }
}

/// One append-only transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub organization_id: String,
    /// Contact phone the entry belongs to
    pub phone: String,
    pub direction: Direction,
    pub from: String,
    pub to: String,
    pub kind: MessageKind,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Cut a body to at most `MAX_BODY_CHARS` characters plus the marker
///
/// The cut lands on a grapheme boundary, so a cluster that would cross the
/// limit is dropped whole.
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        return body.to_string();
    }

    let mut head = String::new();
    let mut chars = 0;
    for grapheme in body.graphemes(true) {
        let width = grapheme.chars().count();
        if chars + width > MAX_BODY_CHARS {
            break;
        }
        head.push_str(grapheme);
        chars += width;
    }
    format!("{}{}", head, TRUNCATION_MARKER)
}
