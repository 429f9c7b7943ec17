use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Block exactly as it travels over the wire and sits in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub style: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Typed content of a block. `Other` keeps unknown tags renderable.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockBody {
    Heading(String),
    Paragraph(String),
    MemberCard(MemberCard),
    Button(String),
    Image(ImageContent),
    Other { kind: String, content: Value },
}

/// One renderable unit of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub body: BlockBody,
    pub style: BTreeMap<String, String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("block {index}: type is required")]
    MissingType { index: usize },
    #[error("block {index}: content is required")]
    MissingContent { index: usize },
    #[error("block {index}: {kind} content must be {expected}")]
    ShapeMismatch {
        index: usize,
        kind: String,
        expected: &'static str,
    },
}

impl Block {
    /// Strict conversion used for client input.
    pub fn parse(index: usize, raw: RawBlock) -> Result<Self, BlockError> {
        if raw.kind.trim().is_empty() {
            return Err(BlockError::MissingType { index });
        }
        if raw.content.is_null() {
            return Err(BlockError::MissingContent { index });
        }
        let expected = match raw.kind.as_str() {
            "heading" | "paragraph" | "button" if !raw.content.is_string() => Some("a string"),
            "member-card" | "image" if !raw.content.is_object() => Some("an object"),
            _ => None,
        };
        if let Some(expected) = expected {
            return Err(BlockError::ShapeMismatch {
                index,
                kind: raw.kind,
                expected,
            });
        }
        Ok(Self::from(raw))
    }

    pub fn kind(&self) -> &str {
        match &self.body {
            BlockBody::Heading(_) => "heading",
            BlockBody::Paragraph(_) => "paragraph",
            BlockBody::MemberCard(_) => "member-card",
            BlockBody::Button(_) => "button",
            BlockBody::Image(_) => "image",
            BlockBody::Other { kind, .. } => kind,
        }
    }
}

pub fn parse_blocks(raw: Vec<RawBlock>) -> Result<Vec<Block>, BlockError> {
    raw.into_iter()
        .enumerate()
        .map(|(i, b)| Block::parse(i, b))
        .collect()
}

/// Best-effort text of a JSON value; non-text shapes degrade to nothing.
pub(crate) fn text_of(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

// Lenient: stored rows may predate validation, so every shape decodes.
impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        let body = match raw.kind.as_str() {
            "heading" => BlockBody::Heading(text_of(&raw.content)),
            "paragraph" => BlockBody::Paragraph(text_of(&raw.content)),
            "button" => BlockBody::Button(text_of(&raw.content)),
            "member-card" => {
                BlockBody::MemberCard(serde_json::from_value(raw.content).unwrap_or_default())
            }
            "image" => BlockBody::Image(serde_json::from_value(raw.content).unwrap_or_default()),
            _ => BlockBody::Other {
                kind: raw.kind,
                content: raw.content,
            },
        };
        Self {
            body,
            style: raw.style,
        }
    }
}

impl From<Block> for RawBlock {
    fn from(b: Block) -> Self {
        let (kind, content) = match b.body {
            BlockBody::Heading(t) => ("heading".to_string(), Value::String(t)),
            BlockBody::Paragraph(t) => ("paragraph".to_string(), Value::String(t)),
            BlockBody::Button(t) => ("button".to_string(), Value::String(t)),
            BlockBody::MemberCard(c) => (
                "member-card".to_string(),
                serde_json::to_value(c).unwrap_or(Value::Null),
            ),
            BlockBody::Image(c) => (
                "image".to_string(),
                serde_json::to_value(c).unwrap_or(Value::Null),
            ),
            BlockBody::Other { kind, content } => (kind, content),
        };
        Self {
            kind,
            content,
            style: b.style,
        }
    }
}

/// A named, owned, ordered sequence of blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub owner_id: Uuid,
    pub name: String,
    #[serde(rename = "content")]
    pub blocks: Vec<Block>,
    pub is_favorite: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Template {
    pub fn new(owner_id: Uuid, name: String, blocks: Vec<Block>, is_favorite: bool) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            blocks,
            is_favorite,
            created_at: now,
            updated_at: now,
        }
    }
}
