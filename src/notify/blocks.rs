//! Slack Block Kit rich-text primitives, serialized as the Web API expects.

use serde::Serialize;

/// A top-level message block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    RichText {
        block_id: String,
        elements: Vec<RichTextElement>,
    },
}

impl Block {
    pub fn rich_text(block_id: impl Into<String>, elements: Vec<RichTextElement>) -> Self {
        Block::RichText {
            block_id: block_id.into(),
            elements,
        }
    }

    pub fn block_id(&self) -> &str {
        match self {
            Block::RichText { block_id, .. } => block_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextElement {
    RichTextSection {
        elements: Vec<Inline>,
    },
    RichTextList {
        style: ListStyle,
        indent: u32,
        elements: Vec<RichTextElement>,
    },
}

impl RichTextElement {
    pub fn section(elements: Vec<Inline>) -> Self {
        RichTextElement::RichTextSection { elements }
    }

    pub fn bullets(items: Vec<RichTextElement>) -> Self {
        RichTextElement::RichTextList {
            style: ListStyle::Bullet,
            indent: 0,
            elements: items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStyle {
    Bullet,
}

/// Inline elements inside a rich-text section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<TextStyle>,
    },
    Emoji {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        skin_tone: Option<u8>,
    },
    Link {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        style: Option<TextStyle>,
    },
    Date {
        timestamp: i64,
        format: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
    Usergroup {
        usergroup_id: String,
    },
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            style: None,
        }
    }

    pub fn emoji(name: impl Into<String>, skin_tone: u8) -> Self {
        Inline::Emoji {
            name: name.into(),
            skin_tone: Some(skin_tone),
        }
    }

    pub fn bold_link(url: impl Into<String>, text: impl Into<String>) -> Self {
        Inline::Link {
            url: url.into(),
            text: Some(text.into()),
            style: Some(TextStyle::bold()),
        }
    }

    pub fn date(timestamp: i64, format: impl Into<String>, fallback: impl Into<String>) -> Self {
        Inline::Date {
            timestamp,
            format: format.into(),
            fallback: Some(fallback.into()),
        }
    }

    pub fn usergroup(id: impl Into<String>) -> Self {
        Inline::Usergroup {
            usergroup_id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TextStyle {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
}

impl TextStyle {
    pub fn bold() -> Self {
        Self { bold: true }
    }
}
