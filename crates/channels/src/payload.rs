use serde::{Deserialize, Serialize};

/// File attached to an inbound message, re-uploaded on every copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// Sticker reference; platforms re-send stickers by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sticker {
    pub id: u64,
    pub name: String,
}

/// Visible header naming who wrote the original and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    /// `@<display name> wrote:`
    pub author_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_icon_url: Option<String>,
    /// `<guild name> at #<channel name>`
    pub footer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_icon_url: Option<String>,
    pub colour: u32,
}

impl Attribution {
    #[must_use]
    pub fn author_line_for(display_name: &str) -> String {
        format!("@{display_name} wrote:")
    }

    #[must_use]
    pub fn footer_for(guild_name: &str, channel_name: &str) -> String {
        format!("{guild_name} at #{channel_name}")
    }
}

/// What the relay delivers to a target endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub attribution: Attribution,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stickers: Vec<Sticker>,
}

impl RelayPayload {
    /// Copy of this payload with the body replaced and the header kept.
    #[must_use]
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }
}
