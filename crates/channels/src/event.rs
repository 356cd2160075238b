//! Typed inbound events produced by platform adapters.

use {
    crossover_common::{Endpoint, MessageId, UserId},
    serde::Serialize,
};

use crate::payload::{Attachment, Sticker};

/// Who wrote an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: UserId,
    /// Global display name, falling back to the username.
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A new message posted in a guild channel.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedMessage {
    pub endpoint: Endpoint,
    pub message_id: MessageId,
    pub author: Author,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub stickers: Vec<Sticker>,
}

/// An edit of an existing message.
#[derive(Debug, Clone, Serialize)]
pub struct EditedMessage {
    pub endpoint: Endpoint,
    pub message_id: MessageId,
    /// `None` when the platform didn't say who edited.
    pub editor_id: Option<UserId>,
    pub content: String,
}

/// A removed message.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedMessage {
    pub endpoint: Endpoint,
    pub message_id: MessageId,
    /// Author of the removed message if the platform still knew it.
    pub author_id: Option<UserId>,
}

/// Inbound event stream item consumed by the relay engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RelayEvent {
    MessageCreated(CreatedMessage),
    MessageEdited(EditedMessage),
    MessageDeleted(DeletedMessage),
    BulkMessageDeleted(Vec<DeletedMessage>),
}

impl RelayEvent {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageCreated(_) => "message_created",
            Self::MessageEdited(_) => "message_edited",
            Self::MessageDeleted(_) => "message_deleted",
            Self::BulkMessageDeleted(_) => "bulk_message_deleted",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_kind_tag() {
        let event = RelayEvent::MessageDeleted(DeletedMessage {
            endpoint: Endpoint::new(1, 2),
            message_id: 3,
            author_id: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "message_deleted");
        assert_eq!(json["data"]["message_id"], 3);
        assert_eq!(event.kind(), "message_deleted");
    }
}
