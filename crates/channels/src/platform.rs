use {
    async_trait::async_trait,
    crossover_common::{Endpoint, MessageId, UserId},
};

use crate::{error::Result, payload::RelayPayload};

/// Display details of an endpoint the current session can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub endpoint: Endpoint,
    pub guild_name: String,
    pub channel_name: String,
    pub guild_icon_url: Option<String>,
}

/// Outbound side of a chat platform, as the relay core sees it.
#[async_trait]
pub trait RelayPlatform: Send + Sync {
    /// Account id of the relay itself, once the session knows it.
    fn self_id(&self) -> Option<UserId>;

    /// Look up an endpoint on the live session. `None` means the guild or
    /// channel is gone or not visible, i.e. unreachable.
    async fn resolve_endpoint(&self, endpoint: Endpoint) -> Option<EndpointInfo>;

    /// Deliver a relayed copy and return its new message id.
    async fn send_message(&self, endpoint: Endpoint, payload: &RelayPayload) -> Result<MessageId>;

    /// Read back a relayed copy. `Ok(None)` when it no longer exists.
    async fn fetch_message(
        &self,
        endpoint: Endpoint,
        message_id: MessageId,
    ) -> Result<Option<RelayPayload>>;

    /// Replace a relayed copy in place.
    async fn edit_message(
        &self,
        endpoint: Endpoint,
        message_id: MessageId,
        payload: &RelayPayload,
    ) -> Result<()>;

    /// Remove a relayed copy. Adapters report a missing message as
    /// [`Error::NotFound`](crate::Error::NotFound).
    async fn delete_message(&self, endpoint: Endpoint, message_id: MessageId) -> Result<()>;

    /// Post a plain text notice (command replies, link notifications).
    async fn send_notice(&self, endpoint: Endpoint, text: &str) -> Result<()>;
}
