use {
    async_trait::async_trait,
    crossover_channels::{EndpointInfo, Error, RelayPayload, RelayPlatform, Result},
    crossover_common::{Endpoint, MessageId, UserId},
    serenity::all::{CreateAttachment, CreateMessage, EditMessage, StickerId},
    tracing::{debug, warn},
};

use crate::{
    convert::{self, discord_ids},
    state::{Session, SessionState},
};

/// Outbound side of the relay over the Discord REST API.
pub struct DiscordPlatform {
    session: SessionState,
    downloads: reqwest::Client,
}

impl DiscordPlatform {
    pub fn new(session: SessionState) -> Self {
        Self {
            session,
            downloads: reqwest::Client::new(),
        }
    }

    fn session(&self, endpoint: Endpoint) -> Result<Session> {
        self.session
            .get()
            .ok_or_else(|| Error::unreachable(endpoint))
    }

    fn ids(endpoint: Endpoint) -> Result<(serenity::all::GuildId, serenity::all::ChannelId)> {
        discord_ids(endpoint).ok_or_else(|| Error::invalid_input(format!("bad endpoint {endpoint}")))
    }

    /// Map a serenity failure, keeping 404s distinguishable.
    fn classify(endpoint: Endpoint, message_id: MessageId, context: &str, err: serenity::Error) -> Error {
        if convert::is_not_found(&err) {
            Error::not_found(endpoint, message_id)
        } else {
            Error::external(context, err)
        }
    }

    async fn download(&self, filename: &str, url: &str) -> Result<CreateAttachment> {
        let bytes = self
            .downloads
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::external("download attachment", e))?
            .bytes()
            .await
            .map_err(|e| Error::external("read attachment", e))?;
        Ok(CreateAttachment::bytes(bytes.to_vec(), filename))
    }
}

#[async_trait]
impl RelayPlatform for DiscordPlatform {
    fn self_id(&self) -> Option<UserId> {
        self.session.bot_user_id()
    }

    async fn resolve_endpoint(&self, endpoint: Endpoint) -> Option<EndpointInfo> {
        let session = self.session.get()?;
        let (guild_id, channel_id) = discord_ids(endpoint)?;
        let guild = session.cache.guild(guild_id)?;
        let channel =
            convert::guild_channel(guild.channels.get(&channel_id), &guild.threads, channel_id)?;
        Some(EndpointInfo {
            endpoint,
            guild_name: guild.name.clone(),
            channel_name: channel.name.clone(),
            guild_icon_url: guild.icon_url(),
        })
    }

    async fn send_message(&self, endpoint: Endpoint, payload: &RelayPayload) -> Result<MessageId> {
        let session = self.session(endpoint)?;
        let (_, channel_id) = Self::ids(endpoint)?;

        let mut builder = CreateMessage::new().embed(convert::embed(payload));
        for attachment in &payload.attachments {
            match self.download(&attachment.filename, &attachment.url).await {
                Ok(file) => builder = builder.add_file(file),
                Err(e) => {
                    warn!(dest = %endpoint, file = %attachment.filename, error = %e, "attachment dropped");
                },
            }
        }
        for sticker in &payload.stickers {
            builder = builder.add_sticker_id(StickerId::new(sticker.id));
        }

        let sent = channel_id
            .send_message(&session.http, builder)
            .await
            .map_err(|e| Error::external("send message", e))?;
        debug!(dest = %endpoint, message_id = sent.id.get(), "copy sent");
        Ok(sent.id.get())
    }

    async fn fetch_message(
        &self,
        endpoint: Endpoint,
        message_id: MessageId,
    ) -> Result<Option<RelayPayload>> {
        let session = self.session(endpoint)?;
        let (_, channel_id) = Self::ids(endpoint)?;
        match channel_id.message(&session.http, message_id).await {
            Ok(msg) => Ok(Some(convert::payload_from_message(&msg))),
            Err(e) if convert::is_not_found(&e) => Ok(None),
            Err(e) => Err(Error::external("fetch message", e)),
        }
    }

    async fn edit_message(
        &self,
        endpoint: Endpoint,
        message_id: MessageId,
        payload: &RelayPayload,
    ) -> Result<()> {
        let session = self.session(endpoint)?;
        let (_, channel_id) = Self::ids(endpoint)?;
        channel_id
            .edit_message(
                &session.http,
                message_id,
                EditMessage::new().embed(convert::embed(payload)),
            )
            .await
            .map_err(|e| Self::classify(endpoint, message_id, "edit message", e))?;
        Ok(())
    }

    async fn delete_message(&self, endpoint: Endpoint, message_id: MessageId) -> Result<()> {
        let session = self.session(endpoint)?;
        let (_, channel_id) = Self::ids(endpoint)?;
        channel_id
            .delete_message(&session.http, message_id)
            .await
            .map_err(|e| Self::classify(endpoint, message_id, "delete message", e))
    }

    async fn send_notice(&self, endpoint: Endpoint, text: &str) -> Result<()> {
        let session = self.session(endpoint)?;
        let (_, channel_id) = Self::ids(endpoint)?;
        channel_id
            .say(&session.http, text)
            .await
            .map_err(|e| Error::external("send notice", e))?;
        Ok(())
    }
}
