//! Discord event handler for serenity.
//!
//! Commands are answered inline; every other message event is converted to a
//! [`RelayEvent`] and queued for the relay engine.

use std::sync::Arc;

use {
    crossover_channels::{DeletedMessage, Permissions, RelayEvent},
    crossover_relay::{CommandContext, CommandSurface, reply_text},
    serenity::{
        all::{
            ChannelId, Context, EventHandler, GatewayIntents, GuildId, Message, MessageId,
            MessageUpdateEvent, Ready,
        },
        async_trait,
    },
    tokio::sync::mpsc,
    tracing::{debug, error, info, warn},
};

use crate::{
    convert,
    state::{Session, SessionState},
};

/// Handler for Discord gateway events.
pub struct CrossoverHandler {
    pub session: SessionState,
    pub surface: Arc<CommandSurface>,
    pub events: mpsc::Sender<RelayEvent>,
}

impl CrossoverHandler {
    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    async fn enqueue(&self, event: RelayEvent) {
        let kind = event.kind();
        if self.events.send(event).await.is_err() {
            warn!(event = kind, "relay engine gone, event dropped");
        }
    }

    fn deleted(
        &self,
        ctx: &Context,
        guild_id: Option<GuildId>,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Option<DeletedMessage> {
        let endpoint = convert::endpoint(guild_id, channel_id)?;
        let author_id = ctx
            .cache
            .message(channel_id, message_id)
            .map(|m| m.author.id.get());
        Some(DeletedMessage {
            endpoint,
            message_id: message_id.get(),
            author_id,
        })
    }
}

#[async_trait]
impl EventHandler for CrossoverHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
        self.session.set(Session {
            http: ctx.http.clone(),
            cache: ctx.cache.clone(),
            bot_user_id: ready.user.id.get(),
        });
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if self.session.bot_user_id() == Some(msg.author.id.get()) {
            return;
        }

        let command_ctx = CommandContext {
            endpoint: convert::endpoint(msg.guild_id, msg.channel_id),
            permissions: msg
                .author_permissions(&ctx.cache)
                .map_or(Permissions::NONE, convert::permissions),
        };
        if let Some(result) = self.surface.handle_message(command_ctx, &msg.content).await {
            if let Err(e) = &result {
                error!(channel_id = msg.channel_id.get(), error = %e, "crossover command failed");
            }
            if let Err(e) = msg.channel_id.say(&ctx.http, reply_text(&result)).await {
                warn!(channel_id = msg.channel_id.get(), error = %e, "failed to send command reply");
            }
            return;
        }

        if let Some(created) = convert::created(&msg) {
            self.enqueue(RelayEvent::MessageCreated(created)).await;
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        match convert::edited(&event) {
            Some(edited) => self.enqueue(RelayEvent::MessageEdited(edited)).await,
            None => debug!(message_id = event.id.get(), "update without content ignored"),
        }
    }

    async fn message_delete(
        &self,
        ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        guild_id: Option<GuildId>,
    ) {
        if let Some(deleted) = self.deleted(&ctx, guild_id, channel_id, deleted_message_id) {
            self.enqueue(RelayEvent::MessageDeleted(deleted)).await;
        }
    }

    async fn message_delete_bulk(
        &self,
        ctx: Context,
        channel_id: ChannelId,
        multiple_deleted_messages_ids: Vec<MessageId>,
        guild_id: Option<GuildId>,
    ) {
        let deleted: Vec<_> = multiple_deleted_messages_ids
            .into_iter()
            .filter_map(|id| self.deleted(&ctx, guild_id, channel_id, id))
            .collect();
        if !deleted.is_empty() {
            self.enqueue(RelayEvent::BulkMessageDeleted(deleted)).await;
        }
    }

    async fn cache_ready(&self, _ctx: Context, guilds: Vec<GuildId>) {
        debug!(guild_count = guilds.len(), "discord cache ready");
    }
}
