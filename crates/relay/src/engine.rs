//! Relay engine: fans inbound messages out along an endpoint's connections
//! and keeps the copies in sync on edit and delete.
//!
//! Each handler is independent. Per-target failures are collected into a
//! [`FanOutReport`] and never abort sibling targets; only a store failure on
//! the initial lookup fails the handler.

use std::sync::Arc;

use {
    crossover_channels::{
        Attribution, CreatedMessage, DeletedMessage, EditedMessage, EndpointInfo, RelayEvent,
        RelayPayload, RelayPlatform,
    },
    crossover_common::{Endpoint, MessageId},
    crossover_config::CrossoverConfig,
    futures::future::join_all,
    tokio::sync::mpsc,
    tracing::{debug, error, info, warn},
};

use crate::{
    cache::MembershipCache,
    error::{Error, Result},
    model::{Connection, MappedClone, MessageMapping},
    store::TopologyStore,
};

/// Engine knobs, usually taken from [`CrossoverConfig`].
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub command_prefixes: Vec<String>,
    pub accent_colour: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config(&CrossoverConfig::default())
    }
}

impl RelaySettings {
    pub fn from_config(config: &CrossoverConfig) -> Self {
        Self {
            command_prefixes: config.discord.command_prefixes.clone(),
            accent_colour: config.discord.accent_colour,
        }
    }

    fn is_command(&self, content: &str) -> bool {
        self.command_prefixes
            .iter()
            .any(|p| !p.is_empty() && content.starts_with(p.as_str()))
    }
}

/// Why an event produced no outbound work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Written, edited, or removed by the relay itself.
    OwnMessage,
    EmptyContent,
    Command,
    /// The source endpoint is not marked as participating in any room.
    NotCached,
}

/// A copy that was delivered, updated, or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: Endpoint,
    pub message_id: MessageId,
}

#[derive(Debug)]
pub struct TargetFailure {
    pub target: Endpoint,
    pub error: Error,
}

/// Per-target results of one handler run.
#[derive(Debug, Default)]
pub struct FanOutReport {
    pub delivered: Vec<Delivery>,
    pub failed: Vec<TargetFailure>,
}

impl FanOutReport {
    fn push(&mut self, target: Endpoint, result: Result<MessageId>) {
        match result {
            Ok(message_id) => self.delivered.push(Delivery { target, message_id }),
            Err(error) => self.failed.push(TargetFailure { target, error }),
        }
    }

    fn merge(&mut self, other: Self) {
        self.delivered.extend(other.delivered);
        self.failed.extend(other.failed);
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug)]
pub enum Outcome {
    Skipped(Skip),
    Completed(FanOutReport),
}

impl Outcome {
    /// The report, or `None` when the event was skipped.
    pub fn report(&self) -> Option<&FanOutReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped(_) => None,
        }
    }
}

pub struct RelayEngine {
    store: Arc<dyn TopologyStore>,
    cache: Arc<MembershipCache>,
    platform: Arc<dyn RelayPlatform>,
    settings: RelaySettings,
}

impl RelayEngine {
    pub fn new(
        store: Arc<dyn TopologyStore>,
        cache: Arc<MembershipCache>,
        platform: Arc<dyn RelayPlatform>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            store,
            cache,
            platform,
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Consume events one at a time until every sender is dropped.
    pub async fn run(&self, mut events: mpsc::Receiver<RelayEvent>) {
        info!("relay engine started");
        while let Some(event) = events.recv().await {
            let kind = event.kind();
            match self.handle(event).await {
                Ok(Outcome::Skipped(reason)) => {
                    debug!(event = kind, ?reason, "event skipped");
                },
                Ok(Outcome::Completed(report)) => {
                    debug!(
                        event = kind,
                        delivered = report.delivered.len(),
                        failed = report.failed.len(),
                        "event processed"
                    );
                },
                Err(e) => {
                    error!(event = kind, error = %e, "event handler failed, event left unprocessed");
                },
            }
        }
        info!("relay engine stopped");
    }

    pub async fn handle(&self, event: RelayEvent) -> Result<Outcome> {
        match event {
            RelayEvent::MessageCreated(msg) => self.on_created(&msg).await,
            RelayEvent::MessageEdited(msg) => self.on_edited(&msg).await,
            RelayEvent::MessageDeleted(msg) => self.on_deleted(&msg).await,
            RelayEvent::BulkMessageDeleted(messages) => Ok(Outcome::Completed(
                self.on_bulk_deleted(&messages).await,
            )),
        }
    }

    pub async fn on_created(&self, msg: &CreatedMessage) -> Result<Outcome> {
        if self.is_self(Some(msg.author.id)) {
            return Ok(Outcome::Skipped(Skip::OwnMessage));
        }
        if msg.content.is_empty() {
            return Ok(Outcome::Skipped(Skip::EmptyContent));
        }
        if self.settings.is_command(&msg.content) {
            return Ok(Outcome::Skipped(Skip::Command));
        }
        if !self.cache.has(msg.endpoint) {
            return Ok(Outcome::Skipped(Skip::NotCached));
        }

        let connections = self.store.connections_from(msg.endpoint).await?;
        if connections.is_empty() {
            debug!(source = %msg.endpoint, "cache hit without connections");
            return Ok(Outcome::Completed(FanOutReport::default()));
        }

        let origin = self.platform.resolve_endpoint(msg.endpoint).await;
        let payload = self.build_payload(msg, origin.as_ref());

        let results = join_all(
            connections
                .iter()
                .map(|conn| self.deliver(conn, msg.message_id, &payload)),
        )
        .await;

        let mut report = FanOutReport::default();
        for (conn, result) in connections.iter().zip(results) {
            if let Err(e) = &result {
                warn!(
                    source = %conn.source,
                    dest = %conn.target,
                    message_id = msg.message_id,
                    error = %e,
                    "relay to target failed"
                );
            }
            report.push(conn.target, result);
        }
        debug!(
            source = %msg.endpoint,
            message_id = msg.message_id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "message relayed"
        );
        Ok(Outcome::Completed(report))
    }

    pub async fn on_edited(&self, msg: &EditedMessage) -> Result<Outcome> {
        if self.is_self(msg.editor_id) {
            return Ok(Outcome::Skipped(Skip::OwnMessage));
        }
        if msg.content.is_empty() {
            return Ok(Outcome::Skipped(Skip::EmptyContent));
        }

        let clones = self.lookup_clones(msg.endpoint, msg.message_id).await?;
        let results = join_all(
            clones
                .iter()
                .map(|clone| self.update_clone(clone, &msg.content)),
        )
        .await;

        Ok(Outcome::Completed(collect(&clones, results, "edit")))
    }

    pub async fn on_deleted(&self, msg: &DeletedMessage) -> Result<Outcome> {
        if self.is_self(msg.author_id) {
            return Ok(Outcome::Skipped(Skip::OwnMessage));
        }

        let clones = self.lookup_clones(msg.endpoint, msg.message_id).await?;
        let results = join_all(clones.iter().map(|clone| self.remove_clone(clone))).await;

        Ok(Outcome::Completed(collect(&clones, results, "delete")))
    }

    /// Each message is deleted on its own. A store failure leaves only that
    /// message unprocessed; its siblings still have their copies removed.
    pub async fn on_bulk_deleted(&self, messages: &[DeletedMessage]) -> FanOutReport {
        let mut report = FanOutReport::default();
        for msg in messages {
            match self.on_deleted(msg).await {
                Ok(Outcome::Completed(r)) => report.merge(r),
                Ok(Outcome::Skipped(_)) => {},
                Err(e) => {
                    error!(
                        source = %msg.endpoint,
                        message_id = msg.message_id,
                        error = %e,
                        "bulk delete entry left unprocessed"
                    );
                },
            }
        }
        report
    }

    fn is_self(&self, actor: Option<u64>) -> bool {
        matches!((actor, self.platform.self_id()), (Some(a), Some(me)) if a == me)
    }

    /// Attribution header plus the message body.
    pub fn build_payload(&self, msg: &CreatedMessage, origin: Option<&EndpointInfo>) -> RelayPayload {
        let footer = match origin {
            Some(info) => Attribution::footer_for(&info.guild_name, &info.channel_name),
            None => Attribution::footer_for(
                &msg.endpoint.guild_id.to_string(),
                &msg.endpoint.channel_id.to_string(),
            ),
        };
        RelayPayload {
            attribution: Attribution {
                author_line: Attribution::author_line_for(&msg.author.display_name),
                author_icon_url: msg.author.avatar_url.clone(),
                footer,
                footer_icon_url: origin.and_then(|info| info.guild_icon_url.clone()),
                colour: self.settings.accent_colour,
            },
            content: msg.content.clone(),
            attachments: msg.attachments.clone(),
            stickers: msg.stickers.clone(),
        }
    }

    async fn deliver(
        &self,
        conn: &Connection,
        origin_message_id: MessageId,
        payload: &RelayPayload,
    ) -> Result<MessageId> {
        if self.platform.resolve_endpoint(conn.target).await.is_none() {
            return Err(Error::UnreachableTarget {
                endpoint: conn.target,
            });
        }

        self.cache.mark(conn.source);

        let cloned_message_id = self
            .platform
            .send_message(conn.target, payload)
            .await
            .map_err(|e| Error::delivery(conn.target, e))?;

        self.store
            .insert_mapping(&MessageMapping {
                connection_id: conn.id,
                origin_message_id,
                cloned_message_id,
            })
            .await?;

        Ok(cloned_message_id)
    }

    /// Clones of an origin message. Events are handled in arrival order, so
    /// a create has written its mappings before a later edit or delete
    /// looks them up; an empty answer means nothing was relayed.
    async fn lookup_clones(
        &self,
        source: Endpoint,
        origin_message_id: MessageId,
    ) -> Result<Vec<MappedClone>> {
        let clones = self.store.find_clones(source, origin_message_id).await?;
        if clones.is_empty() {
            debug!(source = %source, message_id = origin_message_id, "no copies to sync");
        }
        Ok(clones)
    }

    async fn update_clone(&self, clone: &MappedClone, content: &str) -> Result<MessageId> {
        let target = clone.connection.target;
        let id = clone.cloned_message_id;
        let gone = || Error::MappingNotFound {
            endpoint: target,
            cloned_message_id: id,
        };

        let current = match self.platform.fetch_message(target, id).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Err(gone()),
            Err(e) if e.is_not_found() => return Err(gone()),
            Err(e) => return Err(Error::delivery(target, e)),
        };

        match self
            .platform
            .edit_message(target, id, &current.with_content(content))
            .await
        {
            Ok(()) => Ok(id),
            Err(e) if e.is_not_found() => Err(gone()),
            Err(e) => Err(Error::delivery(target, e)),
        }
    }

    async fn remove_clone(&self, clone: &MappedClone) -> Result<MessageId> {
        let target = clone.connection.target;
        let id = clone.cloned_message_id;
        match self.platform.delete_message(target, id).await {
            Ok(()) => Ok(id),
            Err(e) if e.is_not_found() => {
                debug!(dest = %target, message_id = id, "copy already gone");
                Ok(id)
            },
            Err(e) => Err(Error::delivery(target, e)),
        }
    }
}

fn collect(clones: &[MappedClone], results: Vec<Result<MessageId>>, action: &str) -> FanOutReport {
    let mut report = FanOutReport::default();
    for (clone, result) in clones.iter().zip(results) {
        match &result {
            Err(e @ Error::MappingNotFound { .. }) => {
                debug!(dest = %clone.connection.target, action, error = %e, "skipping diverged copy");
            },
            Err(e) => {
                warn!(dest = %clone.connection.target, action, error = %e, "sync of copy failed");
            },
            Ok(_) => {},
        }
        report.push(clone.connection.target, result);
    }
    report
}
