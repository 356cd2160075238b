//! Cross-channel relay core.
//!
//! Rooms are rendezvous codes owned by one `(guild, channel)` endpoint.
//! Connecting to a room writes a reciprocal pair of directed connections;
//! the [`engine::RelayEngine`] fans every inbound message out along them and
//! keeps edits and deletions of the copies in sync through persisted
//! origin → clone mappings.

pub mod cache;
pub mod code;
pub mod commands;
pub mod engine;
pub mod error;
pub mod manager;
pub mod model;
pub mod store;

pub use {
    cache::MembershipCache,
    commands::{
        CommandContext, CommandReply, CommandSurface, CrossoverCommand, ListedLink, parse_command,
        reply_text,
    },
    engine::{Delivery, FanOutReport, Outcome, RelayEngine, RelaySettings, Skip, TargetFailure},
    error::{Error, Result},
    manager::{Linked, RoomManager, Unlinked},
    model::{Connection, MappedClone, MessageMapping, Room, RoomLink},
    store::{InMemoryTopologyStore, SqliteTopologyStore, TopologyStore},
};

/// Run database migrations for the topology tables.
///
/// Creates `rooms`, `connections`, and `message_mappings`. Call once at
/// startup, right after opening the pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
