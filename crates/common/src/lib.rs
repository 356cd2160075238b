//! Shared types, error definitions, and utilities used across all crossover crates.

pub mod error;
pub mod types;

pub use {
    error::{Error, Result},
    types::{ChannelId, Endpoint, GuildId, MessageId, UserId},
};
