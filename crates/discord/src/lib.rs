//! Discord adapter for crossover.
//!
//! Turns serenity gateway callbacks into typed relay events and implements
//! the relay's outbound platform contract over the Discord REST API.

pub mod bot;
pub mod convert;
pub mod error;
pub mod handler;
pub mod platform;
pub mod state;

pub use {
    bot::start,
    error::{Error, Result},
    handler::CrossoverHandler,
    platform::DiscordPlatform,
    state::SessionState,
};
