//! Platform collaborator contract for the relay.
//!
//! A chat platform adapter (Discord today) turns gateway callbacks into typed
//! [`RelayEvent`]s and implements [`RelayPlatform`] so the relay core can
//! deliver, fetch, edit, and delete copies without knowing the platform API.

pub mod error;
pub mod event;
pub mod gating;
pub mod payload;
pub mod platform;

pub use {
    error::{Error, Result},
    event::{Author, CreatedMessage, DeletedMessage, EditedMessage, RelayEvent},
    gating::{Permissions, is_permitted},
    payload::{Attachment, Attribution, RelayPayload, Sticker},
    platform::{EndpointInfo, RelayPlatform},
};
