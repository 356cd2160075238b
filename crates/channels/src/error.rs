use std::error::Error as StdError;

use crossover_common::{Endpoint, MessageId};

/// Crate-wide result type for platform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed platform errors shared by every adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The message no longer exists on the platform.
    #[error("message {message_id} not found in {endpoint}")]
    NotFound {
        endpoint: Endpoint,
        message_id: MessageId,
    },

    /// The guild or channel is not visible to the current session.
    #[error("endpoint {endpoint} is unreachable")]
    Unreachable { endpoint: Endpoint },

    /// Input payload or parameter is invalid.
    #[error("invalid platform input: {message}")]
    InvalidInput { message: String },

    /// Wrapped source error from the platform client.
    #[error("platform operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn not_found(endpoint: Endpoint, message_id: MessageId) -> Self {
        Self::NotFound {
            endpoint,
            message_id,
        }
    }

    #[must_use]
    pub fn unreachable(endpoint: Endpoint) -> Self {
        Self::Unreachable { endpoint }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// `true` when the target message is already gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
