use {
    crossover_common::{Endpoint, MessageId},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    // ── Topology (user facing, abort the command) ───────────────────────────
    #[error("room {code} does not exist")]
    RoomNotFound { code: String },

    #[error("cannot connect {endpoint} to itself")]
    SelfConnection { endpoint: Endpoint },

    #[error("{this} and {that} are already connected")]
    AlreadyConnected { this: Endpoint, that: Endpoint },

    #[error("{endpoint} is not connected through room {code}")]
    NotConnected { code: String, endpoint: Endpoint },

    // ── Fan-out (per target, logged and skipped) ────────────────────────────
    #[error("target {endpoint} is unreachable")]
    UnreachableTarget { endpoint: Endpoint },

    #[error("delivery to {endpoint} failed: {source}")]
    DeliveryFailure {
        endpoint: Endpoint,
        #[source]
        source: crossover_channels::Error,
    },

    #[error("relayed copy {cloned_message_id} is gone from {endpoint}")]
    MappingNotFound {
        endpoint: Endpoint,
        cloned_message_id: MessageId,
    },

    // ── Store ───────────────────────────────────────────────────────────────
    #[error("room code {code} is already taken")]
    RoomCodeTaken { code: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Channel(#[from] crossover_channels::Error),

    #[error("{message}")]
    Store { message: String },
}

impl Error {
    #[must_use]
    pub fn room_not_found(code: impl Into<String>) -> Self {
        Self::RoomNotFound { code: code.into() }
    }

    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn delivery(endpoint: Endpoint, source: crossover_channels::Error) -> Self {
        Self::DeliveryFailure { endpoint, source }
    }

    /// Errors a command caller sees as a plain reply rather than a failure.
    #[must_use]
    pub fn is_topology(&self) -> bool {
        matches!(
            self,
            Self::RoomNotFound { .. }
                | Self::SelfConnection { .. }
                | Self::AlreadyConnected { .. }
                | Self::NotConnected { .. }
        )
    }

    /// Errors that only affect one fan-out target.
    #[must_use]
    pub fn is_per_target(&self) -> bool {
        matches!(
            self,
            Self::UnreachableTarget { .. }
                | Self::DeliveryFailure { .. }
                | Self::MappingNotFound { .. }
        )
    }

    /// Reply text for topology errors.
    #[must_use]
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::RoomNotFound { .. } => Some("Room code does not exist!"),
            Self::SelfConnection { .. } => Some("Don't connect to yourself!"),
            Self::AlreadyConnected { .. } => Some("Already connected!"),
            Self::NotConnected { .. } => Some("You are not connected to this room!"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_errors_have_replies() {
        let ep = Endpoint::new(1, 2);
        let errors = [
            Error::room_not_found("abc123"),
            Error::SelfConnection { endpoint: ep },
            Error::AlreadyConnected { this: ep, that: ep },
            Error::NotConnected {
                code: "abc123".into(),
                endpoint: ep,
            },
        ];
        for err in errors {
            assert!(err.is_topology());
            assert!(!err.is_per_target());
            assert!(err.user_message().is_some());
        }
    }

    #[test]
    fn fan_out_errors_are_per_target() {
        let ep = Endpoint::new(1, 2);
        let err = Error::delivery(ep, crossover_channels::Error::unreachable(ep));
        assert!(err.is_per_target());
        assert!(!err.is_topology());
        assert!(err.user_message().is_none());
        assert!(err.to_string().contains("1:2"));
    }

    #[test]
    fn store_errors_are_neither() {
        let err = Error::store("disk full");
        assert!(!err.is_topology());
        assert!(!err.is_per_target());
        assert_eq!(err.to_string(), "disk full");
    }
}
