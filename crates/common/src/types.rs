use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Platform snowflake of a guild (server).
pub type GuildId = u64;
/// Platform snowflake of a text channel or thread.
pub type ChannelId = u64;
/// Platform snowflake of a single message.
pub type MessageId = u64;
/// Platform snowflake of a user account.
pub type UserId = u64;

/// A `(guild, channel)` pair taking part in relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

impl Endpoint {
    #[must_use]
    pub const fn new(guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            channel_id,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.guild_id, self.channel_id)
    }
}

/// Parses the `guild:channel` form produced by `Display`.
impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (guild, channel) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidEndpoint(format!("expected guild:channel, got {s:?}")))?;
        let guild_id = guild
            .trim()
            .parse()
            .map_err(|e| Error::InvalidEndpoint(format!("guild id {guild:?}: {e}")))?;
        let channel_id = channel
            .trim()
            .parse()
            .map_err(|e| Error::InvalidEndpoint(format!("channel id {channel:?}: {e}")))?;
        Ok(Self::new(guild_id, channel_id))
    }
}

/// Milliseconds since the Unix epoch, saturating to zero on clock skew.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display_parses_back() {
        let ep = Endpoint::new(1234, 5678);
        assert_eq!(ep.to_string(), "1234:5678");
        assert_eq!("1234:5678".parse::<Endpoint>().unwrap(), ep);
    }

    #[test]
    fn endpoint_parse_rejects_garbage() {
        assert!("1234".parse::<Endpoint>().is_err());
        assert!("abc:1".parse::<Endpoint>().is_err());
        assert!("1:".parse::<Endpoint>().is_err());
    }

    #[test]
    fn endpoint_equality_is_by_value() {
        assert_eq!(Endpoint::new(1, 2), Endpoint::new(1, 2));
        assert_ne!(Endpoint::new(1, 2), Endpoint::new(2, 1));
    }

    #[test]
    fn endpoint_serializes_as_struct() {
        let json = serde_json::to_string(&Endpoint::new(7, 8)).unwrap();
        assert_eq!(json, r#"{"guild_id":7,"channel_id":8}"#);
    }
}
