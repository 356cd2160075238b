//! Config schema types (discord, database, relay).

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Orange used by the relay's attribution header unless configured otherwise.
pub const DEFAULT_ACCENT_COLOUR: u32 = 0x00E6_7E22;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    pub discord: DiscordConfig,
    pub database: DatabaseConfig,
    pub relay: RelayConfig,
}

/// Discord bot account settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token from the developer portal.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Text prefixes that mark a message as a bot command. Messages starting
    /// with any of them are never relayed.
    pub command_prefixes: Vec<String>,

    /// Embed colour of relayed copies (`0xRRGGBB`).
    pub accent_colour: u32,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[REDACTED]")
            .field("command_prefixes", &self.command_prefixes)
            .field("accent_colour", &format_args!("{:#08x}", self.accent_colour))
            .finish()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            command_prefixes: vec!["!".into()],
            accent_colour: DEFAULT_ACCENT_COLOUR,
        }
    }
}

impl DiscordConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Topology database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL. `None` means `<data_dir>/crossover.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL, falling back to the database file in the data dir.
    #[must_use]
    pub fn resolved_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite:{}?mode=rwc",
                crate::loader::data_dir().join("crossover.db").display()
            ),
        }
    }
}

/// Relay engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Mark every endpoint with persisted connections when the engine starts.
    pub warm_cache_on_start: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            warm_cache_on_start: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = CrossoverConfig::default();
        assert_eq!(cfg.discord.command_prefixes, vec!["!"]);
        assert_eq!(cfg.discord.accent_colour, DEFAULT_ACCENT_COLOUR);
        assert!(!cfg.discord.has_token());
        assert_eq!(cfg.database.max_connections, 5);
        assert!(cfg.relay.warm_cache_on_start);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let raw = r#"
            [discord]
            token = "abc"
            command_prefixes = ["!", "n."]

            [relay]
            warm_cache_on_start = false
        "#;
        let cfg: CrossoverConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.discord.token.expose_secret(), "abc");
        assert_eq!(cfg.discord.command_prefixes, vec!["!", "n."]);
        assert!(!cfg.relay.warm_cache_on_start);
        assert_eq!(cfg.database.max_connections, 5);
        assert!(cfg.database.url.is_none());
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = DiscordConfig {
            token: Secret::new("super-secret".into()),
            ..Default::default()
        };
        let dbg = format!("{cfg:?}");
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("super-secret"));
    }

    #[test]
    fn explicit_database_url_wins() {
        let db = DatabaseConfig {
            url: Some("sqlite::memory:".into()),
            ..Default::default()
        };
        assert_eq!(db.resolved_url(), "sqlite::memory:");
    }
}
