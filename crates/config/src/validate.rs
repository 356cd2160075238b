//! Semantic validation of a loaded configuration.
//!
//! Parsing already rejects malformed files; this pass reports values that
//! parse fine but would make the relay misbehave at runtime.

use crate::schema::CrossoverConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "discord.token"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a loaded configuration.
pub fn validate(config: &CrossoverConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.discord.has_token() {
        result.push(
            Severity::Error,
            "discord.token",
            "bot token is empty (set it in the config file or CROSSOVER_DISCORD_TOKEN)",
        );
    }

    if config.discord.command_prefixes.is_empty() {
        result.push(
            Severity::Error,
            "discord.command_prefixes",
            "at least one command prefix is required",
        );
    }
    for (i, prefix) in config.discord.command_prefixes.iter().enumerate() {
        if prefix.trim().is_empty() {
            result.push(
                Severity::Error,
                &format!("discord.command_prefixes[{i}]"),
                "blank prefix would turn every message into a command",
            );
        }
    }

    if config.discord.accent_colour > 0x00FF_FFFF {
        result.push(
            Severity::Warning,
            "discord.accent_colour",
            "colour exceeds 0xFFFFFF and will be truncated",
        );
    }

    if config.database.max_connections == 0 {
        result.push(
            Severity::Error,
            "database.max_connections",
            "must be greater than zero",
        );
    }
    if let Some(url) = &config.database.url
        && !url.starts_with("sqlite:")
    {
        result.push(
            Severity::Error,
            "database.url",
            format!("only sqlite URLs are supported, got {url:?}"),
        );
    }

    if !config.relay.warm_cache_on_start {
        result.push(
            Severity::Info,
            "relay.warm_cache_on_start",
            "stored links stay idle until a connect command runs after restart",
        );
    }

    result
}
