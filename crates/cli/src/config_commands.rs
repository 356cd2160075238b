use std::path::Path;

use {
    anyhow::Result,
    clap::Subcommand,
    crossover_config::{CrossoverConfig, Severity, validate},
    secrecy::Secret,
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration as TOML (token redacted).
    Show,
}

pub fn handle_config(
    action: ConfigAction,
    config: &CrossoverConfig,
    path: Option<&Path>,
) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(config, path, verbose),
        ConfigAction::Show => show(config),
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config: &CrossoverConfig, path: Option<&Path>, verbose: bool) -> Result<()> {
    match path {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let result = validate(config);
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn show(config: &CrossoverConfig) -> Result<()> {
    print!("{}", render_redacted(config)?);
    Ok(())
}

fn render_redacted(config: &CrossoverConfig) -> Result<String> {
    let mut redacted = config.clone();
    if redacted.discord.has_token() {
        redacted.discord.token = Secret::new("[REDACTED]".into());
    }
    redacted.database.url = Some(redacted.database.resolved_url());
    Ok(toml::to_string_pretty(&redacted)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn show_never_prints_the_token() {
        let mut config = CrossoverConfig::default();
        config.discord.token = Secret::new("super-secret-token".into());
        config.database.url = Some("sqlite::memory:".into());

        let out = render_redacted(&config).unwrap();
        assert!(!out.contains("super-secret-token"));
        assert!(out.contains("[REDACTED]"));
        assert!(out.contains("sqlite::memory:"));
        assert!(out.contains("warm_cache_on_start"));
    }
}
