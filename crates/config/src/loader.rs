use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::CrossoverConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "crossover.toml",
    "crossover.yaml",
    "crossover.yml",
    "crossover.json",
];

static DATA_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CrossoverConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./crossover.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/crossover/crossover.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `CrossoverConfig::default()` if no file is found or the file
/// fails to parse.
pub fn discover_and_load() -> (CrossoverConfig, Option<PathBuf>) {
    let path = find_config_file();
    let mut config = match &path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                CrossoverConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            CrossoverConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    (config, path)
}

/// Apply `CROSSOVER_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut CrossoverConfig) {
    apply_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_overrides_with(config: &mut CrossoverConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup("CROSSOVER_DISCORD_TOKEN").filter(|t| !t.trim().is_empty()) {
        config.discord.token = Secret::new(token);
    }
    if let Some(url) = lookup("CROSSOVER_DATABASE_URL").filter(|u| !u.trim().is_empty()) {
        config.database.url = Some(url);
    }
    if let Some(prefixes) = lookup("CROSSOVER_COMMAND_PREFIXES") {
        let parsed: Vec<String> = prefixes
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if !parsed.is_empty() {
            config.discord.command_prefixes = parsed;
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/crossover/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "crossover").map(|d| d.config_dir().to_path_buf())
}

/// Override the data directory (CLI `--data-dir`).
pub fn set_data_dir(dir: PathBuf) {
    let mut guard = DATA_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    *guard = Some(dir);
}

/// Directory holding the topology database.
pub fn data_dir() -> PathBuf {
    let guard = DATA_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    if let Some(dir) = guard.as_ref() {
        return dir.clone();
    }
    directories::ProjectDirs::from("", "", "crossover")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn parse_config(raw: &str, path: &Path) -> Result<CrossoverConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crossover.toml");
        std::fs::write(&path, "[discord]\ntoken = \"t0k\"\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.discord.token.expose_secret(), "t0k");
    }

    #[test]
    fn loads_yaml_and_json_files() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("crossover.yaml");
        std::fs::write(&yaml, "relay:\n  warm_cache_on_start: false\n").unwrap();
        assert!(!load_config(&yaml).unwrap().relay.warm_cache_on_start);

        let json = dir.path().join("crossover.json");
        std::fs::write(&json, r#"{"database": {"max_connections": 2}}"#).unwrap();
        assert_eq!(load_config(&json).unwrap().database.max_connections, 2);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crossover.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(Error::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = CrossoverConfig::default();
        apply_overrides_with(&mut cfg, |name| match name {
            "CROSSOVER_DISCORD_TOKEN" => Some("from-env".into()),
            "CROSSOVER_DATABASE_URL" => Some("sqlite::memory:".into()),
            "CROSSOVER_COMMAND_PREFIXES" => Some(" !, n. ,".into()),
            _ => None,
        });
        assert_eq!(cfg.discord.token.expose_secret(), "from-env");
        assert_eq!(cfg.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(cfg.discord.command_prefixes, vec!["!", "n."]);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = CrossoverConfig::default();
        apply_overrides_with(&mut cfg, |_| Some("   ".into()));
        assert!(!cfg.discord.has_token());
        assert!(cfg.database.url.is_none());
        assert_eq!(cfg.discord.command_prefixes, vec!["!"]);
    }
}
