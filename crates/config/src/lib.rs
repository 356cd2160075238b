//! Configuration loading, validation, and env substitution.
//!
//! Config files: `crossover.toml`, `crossover.yaml`, or `crossover.json`
//! Searched in `./` then `~/.config/crossover/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, load_config,
        set_data_dir,
    },
    schema::{CrossoverConfig, DatabaseConfig, DiscordConfig, RelayConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
