//! Configuration loading, env substitution, and validation.
//!
//! Config files: `tgrelay.toml`, `tgrelay.yaml`/`tgrelay.yml`, or `tgrelay.json`.
//! Searched in `./` then `~/.config/tgrelay/`, unless a path is given.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw file.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, default_config_path, discover_and_load, find_config_file, load_config},
    schema::{
        DEFAULT_SYSTEM_PROMPT, FormatterKind, MemoryConfig, OrderingMode, OutboundConfig, ProviderConfig,
        RateLimitConfig, RelayConfig, ServerToolConfig, TelegramConfig, WorkerConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
