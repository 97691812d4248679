//! Layered settings and path helpers.
//!
//! Uses Figment to merge built-in defaults, `gendex.toml`,
//! `gendex.<env>.toml` and `GENDEX_*` env vars (`__` separates nesting,
//! e.g. `GENDEX_ROTATION__LOCK_TIMEOUT_MS=5000`).
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::descriptor::RotationOptions;
use crate::error::{Error, Result};
use crate::generation::GenerationMarkers;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    pub memory_budget_bytes: usize,
    /// Analyzed tokens kept per field value; 0 means unlimited.
    pub field_length_limit: usize,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self { memory_budget_bytes: 50_000_000, field_length_limit: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    pub lock_timeout_ms: u64,
    pub lock_poll_interval_ms: u64,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self { lock_timeout_ms: 30_000, lock_poll_interval_ms: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub path: String,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "~/.gendex/telemetry.jsonl".to_string(),
            queue_capacity: 1024,
            batch_size: 64,
            flush_interval_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub writer: WriterSettings,
    pub rotation: RotationSettings,
    pub telemetry: TelemetrySettings,
    pub engine: GenerationMarkers,
}

impl Settings {
    pub fn rotation_options(&self) -> RotationOptions {
        RotationOptions {
            lock_timeout: Duration::from_millis(self.rotation.lock_timeout_ms),
            lock_poll_interval: Duration::from_millis(self.rotation.lock_poll_interval_ms.max(1)),
            markers: self.engine.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.writer.memory_budget_bytes < 15_000_000 {
            return Err(Error::Config(format!(
                "writer.memory_budget_bytes must be at least 15000000, got {}",
                self.writer.memory_budget_bytes
            )));
        }
        if self.telemetry.queue_capacity == 0 || self.telemetry.batch_size == 0 {
            return Err(Error::Config("telemetry queue_capacity and batch_size must be positive".to_string()));
        }
        if self.engine.marker_files.is_empty() || self.engine.segment_extensions.is_empty() {
            return Err(Error::Config("engine marker_files and segment_extensions must not be empty".to_string()));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Reads `gendex.toml` and `gendex.<env_name>.toml` from `dir`.
    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(dir.join("gendex.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("gendex.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("gendex.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("gendex.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("GENDEX_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment.extract().map_err(|e| Error::Config(e.to_string()))
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Config(format!("failed to get '{key}': {e}")))
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
