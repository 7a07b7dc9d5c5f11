//! Board configuration loaded with figment.
//!
//! Precedence: built-in defaults -> optional config file -> environment.
//! Environment variables use the `SPRINT_BOARD_` prefix, with `__` separating
//! nested keys (`SPRINT_BOARD_DEFAULT_FILTER__OWNER=alice`).

use crate::error::{BoardError, Result};
use crate::filter::{FilterCriteria, FilterInput};
use crate::guard::LockPolicy;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SPRINT_BOARD_";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// How long a pending move may wait for confirmation
    pub lock_ttl_ms: u64,
    /// Re-sends allowed after the first attempt expires
    pub max_retries: u32,
    /// How often the runtime checks lock deadlines
    pub tick_interval_ms: u64,
    /// Filter applied before the UI supplies one
    pub default_filter: FilterInput,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            lock_ttl_ms: 10_000,
            max_retries: 2,
            tick_interval_ms: 500,
            default_filter: FilterInput::default(),
        }
    }
}

impl BoardConfig {
    /// The provider stack, exposed so callers can merge their own layers
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            if !path.is_file() {
                return Err(BoardError::invalid_config(
                    "path",
                    format!("configuration file not found: {}", path.display()),
                ));
            }
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            figment = match extension.as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                other => {
                    return Err(BoardError::invalid_config(
                        "path",
                        format!("unsupported configuration format: {}", other.unwrap_or("none")),
                    ))
                }
            };
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)?.extract()?;
        config.validate()?;
        tracing::debug!(?config, "board configuration loaded");
        Ok(config)
    }

    /// Load from defaults and the environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock_ttl_ms == 0 {
            return Err(BoardError::invalid_config("lock_ttl_ms", "must be greater than zero"));
        }
        if self.tick_interval_ms == 0 {
            return Err(BoardError::invalid_config(
                "tick_interval_ms",
                "must be greater than zero",
            ));
        }
        FilterCriteria::parse(&self.default_filter)?;
        Ok(())
    }

    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            ttl: Duration::from_millis(self.lock_ttl_ms),
            max_retries: self.max_retries,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The default filter; invalid fields fall back to "all"
    pub fn filter(&self) -> FilterCriteria {
        FilterCriteria::parse_lenient(&self.default_filter)
    }
}
