//! Service configuration
//!
//! Everything has a default; environment variables (optionally loaded from
//! a `.env` file by the binary) override individual values.

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::cache::{CacheConfig, PreloadConfig};
use crate::registry::{IdentityRules, MarkupSelectors};
use crate::viewer::ViewerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout for attachment fetches
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Upper bound for a single engine operation
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub preload: PreloadConfig,
    pub fetch: FetchConfig,
    pub render: RenderConfig,
    pub identity: IdentityRules,
    pub markup: MarkupSelectors,
    pub viewer: ViewerConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        if let Some(host) = get("SERVER_HOST") {
            config.server.host = host;
        }
        set(&mut config.server.port, "SERVER_PORT", &get)?;

        set(&mut config.cache.max_entries, "CACHE_MAX_ENTRIES", &get)?;
        set(&mut config.cache.protect_radius, "CACHE_PROTECT_RADIUS", &get)?;

        set(&mut config.fetch.timeout_secs, "FETCH_TIMEOUT_SECS", &get)?;
        set(&mut config.render.timeout_secs, "RENDER_TIMEOUT_SECS", &get)?;

        set(&mut config.preload.success_delay_ms, "PRELOAD_SUCCESS_DELAY_MS", &get)?;
        set(&mut config.preload.failure_delay_ms, "PRELOAD_FAILURE_DELAY_MS", &get)?;
        set(&mut config.preload.radius, "PRELOAD_RADIUS", &get)?;

        if let Some(v) = get("HASH_PARAM") {
            config.identity.hash_param = v;
        }
        if let Some(v) = get("MODE_PARAM") {
            config.identity.mode_param = v;
        }
        if let Some(v) = get("THUMBNAIL_MODE") {
            config.identity.thumbnail_mode = v;
        }
        if let Some(v) = get("FULL_MODE") {
            config.identity.full_mode = v;
        }
        if let Some(v) = get("HOST_BASE_URL") {
            config.identity.base_url = Some(v);
        }

        if let Some(v) = get("MARKER_SELECTOR") {
            config.markup.container = v;
        }
        if let Some(v) = get("THUMBNAIL_SELECTOR") {
            config.markup.thumbnail = v;
        }
        if let Some(v) = get("LABEL_SELECTOR") {
            config.markup.label = v;
        }

        set(&mut config.viewer.search_debounce_ms, "SEARCH_DEBOUNCE_MS", &get)?;
        set(&mut config.viewer.rescan_interval_ms, "RESCAN_INTERVAL_MS", &get)?;
        set(&mut config.viewer.notice_timeout_secs, "NOTICE_TIMEOUT_SECS", &get)?;

        if config.cache.max_entries == 0 {
            return Err(ConfigError::Invalid {
                name: "CACHE_MAX_ENTRIES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(config)
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn set<T, G>(target: &mut T, name: &str, get: &G) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(name) {
        *target = raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: name.to_string(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}
