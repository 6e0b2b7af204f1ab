//! Configuration loading and persistence.
//!
//! Settings live in `config.json` in the platform config directory, with
//! environment variable overrides. The client secret is never written to
//! disk; it only comes from the environment.

use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::PathBuf};

use crate::constants::{DEFAULT_MAX_CONCURRENT_REQUESTS, HTTP_CONNECT_TIMEOUT, HTTP_REQUEST_TIMEOUT};
use crate::error::{ConduitError, Result};

/// Configuration for conduit management.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Application client id.
    pub client_id: String,
    /// Application client secret - NOT serialized to disk.
    #[serde(skip)]
    pub client_secret: String,
    /// Base URL of the API, e.g. `https://api.twitch.tv/helix`.
    pub api_base_url: String,
    /// Client-credentials token endpoint.
    pub token_url: String,
    /// Token validation endpoint.
    pub validate_url: String,
    /// Base URL shard callbacks are built from; the shard secret is appended.
    pub callback_base_url: String,
    /// Overall request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum in-flight requests during bulk subscription operations.
    pub max_concurrent_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            api_base_url: "https://api.twitch.tv/helix".to_string(),
            token_url: "https://id.twitch.tv/oauth2/token".to_string(),
            validate_url: "https://id.twitch.tv/oauth2/validate".to_string(),
            callback_base_url: String::new(),
            request_timeout_secs: HTTP_REQUEST_TIMEOUT.as_secs(),
            connect_timeout_secs: HTTP_CONNECT_TIMEOUT.as_secs(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `CONDUITS_CONFIG_DIR` env var: explicit override
    /// 2. Default: platform config dir (e.g. `~/.config/eventsub-conduits`)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("CONDUITS_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| ConduitError::Config("could not determine config directory".into()))?
                .join("eventsub-conduits")
        };
        fs::create_dir_all(&dir)
            .map_err(|e| ConduitError::Config(format!("{}: {e}", dir.display())))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|e| {
            log::debug!("Using default configuration: {e}");
            Self::default()
        });
        config.apply_env_overrides();
        config.normalize();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if !config_path.exists() {
            return Err(ConduitError::Config("config file not found".into()));
        }
        let content = fs::read_to_string(&config_path)
            .map_err(|e| ConduitError::Config(format!("{}: {e}", config_path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(client_id) = std::env::var("CONDUITS_CLIENT_ID") {
            self.client_id = client_id;
        }

        if let Ok(client_secret) = std::env::var("CONDUITS_CLIENT_SECRET") {
            self.client_secret = client_secret;
        }

        if let Ok(api_base_url) = std::env::var("CONDUITS_API_URL") {
            self.api_base_url = api_base_url;
        }

        if let Ok(token_url) = std::env::var("CONDUITS_TOKEN_URL") {
            self.token_url = token_url;
        }

        if let Ok(validate_url) = std::env::var("CONDUITS_VALIDATE_URL") {
            self.validate_url = validate_url;
        }

        if let Ok(callback_base_url) = std::env::var("CONDUITS_CALLBACK_URL") {
            self.callback_base_url = callback_base_url;
        }

        if let Ok(max) = std::env::var("CONDUITS_MAX_CONCURRENCY") {
            if let Ok(max) = max.parse::<usize>() {
                self.max_concurrent_requests = max;
            }
        }
    }

    /// Ensures the callback base ends with `/` so `base + secret` is a path
    /// segment, and that the fan-out bound is at least one.
    pub fn normalize(&mut self) {
        if !self.callback_base_url.is_empty() && !self.callback_base_url.ends_with('/') {
            self.callback_base_url.push('/');
        }
        self.max_concurrent_requests = self.max_concurrent_requests.max(1);
    }

    /// Checks that everything needed to talk to the service is present.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(ConduitError::Config("client_id is not set".into()));
        }
        if self.client_secret.is_empty() {
            return Err(ConduitError::Config(
                "client secret is not set (CONDUITS_CLIENT_SECRET)".into(),
            ));
        }
        if self.callback_base_url.is_empty() {
            return Err(ConduitError::Config("callback_base_url is not set".into()));
        }
        Ok(())
    }

    /// Overall request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connection establishment timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Persists the current configuration to disk.
    /// Note: the client secret is NOT saved.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .map_err(|e| ConduitError::Config(format!("{}: {e}", config_path.display())))?;

        // Owner read/write only
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))
            .map_err(|e| ConduitError::Config(format!("{}: {e}", config_path.display())))?;

        Ok(())
    }
}
