//! Application configuration.
//!
//! All settings live in a single `config.toml`, by default at
//! `$XDG_CONFIG_HOME/nextevent/config.toml`:
//!
//! ```toml
//! [oauth]
//! client_id = "env::NEXTEVENT_CLIENT_ID"
//! client_secret = "pass::work/nextevent"
//! tenant_id = "contoso.onmicrosoft.com"
//! port = 8000
//!
//! [credentials]
//! persist = true
//! storage_path = "/home/me/.local/share/nextevent"
//!
//! [polling]
//! interval_secs = 60
//! status_file = "/run/user/1000/nextevent"
//! ```
//!
//! Files written for the older layout (`[OauthConfig]` with `ClientID`,
//! `ServerPort`, ...) are read as well.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nextevent_auth::{CredentialsConfig, OAuthConfig, SupervisorConfig};
use nextevent_server::PollerConfig;

use crate::error::{ClientError, ClientResult};
use crate::secret;

/// Longest calendar window a poll may request (one year).
pub const MAX_LOOKAHEAD_HOURS: u64 = 366 * 24;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(alias = "OauthConfig")]
    pub oauth: OAuthSettings,

    #[serde(alias = "CredentialsConfig")]
    pub credentials: CredentialSettings,

    pub polling: PollingSettings,

    pub refresh: RefreshSettings,
}

/// `[oauth]`: application registration and the local callback server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Supports `env::` and `pass::` references.
    #[serde(alias = "ClientID")]
    pub client_id: String,

    /// Supports `env::` and `pass::` references.
    #[serde(alias = "ClientSecret")]
    pub client_secret: String,

    #[serde(alias = "TenantID")]
    pub tenant_id: String,

    #[serde(alias = "ServerProtocol")]
    pub protocol: String,

    #[serde(alias = "ServerHost")]
    pub host: String,

    #[serde(alias = "ServerPort")]
    pub port: u16,

    pub authority: String,

    pub scope: String,

    pub timeout_secs: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            tenant_id: String::new(),
            protocol: OAuthConfig::DEFAULT_PROTOCOL.to_string(),
            host: OAuthConfig::DEFAULT_HOST.to_string(),
            port: OAuthConfig::DEFAULT_PORT,
            authority: OAuthConfig::DEFAULT_AUTHORITY.to_string(),
            scope: OAuthConfig::DEFAULT_SCOPE.to_string(),
            timeout_secs: OAuthConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// `[credentials]`: login convenience and on-disk persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    #[serde(alias = "Browser")]
    pub open_browser: bool,

    #[serde(alias = "Persist")]
    pub persist: bool,

    /// Directory of `credentials.toml`. Empty disables the file.
    #[serde(alias = "StoragePath")]
    pub storage_path: PathBuf,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            open_browser: true,
            persist: false,
            storage_path: PathBuf::new(),
        }
    }
}

/// `[polling]`: the calendar poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_secs: u64,
    pub status_file: Option<PathBuf>,
    pub graph_base_url: String,
    pub lookahead_hours: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            status_file: None,
            graph_base_url: PollerConfig::DEFAULT_GRAPH_BASE_URL.to_string(),
            lookahead_hours: 24,
        }
    }
}

/// `[refresh]`: the background token renewal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub safety_margin_secs: u64,
    /// Retries after a network failure before the session is dropped.
    pub network_retries: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        let defaults = SupervisorConfig::default();
        Self {
            safety_margin_secs: defaults.safety_margin.as_secs(),
            network_retries: defaults.network_retries,
            initial_backoff_secs: defaults.initial_backoff.as_secs(),
            max_backoff_secs: defaults.max_backoff.as_secs(),
        }
    }
}

impl AppConfig {
    /// Loads the default file, falling back to defaults when it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads a specific file, which must exist.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| ClientError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nextevent")
            .join("config.toml")
    }

    /// Checks everything the daemon needs before it binds anything.
    pub fn validate(&self) -> ClientResult<()> {
        let oauth = self.oauth_config()?;
        oauth.validate().map_err(ClientError::config)?;
        if self.oauth.timeout_secs == 0 {
            return Err(ClientError::config("oauth timeout_secs must be non-zero"));
        }
        if self.polling.interval_secs == 0 {
            return Err(ClientError::config("polling interval_secs must be non-zero"));
        }
        if self.polling.lookahead_hours > MAX_LOOKAHEAD_HOURS {
            return Err(ClientError::config(format!(
                "polling lookahead_hours must be at most {}",
                MAX_LOOKAHEAD_HOURS
            )));
        }
        Ok(())
    }

    /// Builds the OAuth settings, resolving secret references.
    pub fn oauth_config(&self) -> ClientResult<OAuthConfig> {
        let settings = &self.oauth;
        let client_id = secret::resolve(&settings.client_id)
            .map_err(|e| ClientError::config(format!("failed to resolve client_id: {}", e)))?;
        let client_secret = secret::resolve(&settings.client_secret)
            .map_err(|e| ClientError::config(format!("failed to resolve client_secret: {}", e)))?;

        Ok(
            OAuthConfig::new(client_id, client_secret, settings.tenant_id.clone())
                .with_server(settings.protocol.clone(), settings.host.clone(), settings.port)
                .with_authority(settings.authority.clone())
                .with_scope(settings.scope.clone())
                .with_timeout(Duration::from_secs(settings.timeout_secs)),
        )
    }

    pub fn credentials_config(&self) -> CredentialsConfig {
        let settings = &self.credentials;
        CredentialsConfig::new(
            settings.open_browser,
            settings.persist,
            settings.storage_path.clone(),
        )
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        let settings = &self.refresh;
        SupervisorConfig::default()
            .with_safety_margin(Duration::from_secs(settings.safety_margin_secs))
            .with_retries(
                settings.network_retries,
                Duration::from_secs(settings.initial_backoff_secs),
                Duration::from_secs(settings.max_backoff_secs),
            )
    }

    pub fn poller_config(&self) -> PollerConfig {
        let settings = &self.polling;
        let mut config = PollerConfig::new(Duration::from_secs(settings.interval_secs))
            .with_graph_base_url(settings.graph_base_url.clone())
            .with_lookahead(Duration::from_secs(
                settings.lookahead_hours.saturating_mul(3600),
            ));
        if let Some(path) = &settings.status_file {
            config = config.with_status_file(path.clone());
        }
        config
    }

    /// A copy safe to print: an inline client secret is masked, references are kept.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.oauth.client_secret.is_empty() && !secret::is_reference(&config.oauth.client_secret)
        {
            config.oauth.client_secret = "<redacted>".to_string();
        }
        config
    }
}
