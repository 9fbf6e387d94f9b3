//! OAuth client and credential persistence settings.
//!
//! Both structs are produced once by the configuration loader and are
//! immutable afterwards. All URLs used by the login flow are derived from
//! [`OAuthConfig`] so that the redirect URI sent to the authorize endpoint and
//! the one sent to the token endpoint can never drift apart.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{AuthError, AuthResult};

/// OAuth client identity and the local server the provider redirects back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Directory tenant (GUID, domain, `common`, or `organizations`).
    pub tenant_id: String,
    /// Scheme of the local callback server (`http` or `https`).
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Identity provider root, without a trailing slash.
    pub authority: String,
    /// Space separated scopes requested at login and on every token exchange.
    pub scope: String,
    /// Timeout applied to each token endpoint request.
    pub timeout: Duration,
}

impl OAuthConfig {
    pub const DEFAULT_PROTOCOL: &'static str = "http";
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 8000;
    pub const DEFAULT_AUTHORITY: &'static str = "https://login.microsoftonline.com";
    pub const DEFAULT_SCOPE: &'static str = "https://graph.microsoft.com/.default offline_access";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration with default server and provider settings.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant_id: tenant_id.into(),
            protocol: Self::DEFAULT_PROTOCOL.to_string(),
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            authority: Self::DEFAULT_AUTHORITY.to_string(),
            scope: Self::DEFAULT_SCOPE.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_server(
        mut self,
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        self.protocol = protocol.into();
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{protocol}://{host}:{port}`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// `{protocol}://{host}:{port}/callback`
    pub fn redirect_uri(&self) -> String {
        format!("{}/callback", self.base_url())
    }

    /// The provider's v2.0 token endpoint for this tenant.
    pub fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }

    /// The provider's authorization URL users are redirected to at login.
    pub fn authorize_url(&self) -> AuthResult<Url> {
        let endpoint = format!("{}/{}/oauth2/v2.0/authorize", self.authority, self.tenant_id);
        let redirect_uri = self.redirect_uri();
        Url::parse_with_params(
            &endpoint,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", redirect_uri.as_str()),
                ("scope", self.scope.as_str()),
            ],
        )
        .map_err(|e| {
            AuthError::configuration(format!("invalid authorize endpoint {}", endpoint))
                .with_source(e)
        })
    }

    /// Checks the fields the provider requires.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        if self.tenant_id.is_empty() {
            return Err("tenant_id is required");
        }
        if self.protocol != "http" && self.protocol != "https" {
            return Err("protocol must be http or https");
        }
        if self.host.is_empty() {
            return Err("host is required");
        }
        if self.port == 0 {
            return Err("port must be non-zero");
        }
        Ok(())
    }
}

/// Browser launch and persistence toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsConfig {
    /// Open the login page in the default browser when interactive login is needed.
    pub open_browser: bool,
    /// Save the credential to disk after every exchange.
    pub persist: bool,
    /// Directory holding the credentials file. Empty disables persistence.
    pub storage_path: PathBuf,
}

impl CredentialsConfig {
    pub fn new(open_browser: bool, persist: bool, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            open_browser,
            persist,
            storage_path: storage_path.into(),
        }
    }

    /// Returns true when a credential file should be read and written.
    pub fn persistence_enabled(&self) -> bool {
        self.persist && !self.storage_path.as_os_str().is_empty()
    }
}
