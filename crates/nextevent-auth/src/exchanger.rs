//! OAuth2 grant exchanges against the provider's token endpoint.
//!
//! [`TokenExchanger`] is the seam between the credential lifecycle and the
//! network. [`GraphTokenExchanger`] talks to the Microsoft identity platform;
//! tests substitute a scripted implementation.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::OAuthConfig;
use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};

/// A boxed future so the trait stays object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Performs the two grant exchanges the login flow needs.
///
/// Implementations only talk to the provider. Committing the result to the
/// credential store is the caller's job.
pub trait TokenExchanger: Send + Sync {
    /// `grant_type=authorization_code`: trades a one-time code from the
    /// login redirect for a token set.
    fn exchange_authorization_code<'a>(
        &'a self,
        code: &'a str,
    ) -> BoxFuture<'a, AuthResult<Credential>>;

    /// `grant_type=refresh_token`: trades a refresh token for a new token set.
    ///
    /// The provider may rotate the refresh token; when the response omits
    /// one, the returned credential carries the token that was sent.
    fn exchange_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, AuthResult<Credential>>;
}

/// Error body of a rejected token request.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Token exchanger for the Microsoft identity platform v2.0 endpoint.
#[derive(Debug)]
pub struct GraphTokenExchanger {
    config: OAuthConfig,
    http_client: reqwest::Client,
}

impl GraphTokenExchanger {
    /// Creates an exchanger using the configured request timeout.
    pub fn new(config: OAuthConfig) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                AuthError::configuration("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Posts a form to the token endpoint and decodes the token set.
    async fn request_token(&self, grant: Grant<'_>) -> AuthResult<Credential> {
        let redirect_uri = self.config.redirect_uri();
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("scope", self.config.scope.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", grant.grant_type()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        match grant {
            Grant::AuthorizationCode(code) => params.push(("code", code)),
            Grant::RefreshToken(token) => params.push(("refresh_token", token)),
        }

        let token_url = self.config.token_url();
        debug!(url = %token_url, grant_type = grant.grant_type(), "requesting token");

        let response = self
            .http_client
            .post(&token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "token request timed out".to_string()
                } else if e.is_connect() {
                    format!("failed to connect to token endpoint: {}", e)
                } else {
                    format!("token request failed: {}", e)
                };
                AuthError::network(message).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AuthError::network("failed to read token response").with_source(e)
        })?;

        if !status.is_success() {
            let reason = rejection_reason(&body);
            warn!(status = status.as_u16(), reason = %reason, "token endpoint rejected request");
            return Err(AuthError::rejected(status.as_u16(), reason));
        }

        let credential: Credential = serde_json::from_str(&body).map_err(|e| {
            AuthError::decode("invalid token response").with_source(e)
        })?;

        if credential.access_token.is_empty() {
            return Err(AuthError::decode("token response has no access_token"));
        }

        Ok(credential)
    }
}

impl TokenExchanger for GraphTokenExchanger {
    fn exchange_authorization_code<'a>(
        &'a self,
        code: &'a str,
    ) -> BoxFuture<'a, AuthResult<Credential>> {
        Box::pin(async move {
            let credential = self.request_token(Grant::AuthorizationCode(code)).await?;
            info!(expires_in = credential.expires_in, "token received");
            Ok(credential)
        })
    }

    fn exchange_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, AuthResult<Credential>> {
        Box::pin(async move {
            let mut credential = self.request_token(Grant::RefreshToken(refresh_token)).await?;
            if credential.refresh_token.is_empty() {
                credential.refresh_token = refresh_token.to_string();
            }
            info!(expires_in = credential.expires_in, "token refresh succeeded");
            Ok(credential)
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Grant<'a> {
    AuthorizationCode(&'a str),
    RefreshToken(&'a str),
}

impl Grant<'_> {
    fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode(_) => "authorization_code",
            Self::RefreshToken(_) => "refresh_token",
        }
    }
}

/// Extracts a readable reason from a rejection body without echoing secrets.
fn rejection_reason(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(description) => {
                let first_line = description.lines().next().unwrap_or_default();
                format!("{}: {}", err.error, first_line)
            }
            None => err.error,
        },
        Err(_) => {
            let trimmed: String = body.trim().chars().take(200).collect();
            if trimmed.is_empty() {
                "empty response".to_string()
            } else {
                trimmed
            }
        }
    }
}
