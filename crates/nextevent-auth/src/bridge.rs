//! Startup resume and the interactive login callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CredentialsConfig, OAuthConfig};
use crate::error::AuthResult;
use crate::manager::CredentialManager;
use crate::supervisor::{StopReason, SupervisorState};

/// How [`LoginBridge::start`] obtained (or failed to obtain) a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// A persisted refresh token was accepted and the supervisor is running.
    Resumed,
    /// The user has to log in through the browser.
    InteractiveLogin,
}

/// Result of handling a provider redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success,
    Failure,
}

impl CallbackOutcome {
    /// Page the user is redirected to.
    pub fn redirect_path(&self) -> &'static str {
        match self {
            Self::Success => "/success",
            Self::Failure => "/error",
        }
    }
}

/// Connects the login pages to the credential manager.
#[derive(Debug)]
pub struct LoginBridge {
    manager: Arc<CredentialManager>,
    oauth: OAuthConfig,
    credentials: CredentialsConfig,
    awaiting_login: AtomicBool,
}

impl LoginBridge {
    pub fn new(
        manager: Arc<CredentialManager>,
        oauth: OAuthConfig,
        credentials: CredentialsConfig,
    ) -> Self {
        Self {
            manager,
            oauth,
            credentials,
            awaiting_login: AtomicBool::new(false),
        }
    }

    pub fn manager(&self) -> &Arc<CredentialManager> {
        &self.manager
    }

    pub fn oauth(&self) -> &OAuthConfig {
        &self.oauth
    }

    /// True between a login prompt and the next successful exchange.
    pub fn awaiting_login(&self) -> bool {
        self.awaiting_login.load(Ordering::Acquire)
    }

    /// Resumes a persisted session or asks the user to log in.
    ///
    /// The listener serving the login routes should already be bound so the
    /// browser opened by [`prompt_login`](Self::prompt_login) can connect.
    pub async fn start(&self) -> StartupOutcome {
        if let Some(file) = self.manager.credential_file() {
            let credential = file.load();
            if !credential.is_empty() {
                self.manager.store().seed(credential);
            }
        }

        if self.manager.store().refresh_token().is_some() {
            match self.manager.refresh().await {
                Ok(()) => {
                    info!("resumed session from persisted refresh token");
                    self.awaiting_login.store(false, Ordering::Release);
                    self.manager.start_supervisor();
                    return StartupOutcome::Resumed;
                }
                Err(e) => {
                    warn!(error = %e, "persisted refresh token rejected, interactive login required");
                }
            }
        } else {
            debug!("no refresh token available");
        }

        self.prompt_login();
        StartupOutcome::InteractiveLogin
    }

    /// Points the user at the login page, opening a browser when enabled.
    pub fn prompt_login(&self) {
        self.awaiting_login.store(true, Ordering::Release);
        let url = format!("{}/home", self.oauth.base_url());
        info!(url = %url, "login required");

        if self.credentials.open_browser
            && let Err(e) = open::that_detached(&url)
        {
            warn!(error = %e, url = %url, "failed to open browser, open the URL manually");
        }
    }

    /// Handles `/callback?code=..` (or `?error=..`) from the provider.
    pub async fn handle_callback(&self, code: Option<&str>, error: Option<&str>) -> CallbackOutcome {
        if let Some(error) = error {
            warn!(error = %error, "provider returned an error to the callback");
            return CallbackOutcome::Failure;
        }
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            warn!("callback without authorization code");
            return CallbackOutcome::Failure;
        };

        match self.complete_login(code).await {
            Ok(()) => CallbackOutcome::Success,
            Err(e) => {
                warn!(error = %e, "authorization code exchange failed");
                CallbackOutcome::Failure
            }
        }
    }

    async fn complete_login(&self, code: &str) -> AuthResult<()> {
        self.manager.authorize(code).await?;
        self.awaiting_login.store(false, Ordering::Release);
        info!("login completed");

        // A fresh supervisor run persists as its first step.
        if !self.manager.start_supervisor()
            && let Err(e) = self.manager.persist_now().await
        {
            warn!(error = %e, "failed to persist credentials");
        }
        Ok(())
    }

    /// Prompts for login again whenever the supervisor gives up on a refresh.
    ///
    /// Runs until `cancel` fires.
    pub async fn watch_supervisor(&self, cancel: CancellationToken) {
        let mut states = self.manager.subscribe_supervisor();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    if let SupervisorState::Stopped(StopReason::RefreshFailed(code)) = state {
                        warn!(code = %code, "session lost");
                        self.prompt_login();
                    }
                }
            }
        }
        debug!("supervisor watcher stopped");
    }
}
