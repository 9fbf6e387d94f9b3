//! The single owner of the credential lifecycle.
//!
//! A [`CredentialManager`] is built once at startup and shared behind an
//! `Arc` by the login bridge, the refresh supervisor and the calendar poller.
//! Token exchanges always run outside the store lock; only the final commit
//! (or clear) takes it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::CredentialsConfig;
use crate::credential::CredentialStore;
use crate::error::{AuthError, AuthResult};
use crate::exchanger::TokenExchanger;
use crate::persist::CredentialFile;
use crate::supervisor::{RefreshSupervisor, SupervisorConfig, SupervisorState};

/// Read access to the current bearer token.
///
/// This is all a consumer of the API token needs: the token and whether it
/// is backed by a successful exchange.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> (String, bool);
}

/// Result of one refresh exchange against a known store generation.
#[derive(Debug)]
pub(crate) enum RefreshAttempt {
    Committed,
    /// The store was cleared; `generation` is the cleared store's.
    Failed { error: AuthError, generation: u64 },
    /// Another write replaced the credential; nothing was changed.
    Superseded,
}

pub struct CredentialManager {
    store: CredentialStore,
    exchanger: Arc<dyn TokenExchanger>,
    file: Option<CredentialFile>,
    supervisor: Mutex<RefreshSupervisor>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("store", &self.store)
            .field("file", &self.file)
            .field("supervisor", &self.lock_supervisor().state())
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    pub fn new(
        exchanger: Arc<dyn TokenExchanger>,
        credentials: &CredentialsConfig,
        supervisor: SupervisorConfig,
    ) -> Self {
        let file = credentials
            .persistence_enabled()
            .then(|| CredentialFile::new(&credentials.storage_path));
        Self {
            store: CredentialStore::new(),
            exchanger,
            file,
            supervisor: Mutex::new(RefreshSupervisor::new(supervisor)),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The credentials file, when persistence is enabled.
    pub fn credential_file(&self) -> Option<&CredentialFile> {
        self.file.as_ref()
    }

    fn lock_supervisor(&self) -> MutexGuard<'_, RefreshSupervisor> {
        self.supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current access token and whether it is valid.
    pub fn access_token(&self) -> (String, bool) {
        self.store.read()
    }

    /// Exchanges an authorization code and commits the result.
    ///
    /// On failure the store is left as it was.
    pub async fn authorize(&self, code: &str) -> AuthResult<()> {
        let credential = self.exchanger.exchange_authorization_code(code).await?;
        self.store.write(credential, true);
        info!("authorization code exchanged");
        Ok(())
    }

    /// Exchanges the stored refresh token.
    ///
    /// Any failure clears the store, including a missing refresh token. A
    /// login committed while the exchange was in flight wins over its result.
    pub async fn refresh(&self) -> AuthResult<()> {
        let Some((refresh_token, generation)) = self.store.refresh_ticket() else {
            self.store.clear();
            return Err(AuthError::configuration("no refresh token available"));
        };
        match self.refresh_with(&refresh_token, generation).await {
            RefreshAttempt::Committed | RefreshAttempt::Superseded => Ok(()),
            RefreshAttempt::Failed { error, .. } => Err(error),
        }
    }

    /// Exchanges `refresh_token`, read from the store at `generation`.
    ///
    /// The commit (or clear) only happens if the store is still at
    /// `generation`; otherwise the result is dropped.
    pub(crate) async fn refresh_with(&self, refresh_token: &str, generation: u64) -> RefreshAttempt {
        if self.store.generation() != generation {
            debug!("credential replaced before refresh, skipping exchange");
            return RefreshAttempt::Superseded;
        }

        match self.exchanger.exchange_refresh_token(refresh_token).await {
            Ok(credential) => {
                debug!(expires_in = credential.expires_in, "committing refreshed credential");
                if self.store.write_if_current(generation, credential) {
                    RefreshAttempt::Committed
                } else {
                    debug!("credential replaced during refresh, dropping result");
                    RefreshAttempt::Superseded
                }
            }
            Err(error) => match self.store.clear_if_current(generation) {
                Some(generation) => {
                    warn!(error = %error, "token refresh failed, clearing credentials");
                    RefreshAttempt::Failed { error, generation }
                }
                None => {
                    debug!(error = %error, "credential replaced during failed refresh");
                    RefreshAttempt::Superseded
                }
            },
        }
    }

    /// Starts the refresh supervisor unless one is already running.
    ///
    /// Returns true when a new run was started.
    pub fn start_supervisor(self: &Arc<Self>) -> bool {
        self.lock_supervisor().start(Arc::clone(self))
    }

    pub fn supervisor_state(&self) -> SupervisorState {
        self.lock_supervisor().state()
    }

    /// Subscribes to supervisor state changes across all runs.
    pub fn subscribe_supervisor(&self) -> watch::Receiver<SupervisorState> {
        self.lock_supervisor().subscribe()
    }

    /// Cancels the running supervisor and waits for it to finish.
    pub async fn stop_supervisor(&self) {
        let task = self.lock_supervisor().cancel();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(error = %e, "refresh supervisor task failed");
        }
    }

    /// Saves the current credential and waits for the write.
    pub async fn persist_now(&self) -> AuthResult<()> {
        let Some(file) = self.file.clone() else {
            return Ok(());
        };
        let (credential, generation) = self.store.snapshot_with_generation();
        tokio::task::spawn_blocking(move || file.save_generation(&credential, generation))
            .await
            .map_err(|e| AuthError::persistence("credential save task failed").with_source(e))?
            .map(|_| ())
    }

    /// Saves the current credential without waiting; failures are logged.
    ///
    /// A save that loses the race to a newer snapshot is skipped.
    pub(crate) fn persist_in_background(&self) {
        let Some(file) = self.file.clone() else {
            return;
        };
        let (credential, generation) = self.store.snapshot_with_generation();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = file.save_generation(&credential, generation) {
                warn!(error = %e, "failed to persist credentials");
            }
        });
    }
}

impl AccessTokenSource for CredentialManager {
    fn access_token(&self) -> (String, bool) {
        self.store.read()
    }
}
