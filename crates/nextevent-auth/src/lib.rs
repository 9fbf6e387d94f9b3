//! OAuth2 credential lifecycle for the Microsoft identity platform.
//!
//! - [`CredentialStore`] - the synchronized token set
//! - [`TokenExchanger`] - authorization-code and refresh-token grants
//! - [`CredentialFile`] - on-disk persistence
//! - [`RefreshSupervisor`] - background renewal before expiry
//! - [`LoginBridge`] - startup resume and the login callback
//! - [`CredentialManager`] - owns all of the above and hands out the token
//!
//! ```text
//!   /login ──► provider ──► /callback?code ──► LoginBridge
//!                                                  │
//!                                                  ▼
//!   persisted file ◄──► CredentialManager ◄──► TokenExchanger
//!                          │        ▲
//!                          │        └── RefreshSupervisor
//!                          ▼
//!                   AccessTokenSource ──► calendar poller
//! ```

pub mod bridge;
pub mod config;
pub mod credential;
pub mod error;
pub mod exchanger;
pub mod manager;
pub mod persist;
pub mod routes;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use bridge::{CallbackOutcome, LoginBridge, StartupOutcome};
pub use config::{CredentialsConfig, OAuthConfig};
pub use credential::{Credential, CredentialStore};
pub use error::{AuthError, AuthErrorCode, AuthResult};
pub use exchanger::{BoxFuture, GraphTokenExchanger, TokenExchanger};
pub use manager::{AccessTokenSource, CredentialManager};
pub use persist::{CREDENTIALS_FILE_NAME, CredentialFile};
pub use supervisor::{
    RefreshSupervisor, StopReason, SupervisorConfig, SupervisorState, sleep_duration,
};
