//! The token set and its synchronized in-memory store.
//!
//! [`CredentialStore`] keeps the credential, its computed expiry and the
//! authenticated flag behind a single mutex. The lock is only ever held for a
//! field copy or a field replacement; network calls happen outside it, so a
//! slow provider never blocks [`CredentialStore::read`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A token set as returned by the provider's token endpoint.
///
/// This is also the shape of the persisted credentials file. Missing fields
/// decode to empty values.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credential {
    pub token_type: String,
    pub scope: String,
    /// Lifetime of the access token in seconds, counted from the exchange.
    pub expires_in: u64,
    pub access_token: String,
    pub refresh_token: String,
}

impl Credential {
    /// Returns true when no access token and no refresh token are present.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

// Tokens are bearer secrets; keep them out of logs and panic messages.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

fn redact(token: &str) -> &'static str {
    if token.is_empty() { "" } else { "<redacted>" }
}

#[derive(Debug, Default)]
struct StoreState {
    credential: Credential,
    expires_at: Option<DateTime<Utc>>,
    authenticated: bool,
    /// Bumped by every write, seed and clear.
    generation: u64,
}

impl StoreState {
    fn commit(&mut self, credential: Credential, authenticated: bool, now: DateTime<Utc>) {
        self.expires_at = expiry_from(now, credential.expires_in);
        self.authenticated = authenticated && !credential.access_token.is_empty();
        self.credential = credential;
        self.generation = self.generation.wrapping_add(1);
    }

    fn reset(&mut self) {
        *self = StoreState {
            generation: self.generation.wrapping_add(1),
            ..StoreState::default()
        };
    }
}

/// Synchronized holder of the current credential.
///
/// Invariant: when `authenticated` is true the access token is non-empty and
/// the expiry was computed from the time of the write.
#[derive(Debug, Default)]
pub struct CredentialStore {
    state: Mutex<StoreState>,
}

impl CredentialStore {
    /// Creates an empty, unauthenticated store.
    pub fn new() -> Self {
        Self::default()
    }

    // The state holds plain values that are always replaced wholesale, so a
    // poisoned guard still protects a consistent triple.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the access token and whether the store is authenticated.
    pub fn read(&self) -> (String, bool) {
        let state = self.lock();
        (state.credential.access_token.clone(), state.authenticated)
    }

    /// Replaces the credential and flag, recomputing the expiry from now.
    ///
    /// A credential without an access token is never stored as authenticated.
    pub fn write(&self, credential: Credential, authenticated: bool) {
        let now = Utc::now();
        self.lock().commit(credential, authenticated, now);
    }

    /// Loads a credential without marking the store authenticated.
    ///
    /// Used for a persisted credential whose access token may already be stale.
    pub fn seed(&self, credential: Credential) {
        let mut state = self.lock();
        state.credential = credential;
        state.expires_at = None;
        state.authenticated = false;
        state.generation = state.generation.wrapping_add(1);
    }

    /// Resets to an empty, unauthenticated credential.
    pub fn clear(&self) {
        self.lock().reset();
    }

    /// Counter identifying the current content; any write, seed or clear
    /// moves it forward.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// The refresh token together with the generation it was read at.
    pub(crate) fn refresh_ticket(&self) -> Option<(String, u64)> {
        let state = self.lock();
        state
            .credential
            .has_refresh_token()
            .then(|| (state.credential.refresh_token.clone(), state.generation))
    }

    pub(crate) fn snapshot_with_generation(&self) -> (Credential, u64) {
        let state = self.lock();
        (state.credential.clone(), state.generation)
    }

    /// Commits `credential` only if nothing was written since `generation`.
    pub(crate) fn write_if_current(&self, generation: u64, credential: Credential) -> bool {
        let now = Utc::now();
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.commit(credential, true, now);
        true
    }

    /// Clears only if nothing was written since `generation`, returning the
    /// generation of the cleared store.
    pub(crate) fn clear_if_current(&self, generation: u64) -> Option<u64> {
        let mut state = self.lock();
        if state.generation != generation {
            return None;
        }
        state.reset();
        Some(state.generation)
    }

    /// Returns a copy of the full credential.
    pub fn snapshot(&self) -> Credential {
        self.lock().credential.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        let state = self.lock();
        state
            .credential
            .has_refresh_token()
            .then(|| state.credential.refresh_token.clone())
    }

    pub fn expires_in(&self) -> u64 {
        self.lock().credential.expires_in
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.lock().expires_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }
}

/// `None` when the lifetime does not fit a timestamp.
fn expiry_from(now: DateTime<Utc>, expires_in: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(expires_in).ok()?;
    now.checked_add_signed(Duration::try_seconds(secs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn credential(access: &str, refresh: &str, expires_in: u64) -> Credential {
        Credential {
            token_type: "Bearer".to_string(),
            scope: "Calendars.Read".to_string(),
            expires_in,
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = CredentialStore::new();
        assert_eq!(store.read(), (String::new(), false));
        assert!(store.snapshot().is_empty());
        assert!(store.refresh_token().is_none());
        assert!(store.expires_at().is_none());
    }

    #[test]
    fn read_after_write_returns_token() {
        let store = CredentialStore::new();
        store.write(credential("tok1", "rt1", 3600), true);
        assert_eq!(store.read(), ("tok1".to_string(), true));
        assert_eq!(store.refresh_token().as_deref(), Some("rt1"));
        assert_eq!(store.expires_in(), 3600);
    }

    #[test]
    fn write_computes_expiry_from_now() {
        let store = CredentialStore::new();
        let before = Utc::now();
        store.write(credential("tok", "rt", 3600), true);
        let after = Utc::now();

        let expires_at = store.expires_at().unwrap();
        assert!(expires_at >= before + Duration::seconds(3600));
        assert!(expires_at <= after + Duration::seconds(3600));
    }

    #[test]
    fn empty_access_token_is_never_authenticated() {
        let store = CredentialStore::new();
        store.write(credential("", "rt", 3600), true);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn clear_resets_everything() {
        let store = CredentialStore::new();
        store.write(credential("tok", "rt", 3600), true);
        store.clear();
        assert_eq!(store.read(), (String::new(), false));
        assert!(store.snapshot().is_empty());
        assert!(store.expires_at().is_none());
    }

    #[test]
    fn seed_keeps_store_unauthenticated() {
        let store = CredentialStore::new();
        store.seed(credential("stale", "rt-123", 3600));
        assert_eq!(store.read(), ("stale".to_string(), false));
        assert_eq!(store.refresh_token().as_deref(), Some("rt-123"));
    }

    #[test]
    fn huge_lifetime_does_not_overflow() {
        let store = CredentialStore::new();
        store.write(credential("tok", "rt", u64::MAX), true);
        assert!(store.is_authenticated());
    }

    #[test]
    fn debug_redacts_tokens() {
        let rendered = format!("{:?}", credential("secret-access", "secret-refresh", 60));
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn every_mutation_advances_generation() {
        let store = CredentialStore::new();
        let start = store.generation();
        store.seed(credential("stale", "rt", 0));
        store.write(credential("tok", "rt", 3600), true);
        store.clear();
        assert_eq!(store.generation(), start + 3);
    }

    #[test]
    fn conditional_commit_rejects_stale_generation() {
        let store = CredentialStore::new();
        store.write(credential("tok1", "rt1", 3600), true);
        let (refresh_token, generation) = store.refresh_ticket().unwrap();
        assert_eq!(refresh_token, "rt1");

        store.write(credential("tok-new", "rt-new", 3600), true);

        assert!(!store.write_if_current(generation, credential("tok2", "rt2", 3600)));
        assert!(store.clear_if_current(generation).is_none());
        assert_eq!(store.read(), ("tok-new".to_string(), true));
    }

    #[test]
    fn conditional_clear_reports_new_generation() {
        let store = CredentialStore::new();
        store.write(credential("tok1", "rt1", 3600), true);
        let generation = store.generation();

        let cleared = store.clear_if_current(generation).unwrap();
        assert_eq!(cleared, store.generation());
        assert!(store.write_if_current(cleared, credential("tok2", "rt2", 3600)));
        assert_eq!(store.read(), ("tok2".to_string(), true));
    }

    #[test]
    fn readers_never_see_mixed_writes() {
        let store = Arc::new(CredentialStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..500 {
                    if i % 2 == 0 {
                        store.write(credential(&format!("tok-{i}"), "rt", 3600), true);
                    } else {
                        store.clear();
                    }
                }
            })
        };

        for _ in 0..500 {
            let (token, authenticated) = store.read();
            if authenticated {
                assert!(token.starts_with("tok-"));
            } else {
                assert!(token.is_empty());
            }
        }
        writer.join().unwrap();
    }
}
