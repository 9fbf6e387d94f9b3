//! Test doubles shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::StatusCode;
use tokio::net::TcpListener;

use crate::config::OAuthConfig;
use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};
use crate::exchanger::{BoxFuture, TokenExchanger};

pub fn credential(access: &str, refresh: &str, expires_in: u64) -> Credential {
    Credential {
        token_type: "Bearer".to_string(),
        scope: OAuthConfig::DEFAULT_SCOPE.to_string(),
        expires_in,
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
    }
}

/// A token endpoint response body.
pub fn token_json(access: &str, refresh: &str, expires_in: u64) -> String {
    serde_json::json!({
        "token_type": "Bearer",
        "scope": OAuthConfig::DEFAULT_SCOPE,
        "expires_in": expires_in,
        "access_token": access,
        "refresh_token": refresh,
    })
    .to_string()
}

/// Exchanger with scripted results and call bookkeeping.
///
/// An exhausted script answers with a 400 rejection.
#[derive(Default)]
pub struct FakeExchanger {
    code_results: Mutex<VecDeque<AuthResult<Credential>>>,
    refresh_results: Mutex<VecDeque<AuthResult<Credential>>>,
    codes_seen: Mutex<Vec<String>>,
    refresh_tokens_seen: Mutex<Vec<String>>,
}

impl FakeExchanger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_code(&self, result: AuthResult<Credential>) -> &Self {
        self.code_results.lock().unwrap().push_back(result);
        self
    }

    pub fn push_refresh(&self, result: AuthResult<Credential>) -> &Self {
        self.refresh_results.lock().unwrap().push_back(result);
        self
    }

    pub fn codes_seen(&self) -> Vec<String> {
        self.codes_seen.lock().unwrap().clone()
    }

    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens_seen.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_tokens_seen.lock().unwrap().len()
    }
}

fn exhausted() -> AuthResult<Credential> {
    Err(AuthError::rejected(400, "invalid_grant: no scripted response"))
}

impl TokenExchanger for FakeExchanger {
    fn exchange_authorization_code<'a>(
        &'a self,
        code: &'a str,
    ) -> BoxFuture<'a, AuthResult<Credential>> {
        self.codes_seen.lock().unwrap().push(code.to_string());
        let result = self
            .code_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(exhausted);
        Box::pin(async move { result })
    }

    fn exchange_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, AuthResult<Credential>> {
        self.refresh_tokens_seen
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        let result = self
            .refresh_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(exhausted);
        Box::pin(async move { result })
    }
}

/// In-process token endpoint answering with canned `(status, body)` pairs.
///
/// The last response repeats once the list is exhausted.
pub struct MockTokenServer {
    addr: SocketAddr,
    calls: Arc<AtomicU32>,
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl MockTokenServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let calls = Arc::new(AtomicU32::new(0));
        let forms = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(responses);

        let app = {
            let calls = Arc::clone(&calls);
            let forms = Arc::clone(&forms);
            Router::new().fallback(move |body: String| {
                let calls = Arc::clone(&calls);
                let forms = Arc::clone(&forms);
                let responses = Arc::clone(&responses);
                async move {
                    let form: HashMap<String, String> =
                        url::form_urlencoded::parse(body.as_bytes())
                            .into_owned()
                            .collect();
                    forms.lock().unwrap().push(form);

                    let idx = calls.fetch_add(1, Ordering::Relaxed) as usize;
                    let (status, body) = responses
                        .get(idx)
                        .or_else(|| responses.last())
                        .cloned()
                        .unwrap_or((500, "{}".to_string()));
                    (
                        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                        [(axum::http::header::CONTENT_TYPE, "application/json")],
                        body,
                    )
                }
            })
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, calls, forms }
    }

    pub fn authority(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client settings pointing the token URL at this server.
    pub fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig::new("client-1", "secret-1", "tenant").with_authority(self.authority())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn last_form(&self) -> Option<HashMap<String, String>> {
        self.forms.lock().unwrap().last().cloned()
    }
}

/// An authority whose port nothing listens on.
pub async fn unreachable_authority() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
