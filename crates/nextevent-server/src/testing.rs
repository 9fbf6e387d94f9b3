//! Test doubles shared by the unit tests of this crate.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use nextevent_auth::AccessTokenSource;
use tokio::net::TcpListener;

/// Fixed token source.
pub struct StaticToken {
    token: Mutex<(String, bool)>,
}

impl StaticToken {
    pub fn new(token: &str, authenticated: bool) -> Self {
        Self {
            token: Mutex::new((token.to_string(), authenticated)),
        }
    }

    pub fn set(&self, token: &str, authenticated: bool) {
        *self.token.lock().unwrap() = (token.to_string(), authenticated);
    }
}

impl AccessTokenSource for StaticToken {
    fn access_token(&self) -> (String, bool) {
        self.token.lock().unwrap().clone()
    }
}

/// In-process Graph API answering with canned `(status, body)` pairs.
///
/// `{origin}` in a body is replaced by `http://{addr}`. The last response
/// repeats once the list is exhausted.
pub struct MockGraphServer {
    addr: SocketAddr,
    calls: Arc<AtomicU32>,
    authorizations: Arc<Mutex<Vec<String>>>,
}

impl MockGraphServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let origin = format!("http://{}", addr);

        let calls = Arc::new(AtomicU32::new(0));
        let authorizations = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(responses);

        let app = {
            let calls = Arc::clone(&calls);
            let authorizations = Arc::clone(&authorizations);
            Router::new().fallback(move |headers: HeaderMap| {
                let calls = Arc::clone(&calls);
                let authorizations = Arc::clone(&authorizations);
                let responses = Arc::clone(&responses);
                let origin = origin.clone();
                async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    authorizations.lock().unwrap().push(auth);

                    let idx = calls.fetch_add(1, Ordering::Relaxed) as usize;
                    let (status, body) = responses
                        .get(idx)
                        .or_else(|| responses.last())
                        .cloned()
                        .unwrap_or((500, "{}".to_string()));
                    (
                        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                        [(header::CONTENT_TYPE, "application/json")],
                        body.replace("{origin}", &origin),
                    )
                }
            })
        };

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            addr,
            calls,
            authorizations,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/v1.0", self.addr)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.authorizations.lock().unwrap().last().cloned()
    }

    /// A calendar view page with one event per `(subject, start)`; each
    /// event lasts one hour.
    pub fn events_json(events: &[(&str, &str)]) -> String {
        Self::page(events, None)
    }

    pub fn events_json_with_next(events: &[(&str, &str)], next_link: &str) -> String {
        Self::page(events, Some(next_link))
    }

    fn page(events: &[(&str, &str)], next_link: Option<&str>) -> String {
        let value: Vec<serde_json::Value> = events
            .iter()
            .map(|(subject, start)| {
                let start_at = nextevent_core::GraphDateTime::new(*start, "UTC")
                    .to_utc()
                    .unwrap();
                let end = (start_at + chrono::Duration::hours(1))
                    .format("%Y-%m-%dT%H:%M:%S")
                    .to_string();
                serde_json::json!({
                    "id": subject.to_lowercase(),
                    "subject": subject,
                    "start": {"dateTime": start, "timeZone": "UTC"},
                    "end": {"dateTime": end, "timeZone": "UTC"},
                    "location": {"displayName": ""}
                })
            })
            .collect();

        let mut page = serde_json::json!({ "value": value });
        if let Some(next) = next_link {
            page["@odata.nextLink"] = serde_json::Value::String(next.to_string());
        }
        page.to_string()
    }
}
