//! HTTP pages of the interactive login flow.
//!
//! | path        | response                                          |
//! |-------------|---------------------------------------------------|
//! | `/`, `/home`| link to `/login`                                  |
//! | `/login`    | 302 to the provider's authorization endpoint      |
//! | `/callback` | 303 to `/success`, or 400 pointing at `/error`    |
//! | `/success`  | confirmation page                                 |
//! | `/error`    | generic failure page with a retry link            |

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use serde::Deserialize;
use tracing::error;

use crate::bridge::{CallbackOutcome, LoginBridge};

const HOME_PAGE: &str = "<a href='/login'>Login</a>";
const SUCCESS_PAGE: &str = "<p>Login success. You can now close this tab.</p>";
const ERROR_PAGE: &str =
    "<p>Error on login to Microsoft Graph API.</p><br/><p>Try again at <a href='/home'>Home</a></p>";

/// Builds the login router around a shared bridge.
pub fn router(bridge: Arc<LoginBridge>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/home", get(home))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/success", get(success))
        .route("/error", get(error_page))
        .with_state(bridge)
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

async fn login(State(bridge): State<Arc<LoginBridge>>) -> Response {
    match bridge.oauth().authorize_url() {
        Ok(url) => (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response(),
        Err(e) => {
            error!(error = %e, "cannot build authorization URL");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(ERROR_PAGE)).into_response()
        }
    }
}

async fn callback(
    State(bridge): State<Arc<LoginBridge>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let outcome = bridge
        .handle_callback(params.code.as_deref(), params.error.as_deref())
        .await;

    match outcome {
        CallbackOutcome::Success => Redirect::to(outcome.redirect_path()).into_response(),
        CallbackOutcome::Failure => (
            StatusCode::BAD_REQUEST,
            [(header::LOCATION, outcome.redirect_path())],
            Html(ERROR_PAGE),
        )
            .into_response(),
    }
}

async fn success() -> Html<&'static str> {
    Html(SUCCESS_PAGE)
}

async fn error_page() -> Html<&'static str> {
    Html(ERROR_PAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialsConfig, OAuthConfig};
    use crate::error::AuthError;
    use crate::manager::CredentialManager;
    use crate::supervisor::SupervisorConfig;
    use crate::testing::{FakeExchanger, credential};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(fake: Arc<FakeExchanger>) -> (Router, Arc<LoginBridge>) {
        let manager = Arc::new(CredentialManager::new(
            fake,
            &CredentialsConfig::default(),
            SupervisorConfig::default(),
        ));
        let bridge = Arc::new(LoginBridge::new(
            manager,
            OAuthConfig::new("client-1", "secret-1", "tenant"),
            CredentialsConfig::default(),
        ));
        (router(Arc::clone(&bridge)), bridge)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn home_links_to_login() {
        let (app, _) = app(Arc::new(FakeExchanger::new()));
        for path in ["/", "/home"] {
            let response = get(app.clone(), path).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_text(response).await.contains("href='/login'"));
        }
    }

    #[tokio::test]
    async fn login_redirects_to_provider() {
        let (app, _) = app(Arc::new(FakeExchanger::new()));
        let response = get(app, "/login").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let target = url::Url::parse(location(&response).unwrap()).unwrap();
        assert_eq!(target.host_str(), Some("login.microsoftonline.com"));
        assert_eq!(target.path(), "/tenant/oauth2/v2.0/authorize");
        assert!(
            target
                .query_pairs()
                .any(|(k, v)| k == "response_type" && v == "code")
        );
    }

    #[tokio::test]
    async fn callback_success_redirects_to_success() {
        let fake = Arc::new(FakeExchanger::new());
        fake.push_code(Ok(credential("tok1", "rt1", 3600)));
        let (app, bridge) = app(Arc::clone(&fake));

        let response = get(app, "/callback?code=abc").await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/success"));
        assert_eq!(bridge.manager().access_token(), ("tok1".to_string(), true));

        bridge.manager().stop_supervisor().await;
    }

    #[tokio::test]
    async fn callback_failure_points_to_error() {
        let fake = Arc::new(FakeExchanger::new());
        fake.push_code(Err(AuthError::rejected(400, "invalid_grant")));
        let (app, bridge) = app(Arc::clone(&fake));

        let response = get(app, "/callback?code=bad").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(location(&response), Some("/error"));
        assert!(body_text(response).await.contains("href='/home'"));
        assert_eq!(bridge.manager().access_token(), (String::new(), false));
    }

    #[tokio::test]
    async fn callback_with_provider_error() {
        let fake = Arc::new(FakeExchanger::new());
        let (app, _) = app(Arc::clone(&fake));

        let response = get(
            app,
            "/callback?error=access_denied&error_description=user+cancelled",
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(fake.codes_seen().is_empty());
    }

    #[tokio::test]
    async fn static_pages() {
        let (app, _) = app(Arc::new(FakeExchanger::new()));

        let response = get(app.clone(), "/success").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Login success"));

        let response = get(app, "/error").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Try again"));
    }
}
