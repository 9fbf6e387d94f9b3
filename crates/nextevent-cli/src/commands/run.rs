//! Run command: the foreground daemon.
//!
//! Wires every component together:
//! - HTTP listener serving the login pages and `/next-event`
//! - Credential manager, resumed from disk or through an interactive login
//! - Supervisor watcher (offers a new login when a refresh fails)
//! - Calendar poll scheduler, polled again as soon as a session starts
//! - Signal handler (SIGTERM/SIGINT)

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nextevent_auth::{CredentialManager, GraphTokenExchanger, LoginBridge, SupervisorState, routes};
use nextevent_server::{
    CalendarPoller, Scheduler, SchedulerHandle, SignalHandler, new_shared_state, next_event_router,
};

use crate::config::AppConfig;
use crate::error::ClientResult;

const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the daemon until SIGTERM or SIGINT.
pub async fn run(config: &AppConfig) -> ClientResult<()> {
    config.validate()?;
    let oauth = config.oauth_config()?;

    let signals = SignalHandler::new();
    signals.spawn_listener();

    // Bound before the browser is opened so the login page is reachable.
    let listener = TcpListener::bind((oauth.host.as_str(), oauth.port)).await?;
    serve(config, listener, signals).await
}

/// Runs every component on an already bound listener until `signals` fires.
pub async fn serve(
    config: &AppConfig,
    listener: TcpListener,
    signals: SignalHandler,
) -> ClientResult<()> {
    let oauth = config.oauth_config()?;
    let credentials = config.credentials_config();
    let poller_config = config.poller_config();
    let shutdown = signals.token();

    let exchanger = Arc::new(GraphTokenExchanger::new(oauth.clone())?);
    let manager = Arc::new(CredentialManager::new(
        exchanger,
        &credentials,
        config.supervisor_config(),
    ));
    let bridge = Arc::new(LoginBridge::new(manager.clone(), oauth, credentials));
    let state = new_shared_state();

    let app = routes::router(bridge.clone()).merge(next_event_router(state.clone()));
    info!(address = %listener.local_addr()?, "listening");
    let server_task = tokio::spawn({
        let signals = signals.clone();
        let cancel = shutdown.child_token();
        async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server failed");
                signals.trigger_shutdown();
            }
        }
    });

    let poller = CalendarPoller::new(manager.clone(), &poller_config, state)?;
    let scheduler = Scheduler::new(poller_config);
    let login_task = tokio::spawn(poll_on_session_start(
        manager.subscribe_supervisor(),
        scheduler.handle(),
        shutdown.child_token(),
    ));

    let outcome = bridge.start().await;
    info!(?outcome, "credential startup finished");

    let watcher_task = tokio::spawn({
        let bridge = bridge.clone();
        let cancel = shutdown.child_token();
        async move { bridge.watch_supervisor(cancel).await }
    });

    let scheduler_task = tokio::spawn({
        let cancel = shutdown.child_token();
        async move { scheduler.run(|| poller.poll_once(), cancel).await }
    });

    signals.wait().await;
    info!("shutting down");

    for (name, task) in [
        ("scheduler", scheduler_task),
        ("session watcher", login_task),
        ("supervisor watcher", watcher_task),
        ("http server", server_task),
    ] {
        match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => debug!(task = name, "stopped"),
            Ok(Err(e)) => warn!(task = name, error = %e, "task failed"),
            Err(_) => warn!(task = name, "did not stop in time"),
        }
    }

    manager.stop_supervisor().await;
    // A cleared store must not overwrite the last good file.
    if manager.store().is_authenticated()
        && let Err(e) = manager.persist_now().await
    {
        warn!(error = %e, "failed to persist credentials on shutdown");
    }

    info!("stopped");
    Ok(())
}

/// Requests a calendar poll every time the refresh supervisor starts.
///
/// Without it a fresh login would wait out the whole poll interval.
async fn poll_on_session_start(
    mut states: watch::Receiver<SupervisorState>,
    scheduler: SchedulerHandle,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let running = states.borrow_and_update().is_running();
                if running && scheduler.poll_now().await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("session watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use nextevent_auth::StopReason;
    use nextevent_server::{PollOutcome, PollerConfig};

    async fn start(config: AppConfig) -> (String, SignalHandler, tokio::task::JoinHandle<ClientResult<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let signals = SignalHandler::new();
        let task = tokio::spawn({
            let signals = signals.clone();
            async move { serve(&config, listener, signals).await }
        });
        (base, signals, task)
    }

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::parse(
            r#"
[oauth]
client_id = "client-1"
client_secret = "secret-1"
tenant_id = "common"
authority = "http://127.0.0.1:1"
timeout_secs = 1

[credentials]
open_browser = false

[polling]
graph_base_url = "http://127.0.0.1:1/v1.0"
"#,
        )
        .unwrap();
        config.refresh.network_retries = 0;
        config
    }

    #[tokio::test]
    async fn serves_routes_until_shutdown() {
        let (base, signals, task) = start(offline_config()).await;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        let body = client
            .get(format!("{}/next-event", base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "No events");

        let login = client.get(format!("{}/login", base)).send().await.unwrap();
        assert_eq!(login.status(), reqwest::StatusCode::FOUND);
        let location = login.headers()["location"].to_str().unwrap().to_string();
        assert!(location.starts_with("http://127.0.0.1:1/common/oauth2/v2.0/authorize?"));

        signals.trigger_shutdown();
        let result = tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn failed_callback_redirects_to_error_page() {
        let (base, signals, task) = start(offline_config()).await;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        let response = client
            .get(format!("{}/callback?error=access_denied", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["location"], "/error");

        signals.trigger_shutdown();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn session_start_triggers_poll() {
        let scheduler = Scheduler::new(PollerConfig::new(Duration::from_secs(300)));
        let (tx, rx) = watch::channel(SupervisorState::Idle);
        let cancel = CancellationToken::new();
        let watcher = tokio::spawn(poll_on_session_start(rx, scheduler.handle(), cancel.clone()));

        let calls = Arc::new(AtomicU32::new(0));
        let poller = tokio::spawn({
            let calls = Arc::clone(&calls);
            scheduler.run(
                move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(PollOutcome::Updated)
                    }
                },
                cancel.clone(),
            )
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tx.send(SupervisorState::Running).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // A lost session does not poll.
        tx.send(SupervisorState::Stopped(StopReason::Cancelled)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cancel.cancel();
        watcher.await.unwrap();
        poller.await.unwrap();
    }

    #[tokio::test]
    async fn invalid_config_is_fatal() {
        let err = run(&AppConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }
}
