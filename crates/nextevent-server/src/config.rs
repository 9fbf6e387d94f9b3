//! Poller configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Calendar polling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Interval between polls.
    pub interval: Duration,
    /// File receiving the rendered next event. `None` disables it.
    pub status_file: Option<PathBuf>,
    /// Graph API root, without a trailing slash.
    pub graph_base_url: String,
    /// How far ahead of now events are fetched.
    pub lookahead: Duration,
    /// Timeout applied to each calendar request.
    pub request_timeout: Duration,
    /// Initial backoff after a failed poll.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            status_file: None,
            graph_base_url: Self::DEFAULT_GRAPH_BASE_URL.to_string(),
            lookahead: Duration::from_secs(24 * 60 * 60),
            request_timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
        }
    }
}

impl PollerConfig {
    pub const DEFAULT_GRAPH_BASE_URL: &'static str = "https://graph.microsoft.com/v1.0";

    /// Creates a config with the given poll interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_file = Some(path.into());
        self
    }

    pub fn with_graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.graph_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration, multiplier: f64) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates backoff delay based on consecutive failures.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(consecutive_failures - 1).unwrap_or(i32::MAX);
        let delay = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let max = self.max_backoff.as_secs_f64();

        Duration::from_secs_f64(delay.min(max))
    }
}
