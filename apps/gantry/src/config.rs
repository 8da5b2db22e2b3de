use std::env;
use std::time::Duration;
#[cfg(test)]
use std::sync::Mutex;

use url::Url;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8848";

/// Gantry console configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the simulator's HTTP API (defaults to the local bind).
    pub base_url: Url,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// How many events to request per diagnostics poll.
    pub event_window: usize,
    /// How many log lines to request per log-tail poll.
    pub log_window: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let raw = env::var("GANTRY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        // Normalize localhost to IPv4 to avoid IPv6 (::1) preference
        let raw = if raw.contains("localhost") {
            raw.replacen("localhost", "127.0.0.1", 1)
        } else {
            raw
        };
        let base_url = Url::parse(&raw).unwrap_or_else(|_| {
            Url::parse(DEFAULT_BASE_URL).expect("default base url parses")
        });

        Self {
            base_url,
            request_timeout: env_millis("GANTRY_HTTP_TIMEOUT_MS", 4_000),
            connect_timeout: env_millis("GANTRY_CONNECT_TIMEOUT_MS", 2_000),
            event_window: env_usize("GANTRY_EVENT_WINDOW", 300),
            log_window: env_usize("GANTRY_LOG_WINDOW", 200),
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url parses"),
            request_timeout: Duration::from_millis(4_000),
            connect_timeout: Duration::from_millis(2_000),
            event_window: 300,
            log_window: 200,
        }
    }
}

fn env_millis(key: &str, default_ms: u64) -> Duration {
    let ms = env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
