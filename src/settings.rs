use once_cell::sync::Lazy;
use std::{env, time::Duration};

const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Holds all tunables, read-once from ENV with fallbacks.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub session_cookie: Option<String>,
    pub resync_min_delay: Duration,
    pub failure_retry_delay: Duration,
    pub search_debounce: Duration,
    pub request_timeout: Duration,
    pub event_buffer_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_url: DEFAULT_API_URL.to_string(),
            session_cookie: None,
            resync_min_delay: Duration::from_millis(500),
            failure_retry_delay: Duration::from_millis(500),
            search_debounce: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
            event_buffer_capacity: 100,
        }
    }
}

impl Settings {
    /// Sign-in redirect endpoint on the API.
    pub fn login_url(&self) -> String {
        format!("{}/login", self.api_url.trim_end_matches('/'))
    }

    pub fn from_env() -> Self {
        // optionally load .env
        let _ = dotenvy::dotenv();

        // helper to parse usize
        fn parse_usize(var: &str, default: usize) -> usize {
            env::var(var)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        // helper to parse seconds into Duration
        fn parse_secs(var: &str, default: Duration) -> Duration {
            env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        }

        // helper to parse millis into Duration
        fn parse_millis(var: &str, default: Duration) -> Duration {
            env::var(var)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        }

        let defaults = Settings::default();
        Settings {
            api_url: env::var("RADIO_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            session_cookie: env::var("RADIO_SESSION_COOKIE")
                .ok()
                .filter(|v| !v.is_empty()),
            resync_min_delay: parse_millis("RESYNC_MIN_DELAY_MS", defaults.resync_min_delay),
            failure_retry_delay: parse_millis("FAILURE_RETRY_MS", defaults.failure_retry_delay),
            search_debounce: parse_millis("SEARCH_DEBOUNCE_MS", defaults.search_debounce),
            request_timeout: parse_secs("REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            event_buffer_capacity: parse_usize(
                "EVENT_BUFFER_CAPACITY",
                defaults.event_buffer_capacity,
            ),
        }
    }
}

/// Global settings instance
pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);
