//! Configuration for the notification engine.

use crate::error::{NotifyError, NotifyResult};
use std::time::Duration;
use url::Url;

const API_PATH: &str = "api/";
const PUSH_PATH: &str = "ws/notifications/";

/// Configuration for a notification session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the REST API (e.g. `http://localhost:8000/api/`).
    pub api_base: Url,
    /// Push channel URL without credentials
    /// (e.g. `ws://localhost:8000/ws/notifications/`).
    pub push_url: Url,
    /// Request timeout for REST calls.
    pub request_timeout: Duration,
    /// Longest a push handshake may take before the attempt counts as failed.
    pub handshake_timeout: Duration,
    /// Reconnect configuration for the push channel.
    pub reconnect: ReconnectConfig,
    /// Reconciliation poll configuration.
    pub poll: PollConfig,
}

impl EngineConfig {
    /// Derives the REST and push endpoints from the server's host URL.
    ///
    /// `http` maps to `ws` and `https` to `wss`; any path on `host` is kept
    /// as a prefix for both endpoints.
    pub fn for_host(host: &str) -> NotifyResult<Self> {
        let mut base = Url::parse(host)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);

        let push_scheme = match base.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(NotifyError::InvalidConfig(format!(
                    "unsupported host scheme '{other}', expected http or https"
                )))
            }
        };

        let api_base = base.join(API_PATH)?;
        let mut push_url = base.join(PUSH_PATH)?;
        push_url.set_scheme(push_scheme).map_err(|()| {
            NotifyError::InvalidConfig(format!("cannot derive {push_scheme} url from {host}"))
        })?;

        Ok(Self {
            api_base,
            push_url,
            request_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            poll: PollConfig::default(),
        })
    }

    /// Overrides the push channel URL.
    pub fn with_push_url(mut self, push_url: Url) -> Self {
        self.push_url = push_url;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the push handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the reconnect configuration.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Sets the poll configuration.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Push channel URL carrying `token` as a query parameter.
    ///
    /// The handshake cannot carry custom headers, so the credential travels
    /// in the URL.
    pub fn authenticated_push_url(&self, token: &str) -> Url {
        let mut url = self.push_url.clone();
        url.query_pairs_mut().append_pair("token", token);
        url
    }

    /// Resolves a REST endpoint relative to the API base.
    pub fn api_url(&self, path: &str) -> NotifyResult<Url> {
        Ok(self.api_base.join(path)?)
    }
}

/// Configuration for push channel reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Consecutive failed attempts before giving up (0 disables reconnection).
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl ReconnectConfig {
    /// Creates a reconnect configuration with the default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration that never reconnects.
    pub fn no_reconnect() -> Self {
        Self::new(0)
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before reconnect attempt `attempt` (0-indexed).
    ///
    /// `initial * multiplier^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = delay_secs.min(self.max_delay.as_secs_f64());

        // Round to whole milliseconds so schedules stay exact.
        Duration::from_millis(Duration::from_secs_f64(capped).as_millis() as u64)
    }

    /// Returns true if another attempt is allowed after `attempts` failures.
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Configuration for the reconciliation poller.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval between unread-count polls.
    pub interval: Duration,
}

impl PollConfig {
    /// Creates a poll configuration.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_endpoints_from_host() {
        let config = EngineConfig::for_host("http://localhost:8000").unwrap();
        assert_eq!(config.api_base.as_str(), "http://localhost:8000/api/");
        assert_eq!(
            config.push_url.as_str(),
            "ws://localhost:8000/ws/notifications/"
        );

        let config = EngineConfig::for_host("https://archive.example.com/app").unwrap();
        assert_eq!(config.api_base.as_str(), "https://archive.example.com/app/api/");
        assert_eq!(
            config.push_url.as_str(),
            "wss://archive.example.com/app/ws/notifications/"
        );
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(matches!(
            EngineConfig::for_host("ftp://example.com"),
            Err(NotifyError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::for_host("not a url"),
            Err(NotifyError::InvalidUrl(_))
        ));
    }

    #[test]
    fn token_travels_as_query_parameter() {
        let config = EngineConfig::for_host("http://localhost:8000").unwrap();
        let url = config.authenticated_push_url("a b&c");
        assert_eq!(
            url.as_str(),
            "ws://localhost:8000/ws/notifications/?token=a+b%26c"
        );
        // The configured URL itself never carries the token.
        assert!(config.push_url.query().is_none());
    }

    #[test]
    fn api_url_resolution() {
        let config = EngineConfig::for_host("http://localhost:8000").unwrap();
        assert_eq!(
            config.api_url("notifications/7/mark_as_read/").unwrap().as_str(),
            "http://localhost:8000/api/notifications/7/mark_as_read/"
        );
    }

    #[test]
    fn default_backoff_schedule() {
        let config = ReconnectConfig::default();
        let delays: Vec<u64> = (0..5)
            .map(|attempt| config.delay_for_attempt(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn attempt_budget() {
        let config = ReconnectConfig::default();
        assert!(config.allows_attempt(0));
        assert!(config.allows_attempt(4));
        assert!(!config.allows_attempt(5));
        assert!(!ReconnectConfig::no_reconnect().allows_attempt(0));
    }

    #[test]
    fn builder_overrides() {
        let config = EngineConfig::for_host("http://localhost:8000")
            .unwrap()
            .with_request_timeout(Duration::from_secs(5))
            .with_handshake_timeout(Duration::from_secs(3))
            .with_poll(PollConfig::new(Duration::from_secs(15)))
            .with_reconnect(ReconnectConfig::new(3).with_max_delay(Duration::from_secs(2)));

        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.poll.interval, Duration::from_secs(15));
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.delay_for_attempt(4), Duration::from_secs(2));
    }
}
