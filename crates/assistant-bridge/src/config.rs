use std::time::Duration;

use crate::errors::BridgeError;

/// Default assistants API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for `AssistantClient`.
///
/// Credentials are carried here and handed to the client at construction;
/// nothing is read from process-wide state after that.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Optional organization id sent as `OpenAI-Organization`.
    pub organization_id: Option<String>,
    /// Base URL including the API version segment.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Value of the `OpenAI-Beta` header.
    pub assistants_beta: String,
    /// TCP/TLS connect timeout for every request.
    pub connect_timeout: Duration,
    /// Total timeout for unary requests. Streams are bounded by the watchdog.
    pub request_timeout: Duration,
    /// Maximum silence on a stream before the watchdog ends it. `None` disables it.
    pub stream_inactivity_timeout: Option<Duration>,
    /// How often the watchdog checks for inactivity.
    pub watchdog_interval: Duration,
    /// Delay between run status polls.
    pub poll_interval: Duration,
    /// How many times an add-message conflict is cancelled and retried.
    pub max_conflict_retries: u32,
}

impl BridgeConfig {
    /// Creates a config with defaults and the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            assistants_beta: "assistants=v2".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            stream_inactivity_timeout: Some(Duration::from_secs(30)),
            watchdog_interval: Duration::from_secs(1),
            poll_interval: Duration::from_millis(500),
            max_conflict_retries: 1,
        }
    }

    /// Builds a config from `OPENAI_API_KEY`, `OPENAI_ORG_ID`, and `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, BridgeError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(BridgeError::Config(
                "missing OPENAI_API_KEY for assistant client".into(),
            ));
        }
        let mut config = Self::new(api_key);
        if let Ok(org) = std::env::var("OPENAI_ORG_ID")
            && !org.trim().is_empty()
        {
            config = config.organization_id(org);
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config = config.base_url(base_url);
        }
        Ok(config)
    }

    /// Sets the organization id header.
    pub fn organization_id(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the `OpenAI-Beta` header value.
    pub fn assistants_beta(mut self, value: impl Into<String>) -> Self {
        self.assistants_beta = value.into();
        self
    }

    /// Overrides the unary request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets or disables the stream inactivity timeout.
    pub fn stream_inactivity_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_inactivity_timeout = timeout;
        self
    }

    /// Overrides the watchdog check cadence.
    pub fn watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    /// Overrides the delay between status polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the add-message conflict retry bound.
    pub fn max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), BridgeError> {
        if self.api_key.trim().is_empty() {
            return Err(BridgeError::Config("api_key must not be empty".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(BridgeError::Config("base_url must not be empty".into()));
        }
        if self.watchdog_interval.is_zero() {
            return Err(BridgeError::Config(
                "watchdog_interval must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn stream_options(&self) -> crate::session::StreamOptions {
        crate::session::StreamOptions {
            inactivity_timeout: self.stream_inactivity_timeout,
            watchdog_interval: self.watchdog_interval,
        }
    }
}
