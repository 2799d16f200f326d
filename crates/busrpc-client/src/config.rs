use std::time::Duration;

/// Client configuration
///
/// The default exchange is set once at construction and read-only after
/// that; per-call [`RequestOverrides`] can point a single call elsewhere.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Exchange used when a call does not name one
    pub default_exchange: String,

    /// Window to wait for replies before a request settles
    pub reply_timeout: Duration,

    /// Replies collected before a request settles
    pub reply_limit: usize,

    /// Publish messages as persistent unless a call overrides it
    pub persistent: bool,
}

impl ClientConfig {
    pub fn new(default_exchange: impl Into<String>) -> Self {
        Self {
            default_exchange: default_exchange.into(),
            reply_timeout: Duration::from_secs(30),
            reply_limit: 1,
            persistent: true,
        }
    }

    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn reply_limit(mut self, limit: usize) -> Self {
        self.reply_limit = limit;
        self
    }
}

/// Per-call overrides for [`crate::RpcClient`] operations
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub reply_timeout: Option<Duration>,
    pub reply_limit: Option<usize>,
    pub persistent: Option<bool>,
    pub exchange: Option<String>,
}

impl RequestOverrides {
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    pub fn reply_limit(mut self, limit: usize) -> Self {
        self.reply_limit = Some(limit);
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }
}
