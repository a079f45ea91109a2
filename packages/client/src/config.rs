//! Configuration for the gateway and the stream client.

use std::time::Duration;

use crate::{context::Context, stream::BackoffPolicy};

/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default page origin for the stats stream
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";

/// Path of the stats stream endpoint on the page origin
pub const DEFAULT_STREAM_PATH: &str = "/api/dashboard/ws";

/// Upper bound for one HTTP exchange, refresh calls included
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for opening the stream socket, handshake included
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoints and routes belonging to one credential context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEndpoints {
    pub login: String,
    pub refresh: String,
    pub logout: String,
    pub whoami: String,
    /// Page route the browser is sent to when the session cannot be recovered
    pub login_route: String,
}

impl ContextEndpoints {
    /// Staff/admin endpoints
    pub fn staff() -> Self {
        Self {
            login: "/api/auth/login".to_string(),
            refresh: "/api/auth/refresh".to_string(),
            logout: "/api/auth/logout".to_string(),
            whoami: "/api/auth/me".to_string(),
            login_route: "/login".to_string(),
        }
    }

    /// Customer portal endpoints
    pub fn customer() -> Self {
        Self {
            login: "/api/portal/auth/login".to_string(),
            refresh: "/api/portal/auth/refresh".to_string(),
            logout: "/api/portal/auth/logout".to_string(),
            whoami: "/api/portal/auth/me".to_string(),
            login_route: "/customer/login".to_string(),
        }
    }
}

/// Request gateway configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Backend base URL prepended to relative request paths
    pub base_url: String,
    /// Exchanges still unanswered after this long fail with a transport error
    pub request_timeout: Duration,
    pub staff: ContextEndpoints,
    pub customer: ContextEndpoints,
}

impl GatewayConfig {
    /// Create a configuration with default endpoints against `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            staff: ContextEndpoints::staff(),
            customer: ContextEndpoints::customer(),
        }
    }

    /// Endpoints for the given context
    pub fn endpoints(&self, context: Context) -> &ContextEndpoints {
        match context {
            Context::Staff => &self.staff,
            Context::Customer => &self.customer,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// Stats stream client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Origin of the hosting page (`http(s)://host[:port]`)
    pub origin: String,
    /// Stream endpoint path on that origin
    pub path: String,
    /// Access token sent as the `token` query parameter, for backends that
    /// authenticate the stream and cannot see the session cookie
    pub token: Option<String>,
    /// A socket not open after this long counts as a failed attempt
    pub connect_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl StreamConfig {
    /// Create a configuration for the default stream path on `origin`
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            path: DEFAULT_STREAM_PATH.to_string(),
            token: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Authenticate the stream with an access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ORIGIN)
    }
}
