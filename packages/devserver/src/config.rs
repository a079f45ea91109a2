//! Stub backend settings.

use std::time::Duration;

/// Credentials and timings of the stub backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerConfig {
    /// Lifetime of an access token; refresh tokens never expire on their own
    pub access_ttl: Duration,
    /// Interval between two stats pushes on the stream
    pub push_interval: Duration,
    /// Artificial latency of both refresh endpoints
    pub refresh_delay: Duration,
    pub staff_username: String,
    pub staff_password: String,
    pub customer_email: String,
    pub customer_password: String,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(30 * 60),
            push_interval: Duration::from_secs(5),
            refresh_delay: Duration::ZERO,
            staff_username: "admin".to_string(),
            staff_password: "admin".to_string(),
            customer_email: "rider@example.com".to_string(),
            customer_password: "secret".to_string(),
        }
    }
}
