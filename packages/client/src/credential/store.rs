//! Per-context credential stores.
//!
//! ## Retention
//!
//! - Customer: access and refresh tokens are kept as values; the access token
//!   is sent as a bearer token and the refresh token goes to the portal
//!   refresh endpoint.
//! - Staff: the server keeps both tokens in httpOnly cookies, so the store only
//!   records that a session exists. The values handed to `set` are discarded.

use std::{sync::Arc, time::Duration};

use crate::context::Context;

use super::storage::{MemoryStorage, TokenStorage};

/// Value recorded for the Staff context in place of the real tokens
pub const STAFF_SESSION_MARKER: &str = "cookie-session";

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Access token lifetime
pub const ACCESS_TTL: Duration = DAY;

/// Refresh token lifetime
pub const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retention {
    /// Keep both token values
    Values,
    /// Keep a presence marker only
    PresenceOnly,
}

/// Storage and retrieval of one context's session credentials
pub struct CredentialStore {
    context: Context,
    storage: Arc<dyn TokenStorage>,
    access_key: &'static str,
    refresh_key: &'static str,
    retention: Retention,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl CredentialStore {
    /// Staff store (presence only, cookie-backed session)
    pub fn staff(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            context: Context::Staff,
            storage,
            access_key: "ssmspl_access_token",
            refresh_key: "ssmspl_refresh_token",
            retention: Retention::PresenceOnly,
            access_ttl: REFRESH_TTL,
            refresh_ttl: REFRESH_TTL,
        }
    }

    /// Customer portal store (token values)
    pub fn customer(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            context: Context::Customer,
            storage,
            access_key: "ssmspl_portal_access_token",
            refresh_key: "ssmspl_portal_refresh_token",
            retention: Retention::Values,
            access_ttl: ACCESS_TTL,
            refresh_ttl: REFRESH_TTL,
        }
    }

    /// Override the token lifetimes
    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    pub fn context(&self) -> Context {
        self.context
    }

    /// Persist a freshly issued token pair
    pub fn set(&self, access_token: &str, refresh_token: &str) {
        match self.retention {
            Retention::Values => {
                self.write(self.access_key, access_token, self.access_ttl);
                self.write(self.refresh_key, refresh_token, self.refresh_ttl);
            }
            Retention::PresenceOnly => self.mark_present(),
        }
    }

    /// Replace the access token, keeping the stored refresh token
    pub fn replace_access(&self, access_token: &str) {
        match self.retention {
            Retention::Values => self.write(self.access_key, access_token, self.access_ttl),
            Retention::PresenceOnly => self.mark_present(),
        }
    }

    /// Record that a cookie-backed session exists.
    ///
    /// For value-retaining stores this is a no-op: presence there is the token itself.
    pub fn mark_present(&self) {
        if self.retention == Retention::PresenceOnly {
            self.write(self.access_key, STAFF_SESSION_MARKER, self.access_ttl);
        }
    }

    /// Current access token, or the session marker for the Staff context
    pub fn get(&self) -> Option<String> {
        self.read(self.access_key)
    }

    /// Stored refresh token (never available for the Staff context)
    pub fn refresh_token(&self) -> Option<String> {
        match self.retention {
            Retention::Values => self.read(self.refresh_key),
            Retention::PresenceOnly => None,
        }
    }

    /// Token to send as `Authorization: Bearer`, if this context uses one
    pub fn bearer(&self) -> Option<String> {
        match self.retention {
            Retention::Values => self.get(),
            Retention::PresenceOnly => None,
        }
    }

    /// Remove both values. Idempotent, never fails.
    pub fn clear(&self) {
        for key in [self.access_key, self.refresh_key] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!("Failed to clear {} credential '{}': {}", self.context, key, e);
            }
        }
        tracing::debug!("Cleared {} credentials", self.context);
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    fn write(&self, key: &str, value: &str, ttl: Duration) {
        if let Err(e) = self.storage.set(key, value, ttl) {
            tracing::warn!("Failed to store {} credential '{}': {}", self.context, key, e);
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        self.storage.get(key).unwrap_or_else(|e| {
            tracing::warn!("Failed to read {} credential '{}': {}", self.context, key, e);
            None
        })
    }
}

/// The Staff and Customer stores side by side
#[derive(Clone)]
pub struct CredentialStores {
    staff: Arc<CredentialStore>,
    customer: Arc<CredentialStore>,
}

impl CredentialStores {
    pub fn new(staff: CredentialStore, customer: CredentialStore) -> Self {
        Self {
            staff: Arc::new(staff),
            customer: Arc::new(customer),
        }
    }

    /// Both stores over one shared in-memory medium
    pub fn in_memory() -> Self {
        let storage: Arc<dyn TokenStorage> = Arc::new(MemoryStorage::new());
        Self::new(
            CredentialStore::staff(storage.clone()),
            CredentialStore::customer(storage),
        )
    }

    /// Store for the given context
    pub fn for_context(&self, context: Context) -> &CredentialStore {
        match context {
            Context::Staff => &self.staff,
            Context::Customer => &self.customer,
        }
    }
}
