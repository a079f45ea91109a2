//! Stub backend state: issued sessions, counters and stream control.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use jetty_shared::time::Clock;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::config::DevServerConfig;

/// Session realm: back office or customer portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Realm {
    Staff,
    Portal,
}

/// Token payload answered by login and refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Clone)]
struct AccessGrant {
    subject: String,
    issued_at: i64,
}

/// Access and refresh tokens issued in one realm
#[derive(Debug, Default)]
pub struct SessionBook {
    access: HashMap<String, AccessGrant>,
    refresh: HashMap<String, String>,
}

impl SessionBook {
    /// Issue a fresh token pair for `subject`
    pub fn issue(&mut self, subject: &str, now_millis: i64) -> TokenResponse {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();

        self.access.insert(
            access_token.clone(),
            AccessGrant {
                subject: subject.to_string(),
                issued_at: now_millis,
            },
        );
        self.refresh
            .insert(refresh_token.clone(), subject.to_string());

        TokenResponse {
            access_token,
            refresh_token,
            token_type: "bearer",
        }
    }

    /// Trade a refresh token for a new pair; the old refresh token is spent
    pub fn rotate(&mut self, refresh_token: &str, now_millis: i64) -> Option<TokenResponse> {
        let subject = self.refresh.remove(refresh_token)?;
        Some(self.issue(&subject, now_millis))
    }

    /// Subject and issue time of a live access token
    pub fn authenticate(
        &self,
        access_token: &str,
        now_millis: i64,
        ttl_millis: i64,
    ) -> Option<(String, i64)> {
        let grant = self.access.get(access_token)?;
        if now_millis - grant.issued_at >= ttl_millis {
            return None;
        }
        Some((grant.subject.clone(), grant.issued_at))
    }

    /// Revoke whichever of the two tokens are given
    pub fn revoke(&mut self, access_token: Option<&str>, refresh_token: Option<&str>) {
        if let Some(token) = access_token {
            self.access.remove(token);
        }
        if let Some(token) = refresh_token {
            self.refresh.remove(token);
        }
    }

    /// Invalidate every access token, keeping refresh tokens usable
    pub fn expire_access(&mut self) {
        self.access.clear();
    }
}

/// Shared application state
pub struct AppState {
    pub config: DevServerConfig,
    pub clock: Arc<dyn Clock>,
    pub staff_sessions: Mutex<SessionBook>,
    pub portal_sessions: Mutex<SessionBook>,
    /// When false both refresh endpoints answer 401
    pub refresh_enabled: AtomicBool,
    pub staff_refresh_calls: AtomicUsize,
    pub portal_refresh_calls: AtomicUsize,
    /// Bumped to make every open stream drop its connection
    pub stream_epoch: watch::Sender<u64>,
    pub streams_accepted: AtomicUsize,
    pub streams_live: AtomicUsize,
    /// Upgrades closed with 4001 for lack of a valid access token
    pub streams_rejected: AtomicUsize,
    /// Running ticket counter feeding the stats snapshots
    pub tickets_sold: AtomicU64,
}

impl AppState {
    pub fn new(config: DevServerConfig, clock: Arc<dyn Clock>) -> Self {
        let (stream_epoch, _) = watch::channel(0);
        Self {
            config,
            clock,
            staff_sessions: Mutex::new(SessionBook::default()),
            portal_sessions: Mutex::new(SessionBook::default()),
            refresh_enabled: AtomicBool::new(true),
            staff_refresh_calls: AtomicUsize::new(0),
            portal_refresh_calls: AtomicUsize::new(0),
            stream_epoch,
            streams_accepted: AtomicUsize::new(0),
            streams_live: AtomicUsize::new(0),
            streams_rejected: AtomicUsize::new(0),
            tickets_sold: AtomicU64::new(0),
        }
    }

    pub fn sessions(&self, realm: Realm) -> &Mutex<SessionBook> {
        match realm {
            Realm::Staff => &self.staff_sessions,
            Realm::Portal => &self.portal_sessions,
        }
    }

    pub fn refresh_calls(&self, realm: Realm) -> &AtomicUsize {
        match realm {
            Realm::Staff => &self.staff_refresh_calls,
            Realm::Portal => &self.portal_refresh_calls,
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn access_ttl_millis(&self) -> i64 {
        i64::try_from(self.config.access_ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Force every open stream to disconnect
    pub fn kick_streams(&self) {
        self.stream_epoch.send_modify(|epoch| *epoch += 1);
    }

    pub fn is_refresh_enabled(&self) -> bool {
        self.refresh_enabled.load(Ordering::SeqCst)
    }
}
