//! Server execution logic.

use std::{
    net::SocketAddr,
    sync::{Arc, atomic::Ordering},
};

use axum::{
    Router,
    routing::{get, post},
};
use jetty_shared::time::SystemClock;
use tokio::{sync::oneshot, task::JoinHandle};
use tower_http::trace::TraceLayer;

use crate::{
    config::DevServerConfig,
    error::DevServerError,
    handler::{
        dashboard_ws, health_check, list_bookings, list_branches, portal_login, portal_logout,
        portal_me, portal_refresh, staff_login, staff_logout, staff_me, staff_refresh,
    },
    signal::shutdown_signal,
    state::{AppState, Realm},
};

/// Stub ferry-ticketing backend
///
/// # Example
///
/// ```ignore
/// let server = DevServer::new(DevServerConfig::default());
/// server.run("127.0.0.1".to_string(), 8000).await?;
/// ```
pub struct DevServer {
    state: Arc<AppState>,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            state: Arc::new(AppState::new(config, Arc::new(SystemClock))),
        }
    }

    /// Run until Ctrl+C
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8000)
    pub async fn run(self, host: String, port: u16) -> Result<(), DevServerError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = bind(&bind_addr).await?;

        tracing::info!("Stub backend listening on {}", listener.local_addr()?);
        tracing::info!("Stats stream at ws://{}/api/dashboard/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on a background task (port 0 picks a free port)
    pub async fn spawn(self, bind_addr: &str) -> Result<DevServerHandle, DevServerError> {
        let listener = bind(bind_addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = router(Arc::clone(&self.state));
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!("Stub backend stopped: {}", e);
            }
        });
        tracing::info!("Stub backend listening on {}", addr);

        Ok(DevServerHandle {
            addr,
            state: self.state,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Running stub backend with knobs for driving session and stream scenarios.
///
/// Dropping the handle stops the server.
pub struct DevServerHandle {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl DevServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://host:port`, usable as gateway base URL and page origin
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Invalidate every issued access token in both realms
    pub async fn expire_access_tokens(&self) {
        self.state.staff_sessions.lock().await.expire_access();
        self.state.portal_sessions.lock().await.expire_access();
        tracing::info!("All access tokens expired");
    }

    pub fn set_refresh_enabled(&self, enabled: bool) {
        self.state.refresh_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Refresh calls received so far in a realm
    pub fn refresh_calls(&self, realm: Realm) -> usize {
        self.state.refresh_calls(realm).load(Ordering::SeqCst)
    }

    /// Drop every open stats stream, as a restart would
    pub fn kick_streams(&self) {
        self.state.kick_streams();
    }

    pub fn streams_accepted(&self) -> usize {
        self.state.streams_accepted.load(Ordering::SeqCst)
    }

    pub fn streams_live(&self) -> usize {
        self.state.streams_live.load(Ordering::SeqCst)
    }

    /// Stream upgrades turned away for lack of a valid access token
    pub fn streams_rejected(&self) -> usize {
        self.state.streams_rejected.load(Ordering::SeqCst)
    }

    /// Stop the server and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!("Stub backend task ended abnormally: {}", e);
        }
    }
}

impl Drop for DevServerHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // HTTP エンドポイント
        .route("/api/health", get(health_check))
        .route("/api/auth/login", post(staff_login))
        .route("/api/auth/refresh", post(staff_refresh))
        .route("/api/auth/me", get(staff_me))
        .route("/api/auth/logout", post(staff_logout))
        .route("/api/portal/auth/login", post(portal_login))
        .route("/api/portal/auth/refresh", post(portal_refresh))
        .route("/api/portal/auth/me", get(portal_me))
        .route("/api/portal/auth/logout", post(portal_logout))
        .route("/api/branches", get(list_branches))
        .route("/api/portal/bookings", get(list_bookings))
        // WebSocket エンドポイント
        .route("/api/dashboard/ws", get(dashboard_ws))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn bind(addr: &str) -> Result<tokio::net::TcpListener, DevServerError> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| DevServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}
