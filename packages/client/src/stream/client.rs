//! Self-healing stats stream client.
//!
//! ## 状態遷移
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> (backoff) -> Connecting ...
//!       \______________\______________\____________ close() / drop ___> Torn-down
//! ```
//!
//! The worker task owns the socket and the reconnect timer. Teardown is a
//! flag flip that the worker observes while connecting, reading or sleeping,
//! so no connection attempt starts after `close()` returns.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use tokio::{sync::watch, task::JoinHandle};

use crate::{config::StreamConfig, error::StreamError};

use super::{
    backoff::Backoff,
    connector::{Connector, Frame, StreamConnection, TungsteniteConnector},
    snapshot::DashboardStats,
    url::stream_url,
};

/// What the owner of a stream client can observe
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState<T = DashboardStats> {
    /// Last successfully decoded snapshot; survives disconnects
    pub latest_snapshot: Option<T>,
    pub connected: bool,
    /// Close-then-reconnect cycles since the last successful open
    pub retry_count: u32,
}

impl<T> Default for StreamState<T> {
    fn default() -> Self {
        Self {
            latest_snapshot: None,
            connected: false,
            retry_count: 0,
        }
    }
}

/// Handle to a running stream worker.
///
/// Dropping the handle tears the worker down.
pub struct StreamClient<T = DashboardStats> {
    state: watch::Receiver<StreamState<T>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> StreamClient<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Start a client that connects over WebSocket
    pub fn spawn(config: StreamConfig) -> Self {
        Self::spawn_with(config, Arc::new(TungsteniteConnector))
    }

    /// Start a client using the given connector
    pub fn spawn_with(config: StreamConfig, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, state_rx) = watch::channel(StreamState::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = StreamWorker {
            backoff: Backoff::new(config.backoff),
            config,
            connector,
            state: state_tx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        Self {
            state: state_rx,
            shutdown: shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Receiver notified on every connectivity or snapshot change
    pub fn subscribe(&self) -> watch::Receiver<StreamState<T>> {
        self.state.clone()
    }

    pub fn state(&self) -> StreamState<T> {
        self.state.borrow().clone()
    }

    pub fn latest_snapshot(&self) -> Option<T> {
        self.state.borrow().latest_snapshot.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }
}

impl<T> StreamClient<T> {
    /// Tear the client down.
    ///
    /// Cancels any scheduled reconnect and closes the live socket. Safe to
    /// call any number of times, including before the first connection.
    ///
    /// Returns as soon as teardown is requested: no new connection attempt
    /// starts after that point, but the worker task sends the close frame and
    /// releases the socket asynchronously. Await [`StreamClient::closed`] to
    /// wait until it has.
    pub fn close(&self) {
        if !self.shutdown.send_replace(true) {
            tracing::info!("Stream client torn down");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait until the worker has released its socket and timer
    pub async fn closed(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::warn!("Stream worker ended abnormally: {}", e);
        }
    }
}

impl<T> Drop for StreamClient<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// How one connection attempt ended
enum Attempt {
    /// Refused, failed or closed: schedule a reconnect
    Closed,
    TornDown,
}

enum Event {
    Shutdown,
    Frame(Option<Result<Frame, StreamError>>),
}

struct StreamWorker<T> {
    config: StreamConfig,
    connector: Arc<dyn Connector>,
    backoff: Backoff,
    state: watch::Sender<StreamState<T>>,
    shutdown: watch::Receiver<bool>,
}

impl<T> StreamWorker<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn run(mut self) {
        loop {
            if self.is_torn_down() {
                break;
            }

            if let Attempt::TornDown = self.attempt().await {
                break;
            }
            self.state.send_modify(|state| state.connected = false);

            if self.is_torn_down() {
                break;
            }

            let delay = self.backoff.next_delay();
            let retry_count = self.backoff.retry_count();
            self.state
                .send_modify(|state| state.retry_count = retry_count);
            tracing::info!(
                "Reconnecting in {} ms (retry {})",
                delay.as_millis(),
                retry_count
            );

            let torn_down = tokio::select! {
                _ = wait_for_shutdown(&mut self.shutdown) => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if torn_down {
                break;
            }
        }

        self.state.send_modify(|state| state.connected = false);
        tracing::debug!("Stream worker stopped");
    }

    async fn attempt(&mut self) -> Attempt {
        let url = match stream_url(
            &self.config.origin,
            &self.config.path,
            self.config.token.as_deref(),
        ) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Cannot open stats stream: {}", e);
                return Attempt::Closed;
            }
        };

        tracing::info!(
            "Connecting to {}{}",
            url.origin().ascii_serialization(),
            url.path()
        );
        let connector = Arc::clone(&self.connector);
        let timeout = self.config.connect_timeout;
        let connected = tokio::select! {
            _ = wait_for_shutdown(&mut self.shutdown) => return Attempt::TornDown,
            result = tokio::time::timeout(timeout, connector.connect(url.as_str())) => {
                result.unwrap_or_else(|_| {
                    Err(StreamError::Connect(format!(
                        "not open after {} ms",
                        timeout.as_millis()
                    )))
                })
            }
        };
        let mut connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Stats stream connection failed: {}", e);
                return Attempt::Closed;
            }
        };

        if self.is_torn_down() {
            connection.close().await;
            return Attempt::TornDown;
        }

        self.backoff.reset();
        self.state.send_modify(|state| {
            state.connected = true;
            state.retry_count = 0;
        });
        tracing::info!("Stats stream connected");

        self.read(connection.as_mut()).await
    }

    async fn read(&mut self, connection: &mut dyn StreamConnection) -> Attempt {
        loop {
            let event = tokio::select! {
                _ = wait_for_shutdown(&mut self.shutdown) => Event::Shutdown,
                frame = connection.next_frame() => Event::Frame(frame),
            };

            match event {
                Event::Shutdown => {
                    connection.close().await;
                    return Attempt::TornDown;
                }
                Event::Frame(None) => {
                    tracing::info!("Stats stream closed by server");
                    return Attempt::Closed;
                }
                Event::Frame(Some(Err(e))) => {
                    tracing::warn!("Stats stream failed: {}", e);
                    return Attempt::Closed;
                }
                Event::Frame(Some(Ok(Frame::Text(text)))) => self.accept(&text),
                Event::Frame(Some(Ok(Frame::Ignored))) => {}
            }
        }
    }

    /// Publish a decoded snapshot; malformed frames are dropped
    fn accept(&self, text: &str) {
        match serde_json::from_str::<T>(text) {
            Ok(snapshot) => self
                .state
                .send_modify(|state| state.latest_snapshot = Some(snapshot)),
            Err(e) => tracing::debug!("Dropping malformed stats frame: {}", e),
        }
    }

    fn is_torn_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Resolves once teardown is requested or the client handle is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|torn_down| *torn_down).await;
}
