//! Refresh coordination shared by every request of one process.
//!
//! ## 責務
//!
//! - Decide which failing request leads a refresh episode
//! - Park every other failing request until that episode settles
//! - Hand the parked requests back in the order they arrived
//!
//! The coordinator only holds state. Running the refresh and replaying the
//! parked requests is the gateway's job.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::{
    context::Context,
    error::GatewayError,
    gateway::request::{ApiRequest, ApiResponse},
};

/// Outcome delivered to a parked caller
pub(crate) type Settlement = Result<ApiResponse, GatewayError>;

/// A request that failed with 401 and waits for a refresh outcome
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub request: ApiRequest,
    pub context: Context,
    /// Error the request originally failed with, returned if the refresh fails
    pub error: GatewayError,
    pub reply: oneshot::Sender<Settlement>,
}

impl PendingRequest {
    /// Settle the request; a caller that stopped waiting is ignored
    pub fn settle(self, settlement: Settlement) {
        if self.reply.send(settlement).is_err() {
            tracing::debug!(
                "Caller of {} {} stopped waiting before it was settled",
                self.request.method,
                self.request.path
            );
        }
    }

    /// Settle the request with its original error
    pub fn reject(self) {
        let error = self.error.clone();
        self.settle(Err(error));
    }
}

/// Result of offering a failed request to the coordinator
#[derive(Debug)]
pub(crate) enum Admission {
    /// No refresh was running: the caller now owns the episode
    Lead(PendingRequest),
    /// A refresh is running: the request was parked
    Queued,
}

#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    pending: Vec<PendingRequest>,
    episodes: u64,
}

/// Process-wide refresh state: one `refreshing` flag plus the parked requests.
///
/// Construct one per process and hand it to the gateway; every gateway clone
/// shares it.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a refresh episode is in flight
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of parked requests
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of refresh episodes started so far
    pub fn episodes(&self) -> u64 {
        self.lock().episodes
    }

    /// Either claim the refresh slot or park the request behind the running episode
    pub(crate) fn admit(&self, pending: PendingRequest) -> Admission {
        let mut state = self.lock();
        if state.refreshing {
            state.pending.push(pending);
            Admission::Queued
        } else {
            state.refreshing = true;
            state.episodes += 1;
            Admission::Lead(pending)
        }
    }

    /// Take the parked requests while keeping the episode open
    pub(crate) fn take_pending(&self) -> Vec<PendingRequest> {
        std::mem::take(&mut self.lock().pending)
    }

    /// Take the parked requests, closing the episode once nothing is left.
    ///
    /// Returns an empty list exactly when the episode was closed, so a request
    /// can never be parked after the last drain.
    pub(crate) fn finish_or_take(&self) -> Vec<PendingRequest> {
        let mut state = self.lock();
        if state.pending.is_empty() {
            state.refreshing = false;
        }
        std::mem::take(&mut state.pending)
    }

    /// Close the episode and take everything still parked
    pub(crate) fn finish(&self) -> Vec<PendingRequest> {
        let mut state = self.lock();
        state.refreshing = false;
        std::mem::take(&mut state.pending)
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
