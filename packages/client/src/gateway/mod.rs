//! Request gateway: the one HTTP client every application call goes through.
//!
//! ## Refresh protocol
//!
//! 1. A request is dispatched with its context's credentials.
//! 2. A 401 from a non-auth endpoint is offered to the [`RefreshCoordinator`].
//!    The first failing request leads a refresh episode; any request failing
//!    while the episode runs is parked.
//! 3. The episode runs on its own task: one refresh call for the leader's
//!    context, then (success) parked requests are replayed in arrival order
//!    followed by the leader, or (failure) the context's store is cleared,
//!    every caller gets its original error and the page is redirected to the
//!    context's login route.
//! 4. Parked requests of the other context are held back. Once the episode
//!    closes they are offered to the coordinator again and get an episode of
//!    their own, with their own refresh call, cleanup and redirect.
//!
//! Replays go through [`GatewayInner::dispatch`] only, never back through the
//! recovery path, so a request is retried at most once.

mod coordinator;
mod navigator;
mod refresh;
mod request;
mod transport;

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::{
    config::GatewayConfig,
    context::{self, Context},
    credential::CredentialStores,
    error::GatewayError,
};

pub use coordinator::RefreshCoordinator;
pub use navigator::{MemoryNavigator, Navigator};
pub use refresh::TokenPair;
pub use request::{ApiRequest, ApiResponse};
pub use transport::{ReqwestTransport, Transport};

use coordinator::{Admission, PendingRequest};
use refresh::{record_session, refresh_session};

/// Drop-in request client with transparent session refresh.
///
/// Cheap to clone; clones share the transport, the credential stores and the
/// refresh coordinator.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    stores: CredentialStores,
    coordinator: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
}

impl Gateway {
    /// Assemble a gateway from its collaborators
    pub fn new(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        stores: CredentialStores,
        coordinator: Arc<RefreshCoordinator>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                config,
                transport,
                stores,
                coordinator,
                navigator,
            }),
        }
    }

    /// Gateway over HTTP with in-memory credential stores and a fresh coordinator
    pub fn connect(
        config: GatewayConfig,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, GatewayError> {
        let transport = ReqwestTransport::new(config.base_url.clone(), config.request_timeout)?;
        Ok(Self::new(
            config,
            Arc::new(transport),
            CredentialStores::in_memory(),
            Arc::new(RefreshCoordinator::new()),
            navigator,
        ))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn stores(&self) -> &CredentialStores {
        &self.inner.stores
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    /// Context a request would be sent under from the current page
    pub fn context_for(&self, request: &ApiRequest) -> Context {
        context::classify(&request.path, &self.inner.navigator.current_route())
    }

    /// Send a request, refreshing the session and retrying once on 401.
    ///
    /// # Returns
    ///
    /// * `Ok(ApiResponse)` - 2xx response (possibly from the replay after a refresh)
    /// * `Err(GatewayError)` - any other outcome, unchanged from what the
    ///   server or transport produced
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let context = self.context_for(&request);

        let result = self.inner.dispatch(&request, context).await;
        match result {
            Err(error) if error.is_unauthorized() && !context::is_auth_endpoint(&request.path) => {
                self.recover(request, context, error).await
            }
            other => other,
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::post(path).with_json(body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::put(path).with_json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Log in to the back office and record the staff session
    pub async fn login_staff(&self, username: &str, password: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "username": username, "password": password });
        self.login(Context::Staff, body).await
    }

    /// Log in to the customer portal and store the token pair
    pub async fn login_customer(&self, email: &str, password: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.login(Context::Customer, body).await
    }

    /// End the session of a context.
    ///
    /// The logout call is best-effort; local credentials are cleared whatever
    /// the server answers.
    pub async fn logout(&self, context: Context) {
        let endpoints = self.inner.config.endpoints(context);
        let request = ApiRequest::post(&endpoints.logout);

        if let Err(e) = self.inner.dispatch(&request, context).await {
            tracing::debug!("Logout call for {} context failed: {}", context, e);
        }
        self.inner.stores.for_context(context).clear();
        tracing::info!("Logged out of {} context", context);
    }

    /// Ask the backend who the current session belongs to
    pub async fn whoami(&self, context: Context) -> Result<ApiResponse, GatewayError> {
        let endpoints = self.inner.config.endpoints(context);
        let request = ApiRequest::get(&endpoints.whoami);
        self.inner.dispatch(&request, context).await
    }

    async fn login(&self, context: Context, body: serde_json::Value) -> Result<(), GatewayError> {
        let endpoints = self.inner.config.endpoints(context);
        let request = ApiRequest::post(&endpoints.login).with_json(body);

        let response = self.inner.dispatch(&request, context).await?;
        record_session(self.inner.stores.for_context(context), &response)
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        tracing::info!("Logged in to {} context", context);
        Ok(())
    }

    /// Join or start a refresh episode and wait for this request's settlement
    async fn recover(
        &self,
        request: ApiRequest,
        context: Context,
        error: GatewayError,
    ) -> Result<ApiResponse, GatewayError> {
        let (reply, settled) = oneshot::channel();
        let pending = PendingRequest {
            request,
            context,
            error,
            reply,
        };

        match self.inner.coordinator.admit(pending) {
            Admission::Lead(leader) => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move { inner.run_episodes(leader).await });
            }
            Admission::Queued => {
                tracing::debug!("Refresh already in flight, request parked");
            }
        }

        settled.await.unwrap_or(Err(GatewayError::RefreshAbandoned))
    }
}

impl GatewayInner {
    /// Execute a request once with its context's credentials
    async fn dispatch(
        &self,
        request: &ApiRequest,
        context: Context,
    ) -> Result<ApiResponse, GatewayError> {
        let bearer = self.stores.for_context(context).bearer();
        tracing::debug!("{} {} ({} context)", request.method, request.path, context);

        let response = self
            .transport
            .execute(request, bearer.as_deref())
            .await?;
        response.into_result()
    }

    /// Run episodes until no held-back request is left waiting for one
    async fn run_episodes(&self, leader: PendingRequest) {
        let mut next = Some(leader);
        while let Some(leader) = next.take() {
            let held_back = self.run_episode(leader).await;
            next = self.readmit(held_back);
        }
    }

    /// Run one refresh episode to completion.
    ///
    /// Returns the parked requests of the other context, untouched.
    async fn run_episode(&self, leader: PendingRequest) -> Vec<PendingRequest> {
        let context = leader.context;
        let store = self.stores.for_context(context);
        tracing::info!("Access token rejected in {} context, refreshing session", context);

        match refresh_session(
            self.transport.as_ref(),
            self.config.endpoints(context),
            store,
        )
        .await
        {
            Ok(()) => {
                tracing::info!("Session refreshed for {} context", context);
                self.replay(leader).await
            }
            Err(e) => {
                tracing::warn!("Session refresh failed for {} context: {}", context, e);
                self.abandon(leader)
            }
        }
    }

    /// Replay parked requests in arrival order, then the leader, then any stragglers
    async fn replay(&self, leader: PendingRequest) -> Vec<PendingRequest> {
        let context = leader.context;
        let mut held_back = Vec::new();

        loop {
            let batch = self.coordinator.take_pending();
            if batch.is_empty() {
                break;
            }
            self.replay_batch(batch, context, &mut held_back).await;
        }

        let result = self.dispatch(&leader.request, leader.context).await;
        leader.settle(result);

        loop {
            let batch = self.coordinator.finish_or_take();
            if batch.is_empty() {
                break;
            }
            self.replay_batch(batch, context, &mut held_back).await;
        }
        held_back
    }

    async fn replay_batch(
        &self,
        batch: Vec<PendingRequest>,
        context: Context,
        held_back: &mut Vec<PendingRequest>,
    ) {
        tracing::debug!("Replaying {} parked request(s)", batch.len());
        for pending in batch {
            if pending.context != context {
                held_back.push(pending);
                continue;
            }
            let result = self.dispatch(&pending.request, pending.context).await;
            pending.settle(result);
        }
    }

    /// Unrecoverable session: clear, redirect, reject everyone of this context
    fn abandon(&self, leader: PendingRequest) -> Vec<PendingRequest> {
        let context = leader.context;
        self.stores.for_context(context).clear();
        self.navigator
            .redirect(&self.config.endpoints(context).login_route);

        let (parked, held_back): (Vec<_>, Vec<_>) = self
            .coordinator
            .finish()
            .into_iter()
            .partition(|pending| pending.context == context);
        tracing::debug!("Rejecting {} parked request(s)", parked.len());
        for pending in parked {
            pending.reject();
        }
        leader.reject();
        held_back
    }

    /// Offer held-back requests to the coordinator again.
    ///
    /// Returns the leader of a new episode, or `None` when they were parked
    /// behind an episode another caller already started.
    fn readmit(&self, held_back: Vec<PendingRequest>) -> Option<PendingRequest> {
        if held_back.is_empty() {
            return None;
        }
        tracing::debug!(
            "{} parked request(s) wait for their own session refresh",
            held_back.len()
        );

        let mut leader = None;
        for pending in held_back {
            if let Admission::Lead(lead) = self.coordinator.admit(pending) {
                leader = Some(lead);
            }
        }
        leader
    }
}
