//! Client-side session resilience layer for the ferry-ticketing frontends.
//!
//! Two independent pieces live here:
//!
//! - [`gateway::Gateway`]: the single HTTP entry point. It keeps requests
//!   authenticated across the Staff and Customer credential contexts and, when
//!   an access token expires, issues exactly one refresh call no matter how many
//!   requests failed at the same time.
//! - [`stream::StreamClient`]: a self-healing connection to the dashboard
//!   stats stream with bounded exponential backoff and leak-free teardown.

pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod stream;

pub use config::{ContextEndpoints, GatewayConfig, StreamConfig};
pub use context::Context;
pub use credential::{CredentialStore, CredentialStores, MemoryStorage, TokenStorage};
pub use error::{GatewayError, RefreshError, StorageError, StreamError, TransportError};
pub use gateway::{
    ApiRequest, ApiResponse, Gateway, MemoryNavigator, Navigator, RefreshCoordinator,
    ReqwestTransport, Transport,
};
pub use stream::{BackoffPolicy, DashboardStats, StreamClient, StreamState};
