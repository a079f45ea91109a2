//! Realtime stats stream client.

mod backoff;
mod client;
mod connector;
mod snapshot;
mod url;

pub use backoff::{Backoff, BackoffPolicy};
pub use client::{StreamClient, StreamState};
pub use connector::{Connector, Frame, StreamConnection, TungsteniteConnector};
pub use snapshot::DashboardStats;
pub use url::stream_url;
