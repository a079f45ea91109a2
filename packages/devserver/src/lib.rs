//! Stub ferry-ticketing backend.
//!
//! Implements just enough of the real backend to exercise the Jetty session
//! layer: staff cookie sessions, portal bearer sessions, both refresh
//! endpoints, one protected resource per realm and the dashboard stats stream.

pub mod config;
pub mod error;
mod handler;
mod runner;
mod signal;
pub mod state;

pub use config::DevServerConfig;
pub use error::{ApiError, DevServerError};
pub use handler::{DashboardSnapshot, UNAUTHORIZED_CLOSE_CODE};
pub use runner::{DevServer, DevServerHandle};
pub use state::Realm;
