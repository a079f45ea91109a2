//! Shared utilities for the Jetty session layer and its stub backend.

pub mod logger;
pub mod time;
