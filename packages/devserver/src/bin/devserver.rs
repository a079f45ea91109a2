//! Stub ferry-ticketing backend for local runs of the Jetty client.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin jetty-devserver
//! cargo run --bin jetty-devserver -- --port 9000 --access-ttl-secs 10 --push-interval-ms 1000
//! ```

use std::time::Duration;

use clap::Parser;

use jetty_devserver::{DevServer, DevServerConfig};
use jetty_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "jetty-devserver")]
#[command(about = "Stub backend with refreshable sessions and a stats stream", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8000")]
    port: u16,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "1800")]
    access_ttl_secs: u64,

    /// Interval between stats pushes in milliseconds
    #[arg(long, default_value = "5000")]
    push_interval_ms: u64,

    /// Artificial latency of the refresh endpoints in milliseconds
    #[arg(long, default_value = "0")]
    refresh_delay_ms: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    let config = DevServerConfig {
        access_ttl: Duration::from_secs(args.access_ttl_secs),
        push_interval: Duration::from_millis(args.push_interval_ms.max(1)),
        refresh_delay: Duration::from_millis(args.refresh_delay_ms),
        ..DevServerConfig::default()
    };

    if let Err(e) = DevServer::new(config).run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
