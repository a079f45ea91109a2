//! Command-line driver for the session layer.
//!
//! Follows the dashboard stats stream, or logs in and sends one request
//! through the gateway (refreshing the session if the backend asks for it).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin jetty-client -- watch --origin http://127.0.0.1:8000 --token <staff access token>
//! cargo run --bin jetty-client -- request --path /api/branches --staff-user admin --staff-password admin
//! cargo run --bin jetty-client -- request --path /api/portal/bookings --customer-email rider@example.com --customer-password secret
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};

use jetty_client::{
    Gateway, GatewayConfig, GatewayError, MemoryNavigator, StreamClient, StreamConfig,
    config::{DEFAULT_BASE_URL, DEFAULT_ORIGIN},
};
use jetty_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "jetty-client")]
#[command(about = "Session-resilient client for the ferry-ticketing backend", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the dashboard stats stream and log every snapshot
    Watch {
        /// Origin of the hosting page; the stream URL is derived from it
        #[arg(short = 'o', long, default_value = DEFAULT_ORIGIN)]
        origin: String,

        /// Staff access token, for backends that authenticate the stream
        #[arg(short = 't', long)]
        token: Option<String>,
    },

    /// Log in and send one GET request through the gateway
    Request {
        #[arg(short = 'b', long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Request path, e.g. /api/branches
        #[arg(short = 'p', long)]
        path: String,

        #[arg(long, requires = "staff_password", conflicts_with = "customer_email")]
        staff_user: Option<String>,

        #[arg(long)]
        staff_password: Option<String>,

        #[arg(long, requires = "customer_password")]
        customer_email: Option<String>,

        #[arg(long)]
        customer_password: Option<String>,

        /// Route of the page the request is issued from
        #[arg(short = 'r', long, default_value = "/dashboard")]
        route: String,
    },
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    match args.command {
        Command::Watch { origin, token } => watch(origin, token).await,
        Command::Request {
            base_url,
            path,
            staff_user,
            staff_password,
            customer_email,
            customer_password,
            route,
        } => {
            let staff = staff_user.zip(staff_password);
            let customer = customer_email.zip(customer_password);
            if let Err(e) = request(base_url, path, route, staff, customer).await {
                tracing::error!("Request failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn watch(origin: String, token: Option<String>) {
    let config = StreamConfig {
        token,
        ..StreamConfig::new(origin)
    };
    let client: StreamClient = StreamClient::spawn(config);
    let mut state = client.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                match current.latest_snapshot {
                    Some(stats) if current.connected => tracing::info!(
                        "tickets={} revenue={:.2} ferries={} branches={}",
                        stats.ticket_count,
                        stats.today_revenue,
                        stats.active_ferries,
                        stats.active_branches
                    ),
                    _ => tracing::info!(
                        "connected={} retry={}",
                        current.connected,
                        current.retry_count
                    ),
                }
            }
        }
    }

    client.close();
    client.closed().await;
}

async fn request(
    base_url: String,
    path: String,
    route: String,
    staff: Option<(String, String)>,
    customer: Option<(String, String)>,
) -> Result<(), GatewayError> {
    let navigator = Arc::new(MemoryNavigator::new(route));
    let gateway = Gateway::connect(GatewayConfig::new(base_url), navigator.clone())?;

    if let Some((username, password)) = staff {
        gateway.login_staff(&username, &password).await?;
    }
    if let Some((email, password)) = customer {
        gateway.login_customer(&email, &password).await?;
    }

    let result = gateway.get(&path).await;
    for redirect in navigator.redirects() {
        tracing::warn!("Session lost, application would redirect to {}", redirect);
    }

    let response = result?;
    println!("{}", response.body);
    Ok(())
}
