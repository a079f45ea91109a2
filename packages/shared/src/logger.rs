//! Logging setup utilities shared by the Jetty binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Both the Jetty library crates and the calling binary log at
/// `default_log_level`. The filter can be overridden with `RUST_LOG`.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "jetty-client", "jetty-devserver")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use jetty_shared::logger::setup_logger;
///
/// setup_logger("jetty-client", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the default filter directive covering every Jetty crate and the binary.
fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    ["jetty_shared", "jetty_client", "jetty_devserver"]
        .iter()
        .map(|target| format!("{}={}", target, default_log_level))
        .chain(std::iter::once(format!(
            "{}={}",
            binary_name.replace('-', "_"),
            default_log_level
        )))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_covers_all_crates_and_binary() {
        // テスト項目: デフォルトフィルタが全クレートとバイナリを含む
        // given (前提条件):
        let binary_name = "jetty-client";

        // when (操作):
        let filter = default_filter(binary_name, "debug");

        // then (期待する結果):
        assert!(filter.contains("jetty_shared=debug"));
        assert!(filter.contains("jetty_client=debug"));
        assert!(filter.contains("jetty_devserver=debug"));
        assert!(filter.ends_with("jetty_client=debug"));
    }
}
