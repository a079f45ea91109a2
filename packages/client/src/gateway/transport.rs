//! HTTP transport used by the gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;

use crate::error::TransportError;

use super::request::{ApiRequest, ApiResponse};

/// Executes a single HTTP exchange.
///
/// Any status code, 401 included, is a successful exchange; only failures to
/// obtain a response are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError>;
}

/// `reqwest`-backed transport with a cookie jar for server-set session cookies
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Build a transport with its own cookie-enabled client.
    ///
    /// An exchange that takes longer than `timeout` fails with a
    /// [`TransportError`], so a stalled backend cannot hold a refresh open.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use an existing client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        resolve_url(&self.base_url, path)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url_for(&request.path));

        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(ApiResponse::new(status, body))
    }
}

/// Join a request path onto the base URL; absolute URLs pass through.
fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_joins_relative_paths() {
        // テスト項目: 相対パスはベース URL に連結される
        // given (前提条件):
        let cases = [
            ("http://localhost:8000", "/api/branches"),
            ("http://localhost:8000/", "/api/branches"),
            ("http://localhost:8000", "api/branches"),
        ];

        // when (操作):
        let results: Vec<String> = cases
            .iter()
            .map(|(base, path)| resolve_url(base, path))
            .collect();

        // then (期待する結果):
        assert!(
            results
                .iter()
                .all(|url| url == "http://localhost:8000/api/branches")
        );
    }

    #[test]
    fn test_resolve_url_keeps_absolute_urls() {
        // テスト項目: 絶対 URL はそのまま使われる
        // given (前提条件):
        let url = "https://api.example.com/api/portal/bookings";

        // when (操作):
        let result = resolve_url("http://localhost:8000", url);

        // then (期待する結果):
        assert_eq!(result, url);
    }
}
