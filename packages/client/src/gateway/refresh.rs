//! Session refresh calls and token bookkeeping.

use serde::Deserialize;

use crate::{
    config::ContextEndpoints,
    context::Context,
    credential::CredentialStore,
    error::RefreshError,
};

use super::{
    request::{ApiRequest, ApiResponse},
    transport::Transport,
};

/// Token payload returned by login and refresh endpoints
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Call the context's refresh endpoint and record the new session.
///
/// The call goes straight to the transport, never through the gateway, so a
/// failing refresh cannot start another refresh.
pub(crate) async fn refresh_session(
    transport: &dyn Transport,
    endpoints: &ContextEndpoints,
    store: &CredentialStore,
) -> Result<(), RefreshError> {
    let context = store.context();
    let request = match context {
        // Staff credentials travel in the cookie jar
        Context::Staff => ApiRequest::post(&endpoints.refresh),
        Context::Customer => {
            let refresh_token = store
                .refresh_token()
                .ok_or(RefreshError::MissingRefreshToken(context))?;
            ApiRequest::post(&endpoints.refresh)
                .with_json(serde_json::json!({ "refresh_token": refresh_token }))
        }
    };

    tracing::debug!("Calling {} refresh endpoint {}", context, endpoints.refresh);
    let response = transport.execute(&request, None).await?;
    if !response.is_success() {
        return Err(RefreshError::Rejected(response.status));
    }

    record_session(store, &response).map_err(|e| RefreshError::Decode(e.to_string()))
}

/// Store the session carried by a successful login or refresh response.
///
/// Staff sessions live in cookies, so an empty or unexpected body still
/// counts as a session. Customer sessions need the token payload.
pub(crate) fn record_session(
    store: &CredentialStore,
    response: &ApiResponse,
) -> Result<(), serde_json::Error> {
    match serde_json::from_str::<TokenPair>(&response.body) {
        Ok(TokenPair {
            access_token,
            refresh_token: Some(refresh_token),
            ..
        }) => store.set(&access_token, &refresh_token),
        Ok(TokenPair { access_token, .. }) => store.replace_access(&access_token),
        Err(_) if store.context() == Context::Staff => store.mark_present(),
        Err(e) => return Err(e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use crate::{
        credential::{MemoryStorage, TokenStorage},
        error::TransportError,
    };

    /// Transport returning a canned response and recording what it was sent
    struct CannedTransport {
        response: Result<ApiResponse, TransportError>,
        seen: Mutex<Vec<ApiRequest>>,
    }

    impl CannedTransport {
        fn new(response: Result<ApiResponse, TransportError>) -> Self {
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<ApiRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn execute(
            &self,
            request: &ApiRequest,
            _bearer: Option<&str>,
        ) -> Result<ApiResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.response.clone()
        }
    }

    fn create_store(context: Context) -> CredentialStore {
        let storage: Arc<dyn TokenStorage> = Arc::new(MemoryStorage::new());
        match context {
            Context::Staff => CredentialStore::staff(storage),
            Context::Customer => CredentialStore::customer(storage),
        }
    }

    fn token_body(access: &str, refresh: &str) -> String {
        serde_json::json!({
            "access_token": access,
            "refresh_token": refresh,
            "token_type": "bearer"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_customer_refresh_sends_refresh_token_and_rotates() {
        // テスト項目: Customer のリフレッシュはリフレッシュトークンを送り、新しいトークンを保存する
        // given (前提条件):
        let store = create_store(Context::Customer);
        store.set("access-1", "refresh-1");
        let transport = CannedTransport::new(Ok(ApiResponse::new(
            StatusCode::OK,
            token_body("access-2", "refresh-2"),
        )));

        // when (操作):
        let result =
            refresh_session(&transport, &ContextEndpoints::customer(), &store).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(store.get(), Some("access-2".to_string()));
        assert_eq!(store.refresh_token(), Some("refresh-2".to_string()));
        let seen = transport.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/api/portal/auth/refresh");
        assert_eq!(
            seen[0].body,
            Some(serde_json::json!({ "refresh_token": "refresh-1" }))
        );
    }

    #[tokio::test]
    async fn test_customer_refresh_without_token_fails_without_calling() {
        // テスト項目: リフレッシュトークンがなければエンドポイントを呼ばずに失敗する
        // given (前提条件):
        let store = create_store(Context::Customer);
        let transport = CannedTransport::new(Ok(ApiResponse::new(StatusCode::OK, "{}")));

        // when (操作):
        let result =
            refresh_session(&transport, &ContextEndpoints::customer(), &store).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(RefreshError::MissingRefreshToken(Context::Customer))
        ));
        assert!(transport.seen().is_empty());
    }

    #[tokio::test]
    async fn test_staff_refresh_posts_without_body() {
        // テスト項目: Staff のリフレッシュはボディなしで送られ、セッションの存在を記録する
        // given (前提条件):
        let store = create_store(Context::Staff);
        let transport = CannedTransport::new(Ok(ApiResponse::new(StatusCode::NO_CONTENT, "")));

        // when (操作):
        let result = refresh_session(&transport, &ContextEndpoints::staff(), &store).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert!(store.is_authenticated());
        let seen = transport.seen();
        assert_eq!(seen[0].path, "/api/auth/refresh");
        assert_eq!(seen[0].body, None);
    }

    #[tokio::test]
    async fn test_rejected_refresh_reports_status() {
        // テスト項目: リフレッシュが拒否された場合はステータスを含むエラーになる
        // given (前提条件):
        let store = create_store(Context::Staff);
        let transport =
            CannedTransport::new(Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "expired")));

        // when (操作):
        let result = refresh_session(&transport, &ContextEndpoints::staff(), &store).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(RefreshError::Rejected(StatusCode::UNAUTHORIZED))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_a_refresh_failure() {
        // テスト項目: ネットワークエラーはリフレッシュ失敗として扱われる
        // given (前提条件):
        let store = create_store(Context::Staff);
        let transport = CannedTransport::new(Err(TransportError("connection reset".to_string())));

        // when (操作):
        let result = refresh_session(&transport, &ContextEndpoints::staff(), &store).await;

        // then (期待する結果):
        assert!(matches!(result, Err(RefreshError::Transport(_))));
    }

    #[test]
    fn test_record_session_requires_tokens_for_customer() {
        // テスト項目: Customer はトークンを含まないレスポンスを受け付けない
        // given (前提条件):
        let store = create_store(Context::Customer);
        let response = ApiResponse::new(StatusCode::OK, "");

        // when (操作):
        let result = record_session(&store, &response);

        // then (期待する結果):
        assert!(result.is_err());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_record_session_without_refresh_token_replaces_access_only() {
        // テスト項目: refresh_token がなければアクセストークンのみ差し替える
        // given (前提条件):
        let store = create_store(Context::Customer);
        store.set("access-1", "refresh-1");
        let response = ApiResponse::new(StatusCode::OK, r#"{"access_token":"access-2"}"#);

        // when (操作):
        let result = record_session(&store, &response);

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(store.get(), Some("access-2".to_string()));
        assert_eq!(store.refresh_token(), Some("refresh-1".to_string()));
    }
}
