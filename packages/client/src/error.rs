//! Error types for the session layer.

use reqwest::StatusCode;
use thiserror::Error;

use crate::context::Context;

/// Errors surfaced to callers of the request gateway
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The server answered with a non-2xx status
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },

    /// The request never produced a response
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body did not have the expected shape
    #[error("failed to decode response body: {0}")]
    Decode(String),

    /// The refresh episode ended without settling this request
    #[error("session refresh ended before this request was settled")]
    RefreshAbandoned,
}

impl GatewayError {
    /// HTTP status carried by this error, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is an authentication failure (HTTP 401)
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

/// Network-level failure while executing one HTTP exchange
#[derive(Debug, Clone, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        TransportError(error.to_string())
    }
}

/// Reasons a session refresh can fail
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No refresh token is stored for the context
    #[error("no refresh token stored for the {0} context")]
    MissingRefreshToken(Context),

    /// The refresh endpoint answered with a non-2xx status
    #[error("refresh endpoint answered {0}")]
    Rejected(StatusCode),

    /// The refresh call never produced a response
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The refresh response could not be decoded
    #[error("refresh response could not be decoded: {0}")]
    Decode(String),
}

/// Storage medium failures.
///
/// Never leaves the credential store: every failure is logged and read as "absent".
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token storage unavailable: {0}")]
    Unavailable(String),
}

/// Stream client failures.
///
/// Folded into the disconnected state by the stream client, never returned to its owner.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The page origin cannot be turned into a stream URL
    #[error("invalid stream origin: {0}")]
    InvalidOrigin(String),

    /// Opening the socket failed
    #[error("connection error: {0}")]
    Connect(String),

    /// The live socket failed while reading
    #[error("stream transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_reports_unauthorized() {
        // テスト項目: 401 の Status エラーは認証失敗として判定される
        // given (前提条件):
        let error = GatewayError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        };

        // when (操作):
        let result = error.is_unauthorized();

        // then (期待する結果):
        assert!(result);
        assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_other_errors_are_not_unauthorized() {
        // テスト項目: 401 以外のエラーは認証失敗として判定されない
        // given (前提条件):
        let forbidden = GatewayError::Status {
            status: StatusCode::FORBIDDEN,
            body: String::new(),
        };
        let transport = GatewayError::Transport(TransportError("reset".to_string()));

        // when (操作):
        let results = (forbidden.is_unauthorized(), transport.is_unauthorized());

        // then (期待する結果):
        assert_eq!(results, (false, false));
        assert_eq!(transport.status(), None);
    }
}
