//! Credential context classification.
//!
//! This module contains pure functions that decide which credential context a
//! request belongs to and whether a path is an authentication endpoint. They
//! have no side effects, so the gateway's routing decisions can be tested in
//! isolation from the network layer.

use std::fmt;

/// Request paths containing this marker belong to the customer portal
pub const CUSTOMER_PATH_MARKER: &str = "/portal/";

/// Pages under this route prefix are customer portal pages
pub const CUSTOMER_ROUTE_PREFIX: &str = "/customer";

/// Actions under an `auth` path segment that must never trigger a refresh
const AUTH_ACTIONS: [&str; 5] = ["login", "register", "refresh", "mobile-refresh", "me"];

/// One of the two independent credential contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    /// Staff/admin back office
    Staff,
    /// Customer portal
    Customer,
}

impl Context {
    pub const ALL: [Context; 2] = [Context::Staff, Context::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Staff => "staff",
            Context::Customer => "customer",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the credential context of a request.
///
/// Total: every input maps to exactly one context.
///
/// # Arguments
///
/// * `request_path` - Path (or absolute URL) of the outgoing request
/// * `current_route` - Route of the page issuing the request
///
/// # Returns
///
/// `Context::Customer` when the path carries the portal marker or the page is
/// under the customer section, `Context::Staff` otherwise
pub fn classify(request_path: &str, current_route: &str) -> Context {
    if request_path.contains(CUSTOMER_PATH_MARKER) || is_customer_route(current_route) {
        Context::Customer
    } else {
        Context::Staff
    }
}

/// Check if a page route is inside the customer section.
///
/// Matches `/customer` and anything below `/customer/`, but not siblings such
/// as `/customers`. This is stricter than a plain prefix test, which would
/// send requests from a `/customers` staff page with the customer session.
pub fn is_customer_route(route: &str) -> bool {
    route
        .strip_prefix(CUSTOMER_ROUTE_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
}

/// Check if a request path targets an authentication endpoint.
///
/// Login, register, refresh and whoami calls answer 401 as part of their
/// contract, so a 401 from them is final.
pub fn is_auth_endpoint(request_path: &str) -> bool {
    let path = request_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    segments
        .windows(2)
        .any(|pair| pair[0] == "auth" && AUTH_ACTIONS.contains(&pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_portal_path_as_customer() {
        // テスト項目: ポータルのパスは Customer コンテキストに分類される
        // given (前提条件):
        let path = "/api/portal/bookings";

        // when (操作):
        let result = classify(path, "/dashboard");

        // then (期待する結果):
        assert_eq!(result, Context::Customer);
    }

    #[test]
    fn test_classify_customer_route_as_customer() {
        // テスト項目: 顧客ページから発行されたリクエストは Customer に分類される
        // given (前提条件):
        let path = "/api/routes";

        // when (操作):
        let result = classify(path, "/customer/history");

        // then (期待する結果):
        assert_eq!(result, Context::Customer);
    }

    #[test]
    fn test_classify_everything_else_as_staff() {
        // テスト項目: それ以外のリクエストは Staff に分類される
        // given (前提条件):
        let cases = [
            ("/api/branches", "/dashboard"),
            ("/api/tickets", "/"),
            ("", ""),
            ("/api/portalish", "/customers"),
        ];

        // when (操作):
        let results: Vec<Context> = cases
            .iter()
            .map(|(path, route)| classify(path, route))
            .collect();

        // then (期待する結果):
        assert!(results.iter().all(|c| *c == Context::Staff));
    }

    #[test]
    fn test_classify_absolute_portal_url() {
        // テスト項目: 絶対 URL でもポータルのマーカーで判定される
        // given (前提条件):
        let url = "https://api.example.com/api/portal/auth/me";

        // when (操作):
        let result = classify(url, "/login");

        // then (期待する結果):
        assert_eq!(result, Context::Customer);
    }

    #[test]
    fn test_is_customer_route_boundaries() {
        // テスト項目: /customer 配下のみが顧客ルートと判定される
        // given (前提条件):
        let routes = ["/customer", "/customer/", "/customer/login", "/customer?tab=1"];
        let others = ["/customers", "/login", "/admin/customer"];

        // when (操作):
        let matched: Vec<bool> = routes.iter().map(|r| is_customer_route(r)).collect();
        let unmatched: Vec<bool> = others.iter().map(|r| is_customer_route(r)).collect();

        // then (期待する結果):
        assert!(matched.iter().all(|m| *m));
        assert!(unmatched.iter().all(|m| !*m));
    }

    #[test]
    fn test_is_auth_endpoint_detects_auth_actions() {
        // テスト項目: 認証系エンドポイントが判定される
        // given (前提条件):
        let paths = [
            "/api/auth/login",
            "/api/auth/refresh",
            "/api/auth/me",
            "/api/portal/auth/register",
            "/api/portal/auth/refresh?x=1",
            "/api/portal/auth/mobile-refresh",
            "http://localhost:8000/api/auth/login/",
        ];

        // when (操作):
        let results: Vec<bool> = paths.iter().map(|p| is_auth_endpoint(p)).collect();

        // then (期待する結果):
        assert!(results.iter().all(|r| *r));
    }

    #[test]
    fn test_is_auth_endpoint_ignores_regular_paths() {
        // テスト項目: 通常のエンドポイントは認証系と判定されない
        // given (前提条件):
        let paths = [
            "/api/branches",
            "/api/auth/logout",
            "/api/auth/members",
            "/api/users/me",
            "/api/portal/bookings",
        ];

        // when (操作):
        let results: Vec<bool> = paths.iter().map(|p| is_auth_endpoint(p)).collect();

        // then (期待する結果):
        assert!(results.iter().all(|r| !*r));
    }
}
