//! HTTP security headers middleware
//!
//! Adds the standard security headers to every HTTP response.

use axum::{extract::Request, middleware::Next, response::Response};
use http::HeaderValue;

/// Content-Security-Policy applied to every response
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; img-src 'self' data:; \
script-src 'self'; style-src 'self'; connect-src 'self' ws: wss:; frame-ancestors 'none'";

/// Middleware that injects HTTP security headers into every response.
///
/// Headers applied:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Content-Security-Policy`: same-origin resources, inline code disallowed,
///   WebSocket connections allowed for course chat
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use http::{HeaderMap, Request, StatusCode};
    use tower::ServiceExt;

    async fn headers_for(uri: &str) -> (StatusCode, HeaderMap) {
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/fail", get(|| async { (StatusCode::FORBIDDEN, "no") }))
            .layer(middleware::from_fn(security_headers));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        (response.status(), response.headers().clone())
    }

    #[tokio::test]
    async fn test_headers_on_success() {
        let (status, headers) = headers_for("/ok").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
        assert_eq!(headers["content-security-policy"], CONTENT_SECURITY_POLICY);
    }

    #[tokio::test]
    async fn test_headers_on_handler_errors() {
        let (status, headers) = headers_for("/fail").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["content-security-policy"], CONTENT_SECURITY_POLICY);
    }

    #[test]
    fn test_csp_has_no_inline_sources() {
        assert!(!CONTENT_SECURITY_POLICY.contains("unsafe-inline"));
        assert!(CONTENT_SECURITY_POLICY.contains("default-src 'self'"));
    }
}
