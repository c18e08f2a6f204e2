//! CORS interceptor.
//!
//! Runs outermost. Preflight requests are answered here and never reach
//! authentication or the handler.

use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Front-end origins echoed back verbatim.
pub const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:3006"];

const ALLOW_HEADERS: HeaderValue = HeaderValue::from_static("Content-Type, Authorization");
const ALLOW_METHODS: HeaderValue = HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS");

/// Axum middleware: adds CORS headers to every response and short-circuits
/// `OPTIONS` with `204 No Content`.
pub async fn cors(request: Request, next: Next) -> Response {
    let origin = allow_origin(request.headers());
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS);
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
    response
}

/// The request origin when it is a known front end, otherwise `*`.
fn allow_origin(headers: &HeaderMap) -> HeaderValue {
    headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .and_then(|origin| ALLOWED_ORIGINS.into_iter().find(|allowed| *allowed == origin))
        .map(HeaderValue::from_static)
        .unwrap_or(HeaderValue::from_static("*"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_origins_are_echoed() {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("http://localhost:3006"));
        assert_eq!(allow_origin(&headers), "http://localhost:3006");
    }

    #[test]
    fn unknown_origins_get_wildcard() {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_static("https://evil.example"));
        assert_eq!(allow_origin(&headers), "*");
        assert_eq!(allow_origin(&HeaderMap::new()), "*");
    }
}
