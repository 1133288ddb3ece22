//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to all responses. The only third party
//! allowed anywhere is Razorpay, whose checkout script opens an iframe modal
//! and talks to its own API from inside it.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

/// Origin serving the Razorpay Standard Checkout script.
pub const RAZORPAY_CHECKOUT_ORIGIN: &str = "https://checkout.razorpay.com";

const CONTENT_SECURITY_POLICY_VALUE: &str = "default-src 'none'; \
     script-src 'self' https://checkout.razorpay.com; \
     style-src 'self'; \
     font-src 'self'; \
     img-src 'self' data: https://*.razorpay.com; \
     connect-src 'self' https://api.razorpay.com https://lumberjack.razorpay.com; \
     frame-src https://api.razorpay.com https://checkout.razorpay.com; \
     object-src 'none'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'none'; \
     upgrade-insecure-requests";

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY` - Prevent clickjacking
/// - `X-Content-Type-Options: nosniff` - Prevent MIME sniffing
/// - `Referrer-Policy: strict-origin-when-cross-origin` - Razorpay needs the origin
/// - `Content-Security-Policy` - Strict CSP with Razorpay allowances
/// - `Permissions-Policy` - Deny sensitive features except `payment` for Razorpay
/// - `Cache-Control: no-store, max-age=0` - Prevent caching order and payment data
/// - `Cross-Origin-Opener-Policy: same-origin-allow-popups` - UPI and netbanking popups
/// - `Cross-Origin-Resource-Policy: same-origin` - Resource isolation
/// - `X-DNS-Prefetch-Control: off` - Prevent DNS prefetch leakage
///
/// `Cross-Origin-Embedder-Policy` is not set: the Razorpay iframe does not
/// send CORP headers and would be blocked by `require-corp`.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY_VALUE),
    );

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             autoplay=(), \
             browsing-topics=(), \
             camera=(), \
             display-capture=(), \
             geolocation=(), \
             gyroscope=(), \
             magnetometer=(), \
             microphone=(), \
             midi=(), \
             payment=(self \"https://api.razorpay.com\" \"https://checkout.razorpay.com\"), \
             usb=(), \
             xr-spatial-tracking=()",
        ),
    );

    // Order totals and payment details must never be served from a cache
    headers.insert(
        HeaderName::from_static("cache-control"),
        HeaderValue::from_static("no-store, max-age=0"),
    );

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin-allow-popups"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    use super::*;

    async fn headers_for(path: &str) -> axum::http::HeaderMap {
        let app = Router::new()
            .route("/checkout", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(security_headers_middleware));
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(path)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        response.headers().clone()
    }

    #[tokio::test]
    async fn test_csp_allows_razorpay_checkout() {
        let headers = headers_for("/checkout").await;
        let csp = headers
            .get(CONTENT_SECURITY_POLICY)
            .and_then(|v| v.to_str().ok())
            .expect("csp header");

        assert!(csp.contains(&format!("script-src 'self' {RAZORPAY_CHECKOUT_ORIGIN}")));
        assert!(csp.contains("frame-src https://api.razorpay.com"));
        assert!(csp.contains("frame-ancestors 'none'"));
    }

    #[tokio::test]
    async fn test_no_embedder_policy_and_popups_allowed() {
        let headers = headers_for("/checkout").await;
        assert!(headers.get("cross-origin-embedder-policy").is_none());
        assert_eq!(
            headers.get("cross-origin-opener-policy").map(HeaderValue::as_bytes),
            Some(&b"same-origin-allow-popups"[..])
        );
    }

    #[tokio::test]
    async fn test_headers_applied_to_not_found() {
        let headers = headers_for("/missing").await;
        assert_eq!(
            headers.get(X_FRAME_OPTIONS).map(HeaderValue::as_bytes),
            Some(&b"DENY"[..])
        );
    }
}
