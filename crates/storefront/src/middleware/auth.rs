//! Authentication extractors.
//!
//! Login is handled by another service, which stores a [`CurrentUser`] in the
//! shared session. These extractors only read it.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::error::set_sentry_user;
use crate::models::{CurrentUser, session_keys};

/// Where page requests are sent when nobody is logged in.
pub const LOGIN_PATH: &str = "/login";

/// Extractor that requires a logged-in user.
///
/// API requests are rejected with 401; page requests are redirected to the
/// login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn cart(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Cart for {}", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required but the user is not logged in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({ "success": false, "error": "Please log in to continue" })),
            )
                .into_response(),
        }
    }
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(user) = current_user(parts).await else {
            // Nested routers see a stripped URI
            let path = parts
                .extensions
                .get::<OriginalUri>()
                .map_or_else(|| parts.uri.path(), |original| original.path());
            return Err(if path.starts_with("/api/") {
                AuthRejection::Unauthorized
            } else {
                AuthRejection::RedirectToLogin
            });
        };

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[tokio::test]
    async fn test_api_request_without_session_is_unauthorized() {
        let (mut parts, ()) = Request::builder()
            .uri("/api/cart")
            .body(())
            .expect("request")
            .into_parts();

        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .expect("rejected");
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_page_request_without_session_redirects() {
        let (mut parts, ()) = Request::builder()
            .uri("/checkout")
            .body(())
            .expect("request")
            .into_parts();

        let rejection = RequireAuth::from_request_parts(&mut parts, &())
            .await
            .err()
            .expect("rejected");
        let response = rejection.into_response();
        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers().get("location").and_then(|v| v.to_str().ok()),
            Some(LOGIN_PATH)
        );
    }
}
