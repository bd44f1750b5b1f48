//! Session Guard Middleware
//! Mission: Resolve request credentials to an identity, gate admin surfaces

use crate::auth::api::AuthState;
use crate::auth::errors::AuthError;
use crate::auth::models::{TokenPurpose, UserProfile};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

/// Cookie carrying the access token (Path=/).
pub const ACCESS_COOKIE: &str = "accessToken";
/// Cookie carrying the refresh token (Path scoped to the refresh endpoint).
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Pull a bearer token out of the Authorization header.
pub fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// Access token extraction: the bearer header wins over the cookie.
pub fn access_token(jar: &CookieJar, req: &Request) -> Option<String> {
    bearer_token(req).or_else(|| jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()))
}

/// Session guard: validates the access token and attaches the sanitized
/// identity to request extensions.
///
/// Order matters: ledger membership is checked before the codec so a revoked
/// token is reported as `Revoked` even while its signature is still good, and
/// the subject is resolved against the credential store last so deleted
/// accounts surface as `UnknownSubject`.
pub async fn session_guard(
    State(state): State<AuthState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = access_token(&jar, &req).ok_or(AuthError::MissingCredential)?;

    if state.ledger.is_revoked(&token)? {
        return Err(AuthError::Revoked);
    }

    let claims = state.jwt.verify(TokenPurpose::Access, &token)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::UnknownSubject)?;
    let user = state
        .user_store
        .get_user_by_id(&user_id)?
        .ok_or(AuthError::UnknownSubject)?;

    req.extensions_mut().insert(UserProfile::from_user(&user));

    Ok(next.run(req).await)
}

/// Capability gate, layered after the session guard.
///
/// `Forbidden` is a different answer than any authentication failure: the
/// caller is known, just not allowed.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AuthError> {
    let identity = req
        .extensions()
        .get::<UserProfile>()
        .ok_or(AuthError::MissingCredential)?;

    if !identity.is_admin {
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(req).await)
}

/// Extract the identity attached by the session guard.
pub fn current_user(req: &Request) -> Option<&UserProfile> {
    req.extensions().get::<UserProfile>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with_auth(value: &str) -> Request {
        HttpRequest::builder()
            .header("Authorization", value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        let req = request_with_auth("Bearer abc123");
        assert_eq!(bearer_token(&req), Some("abc123".to_string()));

        let req = request_with_auth("Basic abc123");
        assert_eq!(bearer_token(&req), None);

        let req = HttpRequest::new(Body::empty());
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn test_header_takes_precedence_over_cookie() {
        let req = HttpRequest::builder()
            .header("Authorization", "Bearer from-header")
            .header("Cookie", format!("{}=from-cookie", ACCESS_COOKIE))
            .body(Body::empty())
            .unwrap();
        let jar = CookieJar::from_headers(req.headers());

        assert_eq!(access_token(&jar, &req), Some("from-header".to_string()));
    }

    #[test]
    fn test_cookie_fallback() {
        let req = HttpRequest::builder()
            .header("Cookie", format!("{}=from-cookie", ACCESS_COOKIE))
            .body(Body::empty())
            .unwrap();
        let jar = CookieJar::from_headers(req.headers());

        assert_eq!(access_token(&jar, &req), Some("from-cookie".to_string()));
    }

    #[test]
    fn test_current_user_reads_extension() {
        let mut req = HttpRequest::new(Body::empty());
        assert!(current_user(&req).is_none());

        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            email: "a@b.com".to_string(),
            is_admin: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        req.extensions_mut().insert(profile);

        assert_eq!(current_user(&req).unwrap().email, "a@b.com");
    }
}
