//! Authentication API Endpoints
//! Mission: Issue, rotate, and revoke session credentials

use crate::auth::errors::AuthError;
use crate::auth::jwt::{JwtHandler, TokenPair};
use crate::auth::middleware::{bearer_token, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::models::{
    AuthResponse, FederatedLoginRequest, LoginRequest, PasswordResetComplete,
    PasswordResetRequest, RegisterRequest, TokenPurpose, User, UserProfile,
};
use crate::auth::revocation::RevocationLedger;
use crate::auth::user_store::UserStore;
use crate::config::Config;
use crate::notify::Notifier;
use axum::{
    extract::{Request, State},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Path the refresh cookie is scoped to; the token never rides anywhere else.
pub const REFRESH_PATH: &str = "/api/auth/refresh";

/// External identity provider configuration (federated login).
#[derive(Clone)]
pub struct IdentityProviderConfig {
    pub jwks_url: String,
    pub issuer: String,
    pub audience: String,
}

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub ledger: Arc<RevocationLedger>,
    pub jwt: Arc<JwtHandler>,
    pub notifier: Arc<dyn Notifier>,

    // Shared HTTP client for outbound calls (JWKS fetch)
    pub http_client: reqwest::Client,

    // Secure cookies in production only
    pub cookie_secure: bool,

    pub idp: Option<IdentityProviderConfig>,
}

impl AuthState {
    pub fn new(
        user_store: Arc<UserStore>,
        ledger: Arc<RevocationLedger>,
        jwt: Arc<JwtHandler>,
        notifier: Arc<dyn Notifier>,
        http_client: reqwest::Client,
        config: &Config,
    ) -> Self {
        let idp = match (&config.idp_jwks_url, &config.idp_issuer, &config.idp_audience) {
            (Some(jwks_url), Some(issuer), Some(audience)) => Some(IdentityProviderConfig {
                jwks_url: jwks_url.clone(),
                issuer: issuer.clone(),
                audience: audience.clone(),
            }),
            _ => None,
        };

        Self {
            user_store,
            ledger,
            jwt,
            notifier,
            http_client,
            cookie_secure: config.production,
            idp,
        }
    }

    fn issue_session(&self, jar: CookieJar, user: &User) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
        let pair = self.jwt.issue_pair(user.id)?;
        let response = AuthResponse::issued(&pair.access, user);
        Ok((self.install_cookies(jar, &pair), Json(response)))
    }

    fn install_cookies(&self, jar: CookieJar, pair: &TokenPair) -> CookieJar {
        jar.add(session_cookie(
            ACCESS_COOKIE,
            pair.access.clone(),
            "/",
            self.jwt.access_ttl_secs() as i64,
            self.cookie_secure,
        ))
        .add(session_cookie(
            REFRESH_COOKIE,
            pair.refresh.clone(),
            REFRESH_PATH,
            self.jwt.refresh_ttl_secs() as i64,
            self.cookie_secure,
        ))
    }
}

fn session_cookie(
    name: &'static str,
    value: String,
    path: &'static str,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path(path)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

fn removal_cookie(name: &'static str, path: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path(path).build()
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    if payload.password.len() < 8 {
        return Err(AuthError::WeakPassword);
    }

    let user = state
        .user_store
        .create_user(&payload.email, &payload.password, false)?
        .ok_or(AuthError::EmailTaken)?;

    info!("🔐 Registered: {}", user.email);

    // Welcome note is fire-and-forget; registration never waits on it
    let notifier = state.notifier.clone();
    let email = user.email.clone();
    tokio::spawn(async move {
        if let Err(e) = notifier
            .send(&email, "Welcome", "Your account has been created.")
            .await
        {
            warn!("Failed to send welcome notification: {:#}", e);
        }
    });

    state.issue_session(jar, &user)
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    let valid = state
        .user_store
        .verify_password(&payload.email, &payload.password)?;

    if !valid {
        // Unknown email and wrong password share one answer
        warn!("❌ Failed login attempt: {}", payload.email);
        return Err(AuthError::InvalidCredential);
    }

    let user = state
        .user_store
        .get_user_by_email(&payload.email)?
        .ok_or(AuthError::InvalidCredential)?;

    info!("✅ Login successful: {}", user.email);

    state.issue_session(jar, &user)
}

/// Federated login endpoint - POST /api/auth/federated
///
/// Verifies an externally issued identity token against the configured
/// provider's JWKS, then mints the same pair a password login would.
pub async fn federated_login(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(payload): Json<FederatedLoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    let idp = state
        .idp
        .as_ref()
        .ok_or(AuthError::IdentityProviderNotConfigured)?;

    let claims =
        verify_identity_token(&state.http_client, idp, &payload.identity_token).await?;
    let email = claims.email.ok_or(AuthError::FederatedTokenInvalid)?;

    let user = match state.user_store.get_user_by_email(&email)? {
        Some(user) => user,
        None => {
            // Federated accounts get an unusable random password
            match state
                .user_store
                .create_user(&email, &Uuid::new_v4().to_string(), false)?
            {
                Some(user) => {
                    info!("🔗 Federated account created: {}", user.email);
                    user
                }
                // Lost a concurrent first-login race; the row exists now
                None => state
                    .user_store
                    .get_user_by_email(&email)?
                    .ok_or(AuthError::StoreUnavailable)?,
            }
        }
    };

    info!("✅ Federated login: {}", user.email);

    state.issue_session(jar, &user)
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    #[allow(dead_code)]
    sub: String,
    email: Option<String>,
}

async fn verify_identity_token(
    http: &reqwest::Client,
    idp: &IdentityProviderConfig,
    identity_token: &str,
) -> Result<IdentityClaims, AuthError> {
    let header = decode_header(identity_token).map_err(|_| AuthError::FederatedTokenInvalid)?;
    if !matches!(header.alg, Algorithm::RS256 | Algorithm::ES256) {
        return Err(AuthError::FederatedTokenInvalid);
    }
    let kid = header.kid.ok_or(AuthError::FederatedTokenInvalid)?;

    let jwks = fetch_jwks(http, &idp.jwks_url).await?;
    let jwk = jwks
        .keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid.as_str()))
        .ok_or(AuthError::FederatedTokenInvalid)?;

    let decoding_key =
        DecodingKey::from_jwk(jwk).map_err(|_| AuthError::FederatedTokenInvalid)?;
    let mut validation = Validation::new(header.alg);
    validation.set_audience(std::slice::from_ref(&idp.audience));
    validation.set_issuer(std::slice::from_ref(&idp.issuer));

    let token_data = decode::<IdentityClaims>(identity_token, &decoding_key, &validation)
        .map_err(|_| AuthError::FederatedTokenInvalid)?;
    Ok(token_data.claims)
}

async fn fetch_jwks(http: &reqwest::Client, jwks_url: &str) -> Result<JwkSet, AuthError> {
    let resp = http
        .get(jwks_url)
        .send()
        .await
        .map_err(|_| AuthError::IdentityProviderUnavailable)?;

    if !resp.status().is_success() {
        return Err(AuthError::IdentityProviderUnavailable);
    }

    resp.json::<JwkSet>()
        .await
        .map_err(|_| AuthError::IdentityProviderUnavailable)
}

/// Refresh endpoint - POST /api/auth/refresh
///
/// Single-use rotation: consuming the presented token and issuing the new
/// pair hinges on one atomic ledger insert. Of two racing calls with the same
/// token, exactly one passes the gate; the other fails `Revoked`.
pub async fn refresh(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AuthError::MissingCredential)?;

    let claims = state.jwt.verify(TokenPurpose::Refresh, &token)?;

    if state.ledger.is_revoked(&token)? {
        return Err(AuthError::Revoked);
    }

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::UnknownSubject)?;
    let user = state
        .user_store
        .get_user_by_id(&user_id)?
        .ok_or(AuthError::UnknownSubject)?;

    // The consumed token stays in the ledger until its own claimed expiry -
    // exactly the window in which it could otherwise still be replayed.
    let consumed = state
        .ledger
        .record(&token, TokenPurpose::Refresh, claims.exp as i64)?;
    if !consumed {
        return Err(AuthError::Revoked);
    }

    info!("🔄 Refresh rotation: {}", user.email);

    state.issue_session(jar, &user)
}

/// Logout endpoint - POST /api/auth/logout
///
/// Best-effort dual revocation. Clearing both cookies is unconditional:
/// malformed tokens or a failed ledger write must never keep a client
/// logged in.
pub async fn logout(
    State(state): State<AuthState>,
    jar: CookieJar,
    req: Request,
) -> (CookieJar, Json<Value>) {
    let access = bearer_token(&req).or_else(|| jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()));
    let refresh = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    if let Some(token) = access {
        revoke_best_effort(&state, &token, TokenPurpose::Access);
    }
    if let Some(token) = refresh {
        revoke_best_effort(&state, &token, TokenPurpose::Refresh);
    }

    let jar = jar
        .remove(removal_cookie(ACCESS_COOKIE, "/"))
        .remove(removal_cookie(REFRESH_COOKIE, REFRESH_PATH));

    (
        jar,
        Json(json!({ "success": true, "message": "Logged out" })),
    )
}

/// Ledger the token under its own claimed expiry; expired or unreadable
/// claims fall back to "already expired" (entry is immediately purgeable).
fn revoke_best_effort(state: &AuthState, token: &str, purpose: TokenPurpose) {
    let expires_at = JwtHandler::decode_unverified(token)
        .map(|claims| claims.exp as i64)
        .unwrap_or_else(|| Utc::now().timestamp());

    if let Err(e) = state.ledger.record(token, purpose, expires_at) {
        warn!(
            purpose = purpose.as_str(),
            "Failed to record logout revocation: {:#}", e
        );
    }
}

/// Request a password reset - POST /api/auth/password-reset/request
pub async fn request_password_reset(
    State(state): State<AuthState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<Value>, AuthError> {
    if let Some(user) = state.user_store.get_user_by_email(&payload.email)? {
        let token = state.jwt.issue(TokenPurpose::Reset, user.id)?;

        let notifier = state.notifier.clone();
        tokio::spawn(async move {
            let body = format!("Use this token to reset your password: {}", token);
            if let Err(e) = notifier.send(&user.email, "Password reset", &body).await {
                warn!("Failed to send reset notification: {:#}", e);
            }
        });
    }

    // Same response whether or not the account exists
    Ok(Json(json!({
        "success": true,
        "message": "If that account exists, a reset link has been sent",
    })))
}

/// Complete a password reset - POST /api/auth/password-reset/complete
///
/// Reset tokens are single-purpose: the session guard rejects them (wrong
/// secret) and this operation accepts nothing else. Short TTL, no ledger.
pub async fn complete_password_reset(
    State(state): State<AuthState>,
    Json(payload): Json<PasswordResetComplete>,
) -> Result<Json<Value>, AuthError> {
    if payload.password.len() < 8 {
        return Err(AuthError::WeakPassword);
    }

    let claims = state.jwt.verify(TokenPurpose::Reset, &payload.token)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::UnknownSubject)?;
    let user = state
        .user_store
        .get_user_by_id(&user_id)?
        .ok_or(AuthError::UnknownSubject)?;

    if !state.user_store.set_password(&user.id, &payload.password)? {
        return Err(AuthError::UnknownSubject);
    }

    info!("🔑 Password reset completed: {}", user.email);

    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}

/// Current user profile - GET /api/auth/me (behind the session guard)
pub async fn me(Extension(identity): Extension<UserProfile>) -> Json<Value> {
    Json(json!({ "success": true, "user": identity }))
}

/// List all users - GET /api/admin/users (session guard + capability gate)
pub async fn list_users(State(state): State<AuthState>) -> Result<Json<Value>, AuthError> {
    let users = state.user_store.list_users()?;
    let profiles: Vec<UserProfile> = users.iter().map(UserProfile::from_user).collect();

    Ok(Json(json!({ "success": true, "users": profiles })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(ACCESS_COOKIE, "tok".to_string(), "/", 900, true);

        assert_eq!(cookie.name(), "accessToken");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(900)));
    }

    #[test]
    fn test_refresh_cookie_is_path_scoped() {
        let cookie = session_cookie(REFRESH_COOKIE, "tok".to_string(), REFRESH_PATH, 604_800, false);

        assert_eq!(cookie.path(), Some("/api/auth/refresh"));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(604_800)));
    }

    #[test]
    fn test_removal_cookie_keeps_the_original_path() {
        let cookie = removal_cookie(REFRESH_COOKIE, REFRESH_PATH);
        assert_eq!(cookie.name(), "refreshToken");
        assert_eq!(cookie.path(), Some(REFRESH_PATH));
    }
}
