//! JWT Token Handler
//! Mission: Issue and verify purpose-scoped tokens

use crate::auth::errors::AuthError;
use crate::auth::models::{Claims, TokenPurpose};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::debug;
use uuid::Uuid;

/// Signing secrets and lifetimes, injected once at construction.
///
/// The three secrets are deliberately disjoint: an access token presented to
/// the refresh or reset verifier fails its signature check, and vice versa.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub reset_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub reset_ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: "dev-access-secret-change-in-production-32ch".to_string(),
            refresh_secret: "dev-refresh-secret-change-in-production-32c".to_string(),
            reset_secret: "dev-reset-secret-change-in-production-32ch".to_string(),
            access_ttl_secs: 900,      // 15 minutes
            refresh_ttl_secs: 604_800, // 7 days
            reset_ttl_secs: 900,       // 15 minutes
        }
    }
}

/// A freshly issued access + refresh pair.
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// JWT handler for issuing and verifying tokens
pub struct JwtHandler {
    config: TokenConfig,
}

impl JwtHandler {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    fn secret(&self, purpose: TokenPurpose) -> &[u8] {
        match purpose {
            TokenPurpose::Access => self.config.access_secret.as_bytes(),
            TokenPurpose::Refresh => self.config.refresh_secret.as_bytes(),
            TokenPurpose::Reset => self.config.reset_secret.as_bytes(),
        }
    }

    fn ttl_secs(&self, purpose: TokenPurpose) -> u64 {
        match purpose {
            TokenPurpose::Access => self.config.access_ttl_secs,
            TokenPurpose::Refresh => self.config.refresh_ttl_secs,
            TokenPurpose::Reset => self.config.reset_ttl_secs,
        }
    }

    /// Issue a token for the given purpose. Pure; no side effects.
    ///
    /// Refresh tokens carry a fresh per-issuance nonce in `jti`.
    pub fn issue(&self, purpose: TokenPurpose, user_id: Uuid) -> Result<String> {
        let exp = Utc::now()
            .checked_add_signed(chrono::Duration::seconds(self.ttl_secs(purpose) as i64))
            .context("Invalid expiry timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            exp,
            jti: matches!(purpose, TokenPurpose::Refresh)
                .then(|| Uuid::new_v4().to_string()),
        };

        debug!(
            user_id = %user_id,
            purpose = purpose.as_str(),
            ttl_secs = self.ttl_secs(purpose),
            "Issuing token"
        );

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(purpose)),
        )
        .context("Failed to sign token")
    }

    /// Issue an access + refresh pair for the same subject.
    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(TokenPurpose::Access, user_id)?,
            refresh: self.issue(TokenPurpose::Refresh, user_id)?,
        })
    }

    /// Access-token lifetime in seconds (drives the cookie max-age).
    pub fn access_ttl_secs(&self) -> u64 {
        self.config.access_ttl_secs
    }

    /// Refresh-token lifetime in seconds (drives the cookie max-age).
    pub fn refresh_ttl_secs(&self) -> u64 {
        self.config.refresh_ttl_secs
    }

    /// Verify a token against the secret for `purpose`.
    ///
    /// The rejection kind is decided here, once: `Expired` for an out-of-date
    /// `exp`, `InvalidSignature` for everything else (bad signature, wrong
    /// purpose, malformed token). Callers never re-derive the kind.
    pub fn verify(&self, purpose: TokenPurpose, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(purpose)),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidSignature,
        })?;

        let claims = decoded.claims;

        // Second expiry check against the wall clock. The decoder already
        // validated exp, but must not be the only line of defense if its
        // skew tolerance ever changes.
        if Utc::now().timestamp() as usize >= claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /// Read claims without verifying the signature or expiry.
    ///
    /// Logout needs the claimed expiry of tokens that may already be expired
    /// or signed with a rotated secret. Never use this to authenticate.
    pub fn decode_unverified(token: &str) -> Option<Claims> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}
