//! Authentication Errors
//! Mission: One typed rejection taxonomy, one consistent HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Typed rejection kinds for the authentication core.
///
/// Every credential rejection is terminal for the request; the client decides
/// whether a `refresh` attempt makes sense (reasonable after `Expired`, never
/// after `Revoked`). `StoreUnavailable` covers infrastructure faults and is
/// never conflated with a credential rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingCredential,
    InvalidSignature,
    Expired,
    Revoked,
    UnknownSubject,
    Forbidden,
    InvalidCredential,
    WeakPassword,
    EmailTaken,
    FederatedTokenInvalid,
    IdentityProviderUnavailable,
    IdentityProviderNotConfigured,
    StoreUnavailable,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "Missing authentication token",
            AuthError::InvalidSignature => "Invalid token",
            AuthError::Expired => "Token expired",
            AuthError::Revoked => "Token revoked",
            AuthError::UnknownSubject => "Account no longer exists",
            AuthError::Forbidden => "Insufficient permissions",
            AuthError::InvalidCredential => "Invalid email or password",
            AuthError::WeakPassword => "Password must be at least 8 characters",
            AuthError::EmailTaken => "Email already registered",
            AuthError::FederatedTokenInvalid => "Invalid identity token",
            AuthError::IdentityProviderUnavailable => {
                "Failed to reach the identity provider"
            }
            AuthError::IdentityProviderNotConfigured => "Federated login not configured",
            AuthError::StoreUnavailable => "Internal server error",
        }
    }

    /// Authentication failures are uniformly 401; only the capability gate is
    /// 403. Registration validation and infrastructure faults map to their
    /// conventional classes.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::Revoked
            | AuthError::UnknownSubject
            | AuthError::InvalidCredential
            | AuthError::FederatedTokenInvalid => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::WeakPassword => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::IdentityProviderUnavailable => StatusCode::BAD_GATEWAY,
            AuthError::IdentityProviderNotConfigured | AuthError::StoreUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AuthError {}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        error!("Store failure: {:#}", err);
        AuthError::StoreUnavailable
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.message(),
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_rejections_are_401() {
        for err in [
            AuthError::MissingCredential,
            AuthError::InvalidSignature,
            AuthError::Expired,
            AuthError::Revoked,
            AuthError::UnknownSubject,
            AuthError::InvalidCredential,
            AuthError::FederatedTokenInvalid,
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED, "{:?}", err);
        }
    }

    #[test]
    fn test_capability_gate_is_distinct_from_authentication() {
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_ne!(
            AuthError::Forbidden.status(),
            AuthError::InvalidSignature.status()
        );
    }

    #[test]
    fn test_infrastructure_faults_are_not_credential_rejections() {
        assert_eq!(
            AuthError::StoreUnavailable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::IdentityProviderUnavailable.status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_store_errors_convert_to_store_unavailable() {
        let err = anyhow::anyhow!("disk on fire");
        let auth_err: AuthError = err.into();
        assert_eq!(auth_err, AuthError::StoreUnavailable);
    }

    #[test]
    fn test_error_body_shape() {
        let resp = AuthError::Revoked.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
