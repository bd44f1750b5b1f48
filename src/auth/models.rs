//! Authentication Models
//! Mission: Define user accounts, token claims, and request/response shapes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Token purposes, each signed with its own secret.
///
/// A token minted for one purpose must fail verification for any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Access,
    Refresh,
    Reset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
            TokenPurpose::Reset => "reset",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "access" => Some(TokenPurpose::Access),
            "refresh" => Some(TokenPurpose::Refresh),
            "reset" => Some(TokenPurpose::Reset),
            _ => None,
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user_id)
    pub exp: usize,  // expiration timestamp (unix seconds)
    /// Per-issuance nonce, refresh tokens only. Reserved for per-device
    /// revocation; nothing consults it yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Federated login request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedLoginRequest {
    pub identity_token: String,
}

/// Password reset request body
#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Password reset completion body
#[derive(Debug, Deserialize)]
pub struct PasswordResetComplete {
    pub token: String,
    pub password: String,
}

/// Issuance response: the refresh token only ever travels in its cookie.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub access_token: String,
    pub user: UserProfile,
}

impl AuthResponse {
    pub fn issued(access_token: &str, user: &User) -> Self {
        Self {
            success: true,
            access_token: access_token.to_string(),
            user: UserProfile::from_user(user),
        }
    }
}

/// User profile (sanitized - password hash excluded)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: String,
}

impl UserProfile {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            created_at: user.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password_hash: "hash123".to_string(),
            is_admin: false,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_user_never_serializes_password_hash() {
        let user = sample_user();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hash123"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn test_profile_shape_is_camel_case() {
        let user = sample_user();
        let profile = UserProfile::from_user(&user);
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["email"], "a@b.com");
        assert_eq!(json["isAdmin"], false);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_auth_response_shape() {
        let user = sample_user();
        let resp = AuthResponse::issued("tok123", &user);
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["accessToken"], "tok123");
        assert_eq!(json["user"]["email"], "a@b.com");
    }

    #[test]
    fn test_token_purpose_string_conversion() {
        assert_eq!(TokenPurpose::Access.as_str(), "access");
        assert_eq!(TokenPurpose::Refresh.as_str(), "refresh");
        assert_eq!(TokenPurpose::Reset.as_str(), "reset");

        assert_eq!(TokenPurpose::from_str("refresh"), Some(TokenPurpose::Refresh));
        assert_eq!(TokenPurpose::from_str("RESET"), Some(TokenPurpose::Reset));
        assert_eq!(TokenPurpose::from_str("session"), None);
    }

    #[test]
    fn test_claims_jti_omitted_when_absent() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            exp: 1234567890,
            jti: None,
        };
        let json = serde_json::to_string(&claims).unwrap();
        assert!(!json.contains("jti"));
    }
}
