//! Service Configuration
//! Mission: Read the environment once at startup, inject everywhere else

use crate::auth::jwt::TokenConfig;
use anyhow::Result;
use std::env;

/// Runtime configuration, loaded once via [`Config::from_env`].
///
/// Nothing else in the service reads the environment; secrets and lifetimes
/// are injected into the components that need them at construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub users_db_path: String,
    pub revocation_db_path: String,

    pub access_secret: String,
    pub refresh_secret: String,
    pub reset_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub reset_ttl_secs: u64,

    /// Secure cookies are only set over HTTPS; off for local development.
    pub production: bool,

    // Federated identity provider (all three required to enable)
    pub idp_jwks_url: Option<String>,
    pub idp_issuer: Option<String>,
    pub idp_audience: Option<String>,

    pub notify_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let users_db_path =
            env::var("USERS_DB_PATH").unwrap_or_else(|_| "./storefront_users.db".to_string());
        let revocation_db_path = env::var("REVOCATION_DB_PATH")
            .unwrap_or_else(|_| "./storefront_revoked.db".to_string());

        let access_secret = env::var("ACCESS_TOKEN_SECRET")
            .unwrap_or_else(|_| "dev-access-secret-change-in-production-32ch".to_string());
        let refresh_secret = env::var("REFRESH_TOKEN_SECRET")
            .unwrap_or_else(|_| "dev-refresh-secret-change-in-production-32c".to_string());
        let reset_secret = env::var("RESET_TOKEN_SECRET")
            .unwrap_or_else(|_| "dev-reset-secret-change-in-production-32ch".to_string());

        let access_ttl_secs = parse_secs("ACCESS_TOKEN_TTL_SECS", 900);
        let refresh_ttl_secs = parse_secs("REFRESH_TOKEN_TTL_SECS", 604_800);
        let reset_ttl_secs = parse_secs("RESET_TOKEN_TTL_SECS", 900);

        let production = env::var("PRODUCTION")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(false);

        Ok(Self {
            port,
            users_db_path,
            revocation_db_path,
            access_secret,
            refresh_secret,
            reset_secret,
            access_ttl_secs,
            refresh_ttl_secs,
            reset_ttl_secs,
            production,
            idp_jwks_url: env::var("IDP_JWKS_URL").ok(),
            idp_issuer: env::var("IDP_ISSUER").ok(),
            idp_audience: env::var("IDP_AUDIENCE").ok(),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
        })
    }

    /// The slice of configuration the token handler owns.
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            access_secret: self.access_secret.clone(),
            refresh_secret: self.refresh_secret.clone(),
            reset_secret: self.reset_secret.clone(),
            access_ttl_secs: self.access_ttl_secs,
            refresh_ttl_secs: self.refresh_ttl_secs,
            reset_ttl_secs: self.reset_ttl_secs,
        }
    }
}

fn parse_secs(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
