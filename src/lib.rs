//! Storefront Backend Library
//!
//! Session-authentication core for the storefront: credential issuance,
//! verification, rotation, and revocation. Exposed as a library so the
//! binary and the integration tests share one router.

pub mod auth;
pub mod config;
pub mod middleware;
pub mod notify;
