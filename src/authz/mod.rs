//! Authorization module - permission resolution
//!
//! Decides the effective authority a user holds on a program by combining:
//! - program closure (absolute veto)
//! - per-user overrides with calendar-day validity windows
//! - role grants (highest enabled grant across held roles)
//!
//! Enforcement for callers is controlled by [`AuthzMode`] (off/advisory/strict).

mod authority;
mod grant_store;
mod resolver;
mod window;

pub use authority::{AuthorityLevel, ParseAuthorityError};
pub use grant_store::GrantStore;
pub use resolver::{decide, AuthoritySource, GrantSnapshot, PermissionResolver, Resolution};
pub use window::ValidityWindow;

use std::sync::OnceLock;

/// Authorization enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzMode {
    /// Resolve but never deny (development mode)
    Off,
    /// Log denials but allow requests (testing mode)
    Advisory,
    /// Enforce 403 on denied requests (production mode)
    Strict,
}

impl AuthzMode {
    pub fn from_env() -> Self {
        static MODE: OnceLock<AuthzMode> = OnceLock::new();
        *MODE.get_or_init(|| Self::parse(&std::env::var("AUTHZ_MODE").unwrap_or_default()))
    }

    /// Anything unrecognised enforces.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "off" => AuthzMode::Off,
            "advisory" => AuthzMode::Advisory,
            _ => AuthzMode::Strict,
        }
    }
}
