use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Degree of access to a program. The variant order is the authority order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorityLevel {
    #[default]
    None,
    Read,
    Write,
    Execute,
    Admin,
}

impl AuthorityLevel {
    pub const ALL: [AuthorityLevel; 5] = [
        AuthorityLevel::None,
        AuthorityLevel::Read,
        AuthorityLevel::Write,
        AuthorityLevel::Execute,
        AuthorityLevel::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityLevel::None => "NONE",
            AuthorityLevel::Read => "READ",
            AuthorityLevel::Write => "WRITE",
            AuthorityLevel::Execute => "EXECUTE",
            AuthorityLevel::Admin => "ADMIN",
        }
    }

    /// Anything above `None` grants some access.
    pub fn is_granted(self) -> bool {
        self > AuthorityLevel::None
    }

    pub fn satisfies(self, required: AuthorityLevel) -> bool {
        self >= required
    }
}

impl fmt::Display for AuthorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown authority level '{0}'")]
pub struct ParseAuthorityError(pub String);

impl FromStr for AuthorityLevel {
    type Err = ParseAuthorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseAuthorityError(trimmed.to_string()))
    }
}
