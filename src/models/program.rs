use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{AuthorityLevel, ValidityWindow};

// =============================================================================
// PROGRAM
// =============================================================================

/// A protected resource: a screen, an API surface or a batch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Program {
    #[schema(example = "PRD_MGMT")]
    pub program_id: String,
    pub program_name: String,
    /// Closed programs are never grantable or visible.
    pub closed: bool,
}

impl Program {
    pub fn new(program_id: impl Into<String>, program_name: impl Into<String>) -> Self {
        Self {
            program_id: program_id.into(),
            program_name: program_name.into(),
            closed: false,
        }
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }
}

// =============================================================================
// ROLE-PROGRAM GRANT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleProgram {
    pub role_code: String,
    pub program_id: String,
    pub authority: AuthorityLevel,
    pub use_yn: bool,
}

impl RoleProgram {
    pub fn new(role_code: impl Into<String>, program_id: impl Into<String>, authority: AuthorityLevel) -> Self {
        Self {
            role_code: role_code.into(),
            program_id: program_id.into(),
            authority,
            use_yn: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.use_yn = false;
        self
    }
}

// =============================================================================
// USER-PROGRAM OVERRIDE
// =============================================================================

/// Per-user override. Supersedes role grants while its window is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProgram {
    pub user_id: Uuid,
    pub program_id: String,
    pub authority: AuthorityLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_begin_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_end_date: Option<NaiveDate>,
}

impl UserProgram {
    pub fn new(user_id: Uuid, program_id: impl Into<String>, authority: AuthorityLevel) -> Self {
        Self {
            user_id,
            program_id: program_id.into(),
            authority,
            valid_begin_date: None,
            valid_end_date: None,
        }
    }

    pub fn valid_between(mut self, begin: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.valid_begin_date = begin;
        self.valid_end_date = end;
        self
    }

    pub fn window(&self) -> ValidityWindow {
        ValidityWindow::new(self.valid_begin_date, self.valid_end_date)
    }
}
