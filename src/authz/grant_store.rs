use std::collections::BTreeSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::program::{Program, RoleProgram, UserProgram};

/// Read-only view over role membership, role grants and user overrides.
///
/// Every method is a point lookup or a scan keyed by a single user, role set
/// or program. Implementations never write.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn program(&self, program_id: &str) -> AppResult<Option<Program>>;

    async fn programs(&self, program_ids: &BTreeSet<String>) -> AppResult<Vec<Program>>;

    /// Role codes currently held by the user.
    async fn role_codes(&self, user_id: Uuid) -> AppResult<BTreeSet<String>>;

    /// RoleProgram rows for `program_id` belonging to any of `role_codes`,
    /// enabled or not.
    async fn role_grants(
        &self,
        role_codes: &BTreeSet<String>,
        program_id: &str,
    ) -> AppResult<Vec<RoleProgram>>;

    /// Every RoleProgram row belonging to any of `role_codes`.
    async fn role_grants_for_roles(&self, role_codes: &BTreeSet<String>) -> AppResult<Vec<RoleProgram>>;

    async fn user_override(&self, user_id: Uuid, program_id: &str) -> AppResult<Option<UserProgram>>;

    async fn user_overrides(&self, user_id: Uuid) -> AppResult<Vec<UserProgram>>;
}
