use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AuthorityLevel, AuthzMode, GrantStore};
use crate::errors::{AppError, AppResult};
use crate::models::program::{Program, RoleProgram, UserProgram};

/// Which rule produced a resolved authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthoritySource {
    /// The program is closed; nothing can grant it.
    Closed,
    /// An applicable user override decided.
    Override,
    /// The highest enabled role grant decided.
    Role { role_code: String },
    /// No applicable override and no enabled role grant.
    NoGrant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Resolution {
    pub program_id: String,
    pub authority: AuthorityLevel,
    pub source: AuthoritySource,
}

impl Resolution {
    fn new(program_id: &str, authority: AuthorityLevel, source: AuthoritySource) -> Self {
        Self {
            program_id: program_id.to_string(),
            authority,
            source,
        }
    }
}

/// Combines closure, override and role grants into a single authority.
///
/// Evaluation order:
/// 1. closed program -> NONE
/// 2. override whose window contains `as_of` -> the override's authority
/// 3. highest enabled grant among the held roles -> that authority
/// 4. NONE
pub fn decide(
    program: &Program,
    user_override: Option<&UserProgram>,
    held_roles: &BTreeSet<String>,
    grants: &[RoleProgram],
    as_of: DateTime<Utc>,
) -> Resolution {
    let program_id = program.program_id.as_str();

    if program.closed {
        tracing::debug!(program_id = %program_id, "program closed");
        return Resolution::new(program_id, AuthorityLevel::None, AuthoritySource::Closed);
    }

    if let Some(ov) = user_override.filter(|ov| ov.program_id == program_id) {
        let window = ov.window();
        if window.is_inverted() {
            tracing::warn!(
                user_id = %ov.user_id,
                program_id = %program_id,
                begin = ?window.begin,
                end = ?window.end,
                "override window is inverted; ignoring override"
            );
        } else if window.contains(as_of.date_naive()) {
            tracing::debug!(
                user_id = %ov.user_id,
                program_id = %program_id,
                authority = %ov.authority,
                "override applies"
            );
            return Resolution::new(program_id, ov.authority, AuthoritySource::Override);
        } else {
            tracing::debug!(
                user_id = %ov.user_id,
                program_id = %program_id,
                "override outside its window"
            );
        }
    }

    // Ties go to the lowest role code so the reported source is stable.
    let best = grants
        .iter()
        .filter(|g| g.use_yn && g.program_id == program_id && held_roles.contains(&g.role_code))
        .max_by(|a, b| {
            a.authority
                .cmp(&b.authority)
                .then_with(|| b.role_code.cmp(&a.role_code))
        });

    match best {
        Some(grant) if grant.authority.is_granted() => Resolution::new(
            program_id,
            grant.authority,
            AuthoritySource::Role {
                role_code: grant.role_code.clone(),
            },
        ),
        _ => Resolution::new(program_id, AuthorityLevel::None, AuthoritySource::NoGrant),
    }
}

/// One user's grants, read once and resolved against many programs.
#[derive(Debug, Clone)]
pub struct GrantSnapshot {
    user_id: Uuid,
    roles: BTreeSet<String>,
    programs: HashMap<String, Program>,
    role_grants: HashMap<String, Vec<RoleProgram>>,
    overrides: HashMap<String, UserProgram>,
}

impl GrantSnapshot {
    pub fn new(user_id: Uuid, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            user_id,
            roles: roles.into_iter().collect(),
            programs: HashMap::new(),
            role_grants: HashMap::new(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_program(mut self, program: Program) -> Self {
        self.programs.insert(program.program_id.clone(), program);
        self
    }

    pub fn with_role_grant(mut self, grant: RoleProgram) -> Self {
        self.role_grants
            .entry(grant.program_id.clone())
            .or_default()
            .push(grant);
        self
    }

    pub fn with_override(mut self, ov: UserProgram) -> Self {
        self.overrides.insert(ov.program_id.clone(), ov);
        self
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Program ids named by any grant or override in the snapshot.
    pub fn referenced_programs(&self) -> BTreeSet<String> {
        self.role_grants
            .keys()
            .chain(self.overrides.keys())
            .cloned()
            .collect()
    }

    pub fn has_program(&self, program_id: &str) -> bool {
        self.programs.contains_key(program_id)
    }

    pub fn resolve(&self, program_id: &str, as_of: DateTime<Utc>) -> AppResult<Resolution> {
        let program = self
            .programs
            .get(program_id)
            .ok_or_else(|| AppError::not_found(format!("program {program_id} not found")))?;

        let grants = self
            .role_grants
            .get(program_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        Ok(decide(
            program,
            self.overrides.get(program_id),
            &self.roles,
            grants,
            as_of,
        ))
    }
}

/// Resolves effective authority from a [`GrantStore`].
///
/// Nothing is cached between calls: every resolution re-reads the store so a
/// grant change is visible to the next request.
pub struct PermissionResolver<S: GrantStore + ?Sized> {
    store: Arc<S>,
}

impl<S: GrantStore + ?Sized> Clone for PermissionResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: GrantStore + ?Sized> PermissionResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn resolve(
        &self,
        user_id: Uuid,
        program_id: &str,
        as_of: DateTime<Utc>,
    ) -> AppResult<AuthorityLevel> {
        Ok(self.resolve_detailed(user_id, program_id, as_of).await?.authority)
    }

    pub async fn resolve_detailed(
        &self,
        user_id: Uuid,
        program_id: &str,
        as_of: DateTime<Utc>,
    ) -> AppResult<Resolution> {
        let program = self
            .store
            .program(program_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("program {program_id} not found")))?;

        if program.closed {
            return Ok(decide(&program, None, &BTreeSet::new(), &[], as_of));
        }

        let user_override = self.store.user_override(user_id, program_id).await?;
        let roles = self.store.role_codes(user_id).await?;
        let grants = if roles.is_empty() {
            Vec::new()
        } else {
            self.store.role_grants(&roles, program_id).await?
        };

        let resolution = decide(&program, user_override.as_ref(), &roles, &grants, as_of);
        tracing::debug!(
            user_id = %user_id,
            program_id = %program_id,
            authority = %resolution.authority,
            source = ?resolution.source,
            "authority resolved"
        );
        Ok(resolution)
    }

    /// Loads the user's roles, grants and overrides, plus every program they
    /// reference and every program in `extra_programs`.
    pub async fn snapshot(
        &self,
        user_id: Uuid,
        extra_programs: &BTreeSet<String>,
    ) -> AppResult<GrantSnapshot> {
        let roles = self.store.role_codes(user_id).await?;
        let grants = if roles.is_empty() {
            Vec::new()
        } else {
            self.store.role_grants_for_roles(&roles).await?
        };
        let overrides = self.store.user_overrides(user_id).await?;

        let mut snapshot = GrantSnapshot::new(user_id, roles);
        for grant in grants {
            snapshot = snapshot.with_role_grant(grant);
        }
        for ov in overrides {
            snapshot = snapshot.with_override(ov);
        }

        let mut wanted = snapshot.referenced_programs();
        wanted.extend(extra_programs.iter().cloned());
        for program in self.store.programs(&wanted).await? {
            snapshot = snapshot.with_program(program);
        }

        Ok(snapshot)
    }

    /// Resolves every program the user holds a grant or override for.
    pub async fn effective_authorities(
        &self,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<Resolution>> {
        let snapshot = self.snapshot(user_id, &BTreeSet::new()).await?;

        let mut resolved = Vec::new();
        for program_id in snapshot.referenced_programs() {
            if !snapshot.has_program(&program_id) {
                tracing::warn!(
                    user_id = %user_id,
                    program_id = %program_id,
                    "grant references a missing program; skipping"
                );
                continue;
            }
            resolved.push(snapshot.resolve(&program_id, as_of)?);
        }
        Ok(resolved)
    }

    /// Resolves and checks against `required`, enforcing according to `mode`.
    pub async fn authorize(
        &self,
        user_id: Uuid,
        program_id: &str,
        required: AuthorityLevel,
        as_of: DateTime<Utc>,
        mode: AuthzMode,
    ) -> AppResult<Resolution> {
        let resolution = self.resolve_detailed(user_id, program_id, as_of).await?;
        if resolution.authority.satisfies(required) {
            return Ok(resolution);
        }

        match mode {
            AuthzMode::Off => Ok(resolution),
            AuthzMode::Advisory => {
                tracing::warn!(
                    user_id = %user_id,
                    program_id = %program_id,
                    required = %required,
                    actual = %resolution.authority,
                    "authority insufficient (advisory mode, allowing)"
                );
                Ok(resolution)
            }
            AuthzMode::Strict => {
                tracing::info!(
                    user_id = %user_id,
                    program_id = %program_id,
                    required = %required,
                    actual = %resolution.authority,
                    "authority insufficient"
                );
                Err(AppError::forbidden(format!(
                    "{required} authority required on {program_id}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roles(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_closed_program_vetoes_everything() {
        let user = Uuid::new_v4();
        let program = Program::new("P", "Products").closed();
        let ov = UserProgram::new(user, "P", AuthorityLevel::Admin);
        let grants = vec![RoleProgram::new("R1", "P", AuthorityLevel::Admin)];

        let resolution = decide(&program, Some(&ov), &roles(&["R1"]), &grants, at(2025, 1, 1));
        assert_eq!(resolution.authority, AuthorityLevel::None);
        assert_eq!(resolution.source, AuthoritySource::Closed);
    }

    #[test]
    fn test_override_wins_even_when_lower() {
        let user = Uuid::new_v4();
        let program = Program::new("P", "Products");
        let ov = UserProgram::new(user, "P", AuthorityLevel::Read);
        let grants = vec![RoleProgram::new("R1", "P", AuthorityLevel::Admin)];

        let resolution = decide(&program, Some(&ov), &roles(&["R1"]), &grants, at(2025, 1, 1));
        assert_eq!(resolution.authority, AuthorityLevel::Read);
        assert_eq!(resolution.source, AuthoritySource::Override);
    }

    #[test]
    fn test_lapsed_override_falls_through_to_roles() {
        let user = Uuid::new_v4();
        let program = Program::new("P", "Products");
        let ov = UserProgram::new(user, "P", AuthorityLevel::None)
            .valid_between(None, Some(day(2025, 1, 31)));
        let grants = vec![RoleProgram::new("R1", "P", AuthorityLevel::Write)];

        let on_end = decide(&program, Some(&ov), &roles(&["R1"]), &grants, at(2025, 1, 31));
        assert_eq!(on_end.authority, AuthorityLevel::None);

        let after = decide(&program, Some(&ov), &roles(&["R1"]), &grants, at(2025, 2, 1));
        assert_eq!(after.authority, AuthorityLevel::Write);
        assert_eq!(
            after.source,
            AuthoritySource::Role {
                role_code: "R1".to_string()
            }
        );
    }

    #[test]
    fn test_inverted_window_is_ignored() {
        let user = Uuid::new_v4();
        let program = Program::new("P", "Products");
        let ov = UserProgram::new(user, "P", AuthorityLevel::Admin)
            .valid_between(Some(day(2025, 6, 1)), Some(day(2025, 5, 1)));

        let resolution = decide(&program, Some(&ov), &BTreeSet::new(), &[], at(2025, 5, 15));
        assert_eq!(resolution.authority, AuthorityLevel::None);
        assert_eq!(resolution.source, AuthoritySource::NoGrant);
    }

    #[test]
    fn test_roles_take_maximum_and_skip_disabled_or_unheld() {
        let program = Program::new("P", "Products");
        let grants = vec![
            RoleProgram::new("R1", "P", AuthorityLevel::Read),
            RoleProgram::new("R2", "P", AuthorityLevel::Write),
            RoleProgram::new("R3", "P", AuthorityLevel::Admin).disabled(),
            RoleProgram::new("R4", "P", AuthorityLevel::Execute),
        ];

        let resolution = decide(&program, None, &roles(&["R1", "R2", "R3"]), &grants, at(2025, 1, 1));
        assert_eq!(resolution.authority, AuthorityLevel::Write);
        assert_eq!(
            resolution.source,
            AuthoritySource::Role {
                role_code: "R2".to_string()
            }
        );
    }

    #[test]
    fn test_equal_grants_report_lowest_role_code() {
        let program = Program::new("P", "Products");
        let grants = vec![
            RoleProgram::new("ZETA", "P", AuthorityLevel::Write),
            RoleProgram::new("ALPHA", "P", AuthorityLevel::Write),
        ];

        let resolution = decide(&program, None, &roles(&["ZETA", "ALPHA"]), &grants, at(2025, 1, 1));
        assert_eq!(
            resolution.source,
            AuthoritySource::Role {
                role_code: "ALPHA".to_string()
            }
        );
    }

    #[test]
    fn test_snapshot_reports_missing_program() {
        let snapshot = GrantSnapshot::new(Uuid::new_v4(), Vec::new());
        let err = snapshot.resolve("GHOST", at(2025, 1, 1)).unwrap_err();
        assert!(err.is_not_found());
    }
}
