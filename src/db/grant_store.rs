use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use super::row_parsers::{program_from_row, role_program_from_row, user_program_from_row};
use super::SqliteStore;
use crate::authz::GrantStore;
use crate::errors::{AppError, AppResult};
use crate::models::program::{Program, RoleProgram, UserProgram};

const ROLE_PROGRAM_COLUMNS: &str = "SELECT role_code, program_id, role_authority, use_yn FROM role_programs";

/// `<prefix> IN (?, ?, ...)` over a non-empty set.
fn push_in_list<'a>(qb: &mut QueryBuilder<'a, Sqlite>, values: &BTreeSet<String>) {
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl GrantStore for SqliteStore {
    async fn program(&self, program_id: &str) -> AppResult<Option<Program>> {
        let row = sqlx::query("SELECT program_id, program_name, close_yn FROM programs WHERE program_id = ?")
            .bind(program_id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(program_from_row).transpose()
    }

    async fn programs(&self, program_ids: &BTreeSet<String>) -> AppResult<Vec<Program>> {
        if program_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT program_id, program_name, close_yn FROM programs WHERE program_id");
        push_in_list(&mut qb, program_ids);
        let rows = qb.build().fetch_all(self.pool()).await?;

        rows.iter().map(program_from_row).collect()
    }

    async fn role_codes(&self, user_id: Uuid) -> AppResult<BTreeSet<String>> {
        let rows = sqlx::query("SELECT role_code FROM user_roles WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_all(self.pool())
            .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("role_code")
                    .map_err(|e| AppError::internal(format!("missing role_code: {}", e)))
            })
            .collect()
    }

    async fn role_grants(
        &self,
        role_codes: &BTreeSet<String>,
        program_id: &str,
    ) -> AppResult<Vec<RoleProgram>> {
        if role_codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(ROLE_PROGRAM_COLUMNS);
        qb.push(" WHERE program_id = ").push_bind(program_id.to_string());
        qb.push(" AND role_code");
        push_in_list(&mut qb, role_codes);
        let rows = qb.build().fetch_all(self.pool()).await?;

        rows.iter().map(role_program_from_row).collect()
    }

    async fn role_grants_for_roles(&self, role_codes: &BTreeSet<String>) -> AppResult<Vec<RoleProgram>> {
        if role_codes.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(ROLE_PROGRAM_COLUMNS);
        qb.push(" WHERE role_code");
        push_in_list(&mut qb, role_codes);
        let rows = qb.build().fetch_all(self.pool()).await?;

        rows.iter().map(role_program_from_row).collect()
    }

    async fn user_override(&self, user_id: Uuid, program_id: &str) -> AppResult<Option<UserProgram>> {
        let row = sqlx::query(
            "SELECT user_id, program_id, user_authority, valid_begin_date, valid_end_date \
             FROM user_programs WHERE user_id = ? AND program_id = ?",
        )
        .bind(user_id.to_string())
        .bind(program_id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(user_program_from_row).transpose()
    }

    async fn user_overrides(&self, user_id: Uuid) -> AppResult<Vec<UserProgram>> {
        let rows = sqlx::query(
            "SELECT user_id, program_id, user_authority, valid_begin_date, valid_end_date \
             FROM user_programs WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(user_program_from_row).collect()
    }
}
