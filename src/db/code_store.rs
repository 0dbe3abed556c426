use async_trait::async_trait;

use super::row_parsers::{code_from_row, code_group_from_row};
use super::SqliteStore;
use crate::codes::CodeSource;
use crate::errors::AppResult;
use crate::models::code::{CommonCode, CommonCodeGroup};

#[async_trait]
impl CodeSource for SqliteStore {
    async fn group(&self, group_code: &str) -> AppResult<Option<CommonCodeGroup>> {
        let row = sqlx::query(
            "SELECT group_code, group_name, sort_order, use_yn FROM common_code_groups WHERE group_code = ?",
        )
        .bind(group_code)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(code_group_from_row).transpose()
    }

    async fn groups(&self) -> AppResult<Vec<CommonCodeGroup>> {
        let rows = sqlx::query("SELECT group_code, group_name, sort_order, use_yn FROM common_code_groups")
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(code_group_from_row).collect()
    }

    async fn codes(&self, group_code: &str) -> AppResult<Vec<CommonCode>> {
        let rows = sqlx::query(
            "SELECT group_code, code, code_name, sort_order, use_yn FROM common_codes WHERE group_code = ?",
        )
        .bind(group_code)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(code_from_row).collect()
    }

    async fn code(&self, group_code: &str, code: &str) -> AppResult<Option<CommonCode>> {
        let row = sqlx::query(
            "SELECT group_code, code, code_name, sort_order, use_yn FROM common_codes \
             WHERE group_code = ? AND code = ?",
        )
        .bind(group_code)
        .bind(code)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(code_from_row).transpose()
    }
}
