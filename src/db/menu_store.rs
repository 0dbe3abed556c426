use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use super::row_parsers::{favorite_from_row, menu_from_row};
use super::SqliteStore;
use crate::errors::{AppError, AppResult};
use crate::menu::{MenuSource, ProgramMapping};
use crate::models::menu::{FavoriteMenu, Menu};

#[async_trait]
impl MenuSource for SqliteStore {
    async fn menus(&self) -> AppResult<Vec<Menu>> {
        let rows = sqlx::query("SELECT id, parent_id, menu_name, sort_order, use_yn FROM menus")
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(menu_from_row).collect()
    }

    async fn program_mapping(&self) -> AppResult<ProgramMapping> {
        let rows = sqlx::query(
            "SELECT id, program_id FROM menus WHERE program_id IS NOT NULL AND TRIM(program_id) <> ''",
        )
        .fetch_all(self.pool())
        .await?;

        let mut mapping = ProgramMapping::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row
                .try_get("id")
                .map_err(|e| AppError::internal(format!("missing id: {}", e)))?;
            let program_id: String = row
                .try_get("program_id")
                .map_err(|e| AppError::internal(format!("missing program_id: {}", e)))?;
            mapping.insert(id, program_id.trim().to_string());
        }
        Ok(mapping)
    }

    async fn favorites(&self, user_id: Uuid) -> AppResult<Vec<FavoriteMenu>> {
        let rows = sqlx::query("SELECT user_id, menu_id, created_at FROM favorite_menus WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(favorite_from_row).collect()
    }
}
