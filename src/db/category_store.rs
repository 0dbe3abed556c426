use async_trait::async_trait;

use super::row_parsers::category_from_row;
use super::SqliteStore;
use crate::category::CategorySource;
use crate::errors::AppResult;
use crate::models::category::Category;

#[async_trait]
impl CategorySource for SqliteStore {
    async fn categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, parent_id, category_name, sort_order, use_yn FROM categories")
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(category_from_row).collect()
    }
}
