use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::category::to_items;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::category::{Category, CategoryTreeItem};

#[utoipa::path(
    get,
    path = "/categories",
    tag = "Categories",
    responses((status = 200, description = "Active category tree", body = [CategoryTreeItem]))
)]
pub async fn active_tree(State(state): State<AppState>, _user: AuthUser) -> AppResult<Json<Vec<CategoryTreeItem>>> {
    let tree = state.categories.active_tree().await?;
    Ok(Json(to_items(&tree)))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "Categories",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Active subtree in pre-order", body = [Category]),
        (status = 404, description = "Unknown or hidden category")
    )
)]
pub async fn active_subtree(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.categories.active_subtree(id).await?))
}

#[utoipa::path(
    get,
    path = "/categories/{id}/path",
    tag = "Categories",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Root-to-category breadcrumb", body = [Category]),
        (status = 404, description = "Unknown category")
    )
)]
pub async fn path(State(state): State<AppState>, _user: AuthUser, Path(id): Path<i64>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.categories.path(id).await?))
}
