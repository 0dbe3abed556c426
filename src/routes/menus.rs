use axum::extract::{Query, State};
use axum::Json;

use super::AsOfQuery;
use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::menu::{Menu, MenuTreeItem};

#[utoipa::path(
    get,
    path = "/menus/visible",
    tag = "Menus",
    params(AsOfQuery),
    responses(
        (status = 200, description = "Nested menu tree visible to the caller", body = [MenuTreeItem]),
        (status = 404, description = "A menu is mapped to a missing program"),
        (status = 500, description = "Menu hierarchy is corrupt")
    )
)]
pub async fn visible_menus(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AsOfQuery>,
) -> AppResult<Json<Vec<MenuTreeItem>>> {
    let as_of = query.resolve(&state)?;
    let visible = state.menus.visible_menu_tree(user.user_id, as_of).await?;
    Ok(Json(visible.to_items()))
}

#[utoipa::path(
    get,
    path = "/menus/favorites",
    tag = "Menus",
    params(AsOfQuery),
    responses((status = 200, description = "Caller's favorites that are currently visible", body = [Menu]))
)]
pub async fn visible_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AsOfQuery>,
) -> AppResult<Json<Vec<Menu>>> {
    let as_of = query.resolve(&state)?;
    let favorites = state.menus.visible_favorites(user.user_id, as_of).await?;
    Ok(Json(favorites))
}
