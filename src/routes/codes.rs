use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::code::{CommonCode, CommonCodeGroup};

#[utoipa::path(
    get,
    path = "/codes",
    tag = "Codes",
    responses((status = 200, description = "Enabled code groups", body = [CommonCodeGroup]))
)]
pub async fn active_groups(State(state): State<AppState>, _user: AuthUser) -> AppResult<Json<Vec<CommonCodeGroup>>> {
    Ok(Json(state.codes.active_groups().await?))
}

#[utoipa::path(
    get,
    path = "/codes/{group_code}",
    tag = "Codes",
    params(("group_code" = String, Path, description = "Code group")),
    responses((status = 200, description = "Usable codes of the group; empty when the group is disabled or unknown", body = [CommonCode]))
)]
pub async fn active_codes(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(group_code): Path<String>,
) -> AppResult<Json<Vec<CommonCode>>> {
    Ok(Json(state.codes.active_codes(&group_code).await?))
}

#[utoipa::path(
    get,
    path = "/codes/{group_code}/{code}",
    tag = "Codes",
    params(
        ("group_code" = String, Path, description = "Code group"),
        ("code" = String, Path, description = "Code within the group")
    ),
    responses(
        (status = 200, description = "The code", body = CommonCode),
        (status = 404, description = "Missing, disabled, or in a disabled group")
    )
)]
pub async fn resolve_code(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((group_code, code)): Path<(String, String)>,
) -> AppResult<Json<CommonCode>> {
    Ok(Json(state.codes.resolve_code(&group_code, &code).await?))
}
