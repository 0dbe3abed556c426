use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use super::{as_of_or_now, AsOfQuery};
use crate::app::AppState;
use crate::authz::{AuthorityLevel, Resolution};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResolveQuery {
    /// Evaluate as of this calendar day (`YYYY-MM-DD`). Defaults to now.
    pub as_of: Option<String>,
    /// When present, the caller must hold at least this authority.
    pub required: Option<String>,
}

#[utoipa::path(
    get,
    path = "/authz/programs/{program_id}",
    tag = "Authz",
    params(
        ("program_id" = String, Path, description = "Program identifier"),
        ResolveQuery
    ),
    responses(
        (status = 200, description = "Effective authority and the rule that decided it", body = Resolution),
        (status = 400, description = "Malformed as_of or required"),
        (status = 403, description = "Below the required authority"),
        (status = 404, description = "Program not found")
    )
)]
pub async fn resolve_program(
    State(state): State<AppState>,
    user: AuthUser,
    Path(program_id): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> AppResult<Json<Resolution>> {
    let as_of = as_of_or_now(&state, query.as_of.as_deref())?;

    let resolution = match query.required.as_deref() {
        Some(required) => {
            let required = required
                .parse::<AuthorityLevel>()
                .map_err(|err| AppError::bad_request(err.to_string()))?;
            state
                .resolver
                .authorize(user.user_id, &program_id, required, as_of, state.authz_mode)
                .await?
        }
        None => state.resolver.resolve_detailed(user.user_id, &program_id, as_of).await?,
    };

    Ok(Json(resolution))
}

#[utoipa::path(
    get,
    path = "/authz/effective",
    tag = "Authz",
    params(AsOfQuery),
    responses((status = 200, description = "Every program the caller holds a grant or override for", body = [Resolution]))
)]
pub async fn effective_authorities(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AsOfQuery>,
) -> AppResult<Json<Vec<Resolution>>> {
    let as_of = query.resolve(&state)?;
    let resolved = state.resolver.effective_authorities(user.user_id, as_of).await?;
    Ok(Json(resolved))
}
