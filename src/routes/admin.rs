use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::events::TreeChanged;
use crate::jwt::AuthUser;

/// Called by the write layer after it commits a menu or category change.
#[utoipa::path(
    post,
    path = "/admin/trees/invalidate",
    tag = "Admin",
    request_body = TreeChanged,
    responses(
        (status = 204, description = "Cached index dropped; the next read rebuilds it"),
        (status = 401, description = "Missing or invalid bearer token")
    )
)]
pub async fn invalidate_tree(
    State(state): State<AppState>,
    user: AuthUser,
    Json(change): Json<TreeChanged>,
) -> StatusCode {
    tracing::info!(
        actor_id = %user.user_id,
        kind = ?change.kind,
        action = ?change.action,
        node_id = change.node_id,
        "tree invalidation requested"
    );
    state.invalidate_tree(Some(user.user_id), change).await;
    StatusCode::NO_CONTENT
}
