//! Start page: groups and identity registration; logged claims

use ajl_common::db::claims::{self, NewClaim, RECENT_CLAIMS_LIMIT};
use ajl_common::db::{groups, ClaimRecord, GroupRecord};
use ajl_common::{Identity, RouteId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::caller::Caller;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/groups
pub async fn list_groups(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<GroupRecord>>> {
    caller.require_view(RouteId::Start)?;
    Ok(Json(groups::list_groups(&state.db).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub display_name: String,
    pub group_id: String,
    /// Kept when the browser already has a session
    pub session_id: Option<Uuid>,
}

/// POST /api/identity
///
/// Returns the identity the client must send back in the identity header.
pub async fn register_identity(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Identity>)> {
    caller.require_write(RouteId::Start)?;

    let group = groups::get_group(&state.db, request.group_id.trim())
        .await?
        .ok_or_else(|| ApiError::BadRequest("Choose a group so we can attribute entries.".to_string()))?;
    let identity = Identity::register(&request.display_name, &group.id, &group.name, request.session_id)?;

    info!(group = %group.name, session = %identity.session_id, "Identity registered");
    Ok((StatusCode::CREATED, Json(identity)))
}

/// GET /api/claims
pub async fn list_claims(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<ClaimRecord>>> {
    caller.require_view(RouteId::Wizard)?;
    Ok(Json(claims::recent_claims(&state.db, RECENT_CLAIMS_LIMIT).await?))
}

/// POST /api/claims
pub async fn create_claim(
    State(state): State<AppState>,
    caller: Caller,
    Json(claim): Json<NewClaim>,
) -> ApiResult<(StatusCode, Json<ClaimRecord>)> {
    caller.require_write(RouteId::Wizard)?;
    let author = caller.identity()?;
    let record = claims::insert_claim(&state.db, &claim, author).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// DELETE /api/claims/:id
///
/// Only the session that logged the claim may remove it.
pub async fn delete_claim(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require_write(RouteId::Wizard)?;
    let identity = caller.identity()?;
    claims::delete_claim(&state.db, &id, &identity.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn identity_routes() -> Router<AppState> {
    Router::new()
        .route("/api/groups", get(list_groups))
        .route("/api/identity", post(register_identity))
        .route("/api/claims", get(list_claims).post(create_claim))
        .route("/api/claims/:id", delete(delete_claim))
}
