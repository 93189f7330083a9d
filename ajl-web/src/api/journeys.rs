//! Journeys feed, detail, deletion, stored evidence objects and the place map

use ajl_common::db::journeys::{
    self, FeedEntry, JourneyDetail, JourneyFilter, MapPlace, FEED_LIMIT,
};
use ajl_common::storage::content_type_for;
use ajl_common::{RouteId, WorkshopEvent};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use crate::caller::Caller;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/journeys
pub async fn list_journeys(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<JourneyFilter>,
) -> ApiResult<Json<Vec<FeedEntry>>> {
    caller.require_view(RouteId::Feed)?;
    Ok(Json(journeys::feed(&state.db, &filter, FEED_LIMIT).await?))
}

/// GET /api/journeys/:id
pub async fn get_journey(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<JourneyDetail>> {
    caller.require_view(RouteId::Journey)?;
    journeys::get_journey_detail(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Journey {}", id)))
}

/// DELETE /api/journeys/:id
///
/// Allowed only for the session that logged the journey.
pub async fn delete_journey(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require_write(RouteId::Journey)?;
    let identity = caller.identity()?;

    journeys::delete_journey(&state.db, &state.object_store, &id, &identity.session_id).await?;
    state.event_bus.emit_lossy(WorkshopEvent::JourneyDeleted {
        journey_id: id,
        timestamp: Utc::now(),
    });
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/evidence/:id/object
pub async fn get_evidence_object(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    caller.require_view(RouteId::Journey)?;
    let evidence = journeys::get_evidence(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Evidence {}", id)))?;
    let path = evidence
        .evidence
        .storage_path
        .ok_or_else(|| ApiError::NotFound(format!("Evidence {} has no stored file", id)))?;

    let bytes = state.object_store.get(&path).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes))
}

/// GET /api/map/places
pub async fn list_places(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<MapPlace>>> {
    caller.require_view(RouteId::Map)?;
    Ok(Json(journeys::map_places(&state.db).await?))
}

pub fn journey_routes() -> Router<AppState> {
    Router::new()
        .route("/api/journeys", get(list_journeys))
        .route("/api/journeys/:id", get(get_journey).delete(delete_journey))
        .route("/api/evidence/:id/object", get(get_evidence_object))
        .route("/api/map/places", get(list_places))
}
