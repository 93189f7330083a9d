//! OpenStreetMap Notes helper (phase 3, category groups)
//!
//! Builds note text from a journey and records the scope and note URL that
//! the participants report back.

use ajl_common::db::journeys;
use ajl_common::db::public::{self, OSM_NEW_NOTE_URL};
use ajl_common::db::IssueScope;
use ajl_common::RouteId;
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::caller::Caller;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OsmNote {
    /// Absent for the example template
    pub journey_id: Option<String>,
    pub journey_code: Option<String>,
    pub note_text: String,
    pub issue_scope: Option<IssueScope>,
    pub osm_note_url: Option<String>,
    pub notes_url: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteQuery {
    pub journey: Option<String>,
}

/// GET /api/osm/note?journey=<id>
///
/// Without a journey the example template comes back.
pub async fn get_note(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<NoteQuery>,
) -> ApiResult<Json<OsmNote>> {
    caller.require_view(RouteId::Osm)?;

    let Some(id) = query.journey.filter(|id| !id.trim().is_empty()) else {
        return Ok(Json(OsmNote {
            journey_id: None,
            journey_code: None,
            note_text: public::example_note_text(),
            issue_scope: None,
            osm_note_url: None,
            notes_url: OSM_NEW_NOTE_URL,
        }));
    };

    let journey = journeys::get_journey(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Journey {}", id)))?;
    Ok(Json(OsmNote {
        note_text: public::osm_note_text(&journey),
        journey_code: Some(journey.fields.journey_code.clone()),
        issue_scope: journey.issue_scope,
        osm_note_url: journey.osm_note_url,
        journey_id: Some(journey.id),
        notes_url: OSM_NEW_NOTE_URL,
    }))
}

#[derive(Debug, Deserialize)]
pub struct NoteUrlRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteUrlSaved {
    pub osm_note_url: String,
    pub message: &'static str,
}

/// PUT /api/osm/journeys/:id/note-url
pub async fn save_note_url(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(request): Json<NoteUrlRequest>,
) -> ApiResult<Json<NoteUrlSaved>> {
    caller.require_write(RouteId::Osm)?;
    caller.identity()?;

    let osm_note_url = public::set_osm_note_url(&state.db, &id, &request.url).await?;
    Ok(Json(NoteUrlSaved {
        osm_note_url,
        message: "OSM note URL saved back to this journey.",
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssueScopeRequest {
    pub scope: IssueScope,
}

/// PUT /api/osm/journeys/:id/issue-scope
pub async fn save_issue_scope(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(request): Json<IssueScopeRequest>,
) -> ApiResult<Json<IssueScopeRequest>> {
    caller.require_write(RouteId::Osm)?;
    let identity = caller.identity()?;

    public::set_issue_scope(&state.db, &id, request.scope).await?;
    info!(journey = %id, session = %identity.session_id, "Issue scope recorded");
    Ok(Json(request))
}

pub fn osm_routes() -> Router<AppState> {
    Router::new()
        .route("/api/osm/note", get(get_note))
        .route("/api/osm/journeys/:id/note-url", put(save_note_url))
        .route("/api/osm/journeys/:id/issue-scope", put(save_issue_scope))
}
