//! CSV exports, the story pack and the public summary

use ajl_common::csv::CONTENT_TYPE as CSV_CONTENT_TYPE;
use ajl_common::db::export::{self, StoryPackSource, EVIDENCE_FILENAME, JOURNEYS_FILENAME, STEPS_FILENAME};
use ajl_common::db::public::{self, PublicSummary};
use ajl_common::{Phase, RouteId};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::caller::Caller;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename)
}

fn csv_download(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, attachment(filename)),
        ],
        body,
    )
        .into_response()
}

/// GET /api/export/journeys.csv
pub async fn export_journeys(State(state): State<AppState>, caller: Caller) -> ApiResult<Response> {
    caller.require_view(RouteId::Export)?;
    Ok(csv_download(JOURNEYS_FILENAME, export::journeys_csv(&state.db).await?))
}

/// GET /api/export/steps.csv
pub async fn export_steps(State(state): State<AppState>, caller: Caller) -> ApiResult<Response> {
    caller.require_view(RouteId::Export)?;
    Ok(csv_download(STEPS_FILENAME, export::steps_csv(&state.db).await?))
}

/// GET /api/export/evidence.csv
pub async fn export_evidence(State(state): State<AppState>, caller: Caller) -> ApiResult<Response> {
    caller.require_view(RouteId::Export)?;
    Ok(csv_download(EVIDENCE_FILENAME, export::evidence_csv(&state.db).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct StoryPackQuery {
    pub ids: Option<String>,
    pub note: Option<String>,
}

/// GET /api/export/story-pack?ids=a,b or ?note=<story note id>
pub async fn export_story_pack(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<StoryPackQuery>,
) -> ApiResult<Response> {
    caller.require_view(RouteId::Export)?;
    let source = StoryPackSource::from_query(query.ids.as_deref(), query.note.as_deref())?;
    let pack = export::story_pack(&state.db, &source).await?;
    let disposition = attachment(&pack.filename());
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(pack)).into_response())
}

/// GET /api/export/public-summary
///
/// Counts behind the public contribution panel; only shown in phase 3.
pub async fn get_public_summary(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<PublicSummary>> {
    caller.require_view(RouteId::Export)?;
    if caller.phase != Phase::PublicContribution {
        return Err(ApiError::Forbidden(
            "The public contribution summary opens in phase 3.".to_string(),
        ));
    }
    Ok(Json(public::public_summary(&state.db).await?))
}

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export/journeys.csv", get(export_journeys))
        .route("/api/export/steps.csv", get(export_steps))
        .route("/api/export/evidence.csv", get(export_evidence))
        .route("/api/export/story-pack", get(export_story_pack))
        .route("/api/export/public-summary", get(get_public_summary))
}
