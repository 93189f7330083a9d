//! Category & governance tools

use ajl_common::db::categories::{self, CategorySummary, NewSuggestion};
use ajl_common::db::{CategoryField, CategorySuggestion};
use ajl_common::{RouteId, WorkshopEvent};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::caller::Caller;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/categories/summary
pub async fn get_summary(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<CategorySummary>> {
    caller.require_view(RouteId::Category)?;
    Ok(Json(categories::summary(&state.db).await?))
}

/// GET /api/categories/suggestions
pub async fn list_suggestions(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Vec<CategorySuggestion>>> {
    caller.require_view(RouteId::Category)?;
    Ok(Json(categories::list_suggestions(&state.db).await?))
}

/// POST /api/categories/suggestions
pub async fn create_suggestion(
    State(state): State<AppState>,
    caller: Caller,
    Json(new): Json<NewSuggestion>,
) -> ApiResult<(StatusCode, Json<CategorySuggestion>)> {
    caller.require_write(RouteId::Category)?;
    let author = caller.identity()?;
    let saved = categories::insert_suggestion(&state.db, &new, author).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// DELETE /api/categories/suggestions/:id
pub async fn delete_suggestion(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require_write(RouteId::Category)?;
    categories::delete_suggestion(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CountQuery {
    pub field: String,
    pub old: String,
}

#[derive(Debug, Serialize)]
pub struct ReassignCount {
    pub field: CategoryField,
    pub count: u64,
    pub message: String,
}

/// GET /api/categories/reassign/count?field=&old=
pub async fn count_reassign(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<CountQuery>,
) -> ApiResult<Json<ReassignCount>> {
    caller.require_view(RouteId::Category)?;
    let field: CategoryField = query.field.parse()?;
    let count = categories::reassign_count(&state.db, field, &query.old).await?;
    let message = if count == 0 {
        "No entries with that value.".to_string()
    } else {
        format!("{} entries may require updating.", count)
    };
    Ok(Json(ReassignCount { field, count, message }))
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub field: String,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Serialize)]
pub struct ReassignResult {
    pub field: CategoryField,
    pub updated: u64,
    pub message: String,
}

/// POST /api/categories/reassign
pub async fn run_reassign(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<ReassignRequest>,
) -> ApiResult<Json<ReassignResult>> {
    caller.require_write(RouteId::Category)?;
    let field: CategoryField = request.field.parse()?;
    let updated = categories::reassign(&state.db, field, &request.old, &request.new).await?;

    let message = if updated == 0 {
        "No entries to update.".to_string()
    } else {
        state.event_bus.emit_lossy(WorkshopEvent::CategoriesReassigned {
            field: field.column().to_string(),
            from_value: request.old.trim().to_string(),
            to_value: request.new.trim().to_string(),
            updated,
            timestamp: Utc::now(),
        });
        format!("Updated {} entries.", updated)
    };
    Ok(Json(ReassignResult { field, updated, message }))
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories/summary", get(get_summary))
        .route(
            "/api/categories/suggestions",
            get(list_suggestions).post(create_suggestion),
        )
        .route("/api/categories/suggestions/:id", delete(delete_suggestion))
        .route("/api/categories/reassign/count", get(count_reassign))
        .route("/api/categories/reassign", axum::routing::post(run_reassign))
}
