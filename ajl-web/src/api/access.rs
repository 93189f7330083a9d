//! Access queries used by pages to gate themselves and render navigation

use ajl_common::access::{nav_tooltip, AccessMode, GroupNumber, Phase, RouteId};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::caller::Caller;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub route: String,
}

#[derive(Debug, Serialize)]
pub struct RouteAccess {
    pub route: RouteId,
    pub mode: AccessMode,
    /// Why the route is closed; empty when it is open
    pub tooltip: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavResponse {
    pub phase: Phase,
    pub phase_label: String,
    pub banner: String,
    pub group: Option<GroupNumber>,
    pub routes: Vec<RouteAccess>,
}

fn route_access_for(caller: &Caller, state: &AppState, route: RouteId) -> RouteAccess {
    RouteAccess {
        route,
        mode: caller.access(route),
        tooltip: nav_tooltip(route, caller.phase, caller.group(), &state.settings.phase_labels),
    }
}

/// GET /api/access?route=
pub async fn get_access(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AccessQuery>,
) -> ApiResult<Json<RouteAccess>> {
    let route: RouteId = query
        .route
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown route: {}", query.route)))?;
    Ok(Json(route_access_for(&caller, &state, route)))
}

/// GET /api/nav
pub async fn get_nav(State(state): State<AppState>, caller: Caller) -> Json<NavResponse> {
    let phase_label = state.settings.phase_labels.label(caller.phase).to_string();
    Json(NavResponse {
        phase: caller.phase,
        banner: phase_label.to_uppercase(),
        phase_label,
        group: caller.group(),
        routes: RouteId::ALL
            .into_iter()
            .map(|route| route_access_for(&caller, &state, route))
            .collect(),
    })
}

pub fn access_routes() -> Router<AppState> {
    Router::new()
        .route("/api/access", get(get_access))
        .route("/api/nav", get(get_nav))
}
