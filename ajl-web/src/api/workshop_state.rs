//! Facilitator-controlled workshop phase

use ajl_common::db::workshop_state;
use ajl_common::{Phase, WorkshopEvent};
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PhaseResponse {
    pub phase: Phase,
}

#[derive(Debug, Deserialize)]
pub struct PhaseUpdate {
    pub phase: String,
}

/// GET /api/workshop-state
///
/// Falls back to the default phase when the stored value cannot be read.
pub async fn get_workshop_state(State(state): State<AppState>) -> Json<PhaseResponse> {
    let phase = match workshop_state::read_phase(&state.db).await {
        Ok(phase) => {
            state.phase_store.set(phase);
            phase
        }
        Err(e) => {
            warn!("Could not read workshop phase, reporting default: {}", e);
            Phase::default()
        }
    };
    Json(PhaseResponse { phase })
}

/// PATCH /api/workshop-state
pub async fn set_workshop_state(
    State(state): State<AppState>,
    Json(update): Json<PhaseUpdate>,
) -> ApiResult<Json<PhaseResponse>> {
    let phase: Phase = update
        .phase
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid phase".to_string()))?;

    let previous = workshop_state::write_phase(&state.db, phase).await?;
    state.phase_store.set(phase);

    if previous != phase {
        info!(from = %previous, to = %phase, "Workshop phase switched");
        state.event_bus.emit_lossy(WorkshopEvent::PhaseChanged {
            old_phase: previous,
            new_phase: phase,
            timestamp: Utc::now(),
        });
    }

    Ok(Json(PhaseResponse { phase }))
}

pub fn workshop_state_routes() -> Router<AppState> {
    Router::new().route(
        "/api/workshop-state",
        get(get_workshop_state).patch(set_workshop_state),
    )
}
