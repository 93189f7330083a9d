//! ajl-web library: the workshop HTTP service
//!
//! Exposes phase state, access queries, identity registration, wizard
//! sessions, the journeys feed, category tools, the place map, exports and
//! the SSE event stream.

use ajl_common::access::PhaseLabels;
use ajl_common::{EventBus, ObjectStore, PhaseStore};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

pub mod api;
pub mod caller;
pub mod drafts;
pub mod error;

pub use drafts::{DraftSweeper, WizardSession, WizardSessions};

/// Service-wide settings taken from configuration
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub phase_labels: PhaseLabels,
    pub journey_code_prefix: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            phase_labels: PhaseLabels::default(),
            journey_code_prefix: ajl_common::wizard::submission::DEFAULT_CODE_PREFIX.to_string(),
        }
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub phase_store: PhaseStore,
    /// Asks the phase poller for an immediate re-read
    pub phase_refresh: mpsc::Sender<()>,
    pub event_bus: EventBus,
    pub object_store: ObjectStore,
    pub wizards: WizardSessions,
    pub settings: Arc<ServiceSettings>,
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        phase_store: PhaseStore,
        phase_refresh: mpsc::Sender<()>,
        event_bus: EventBus,
        object_store: ObjectStore,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db,
            phase_store,
            phase_refresh,
            event_bus,
            object_store,
            wizards: WizardSessions::new(),
            settings: Arc::new(settings),
            startup_time: Instant::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::workshop_state_routes())
        .merge(api::access_routes())
        .merge(api::identity_routes())
        .merge(api::wizard_routes())
        .merge(api::journey_routes())
        .merge(api::category_routes())
        .merge(api::export_routes())
        .merge(api::osm_routes())
        .merge(api::sse_routes())
        .with_state(state)
}
