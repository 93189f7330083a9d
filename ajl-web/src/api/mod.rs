//! HTTP API handlers for ajl-web

pub mod access;
pub mod categories;
pub mod export;
pub mod health;
pub mod identity;
pub mod journeys;
pub mod osm;
pub mod sse;
pub mod wizard;
pub mod workshop_state;

pub use access::access_routes;
pub use categories::category_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use identity::identity_routes;
pub use journeys::journey_routes;
pub use osm::osm_routes;
pub use sse::sse_routes;
pub use wizard::wizard_routes;
pub use workshop_state::workshop_state_routes;
