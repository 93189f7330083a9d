//! # Access Journey Logging common library
//!
//! Domain rules and persistence shared by the workshop service and tools:
//! - Phase/group access control and navigation tooltips
//! - Participant identity
//! - The seven-step journey submission wizard
//! - Phase store and background poller
//! - SQLite schema and typed queries, evidence object storage
//! - Workshop events and their SSE stream
//! - Configuration loading

pub mod access;
pub mod config;
pub mod csv;
pub mod db;
pub mod error;
pub mod events;
pub mod identity;
pub mod phase;
pub mod sse;
pub mod storage;
pub mod wizard;

pub use access::{AccessMode, GroupNumber, Phase, PhaseLabels, RouteId};
pub use error::{Error, Result};
pub use events::{EventBus, WorkshopEvent};
pub use identity::Identity;
pub use phase::{PhaseStore, PhaseSource};
pub use storage::ObjectStore;
