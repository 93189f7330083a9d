//! Workshop events
//!
//! Events are broadcast on an [`EventBus`] and forwarded to browsers over
//! SSE so that open pages notice phase switches and new submissions without
//! waiting for their next poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::access::Phase;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkshopEvent {
    /// Facilitator switched the workshop phase
    PhaseChanged {
        old_phase: Phase,
        new_phase: Phase,
        timestamp: DateTime<Utc>,
    },

    /// A journey and all its rows were written
    JourneySubmitted {
        journey_id: String,
        journey_code: String,
        group_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A journey was removed along with its steps and evidence
    JourneyDeleted {
        journey_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Bulk category edit applied
    CategoriesReassigned {
        field: String,
        from_value: String,
        to_value: String,
        updated: u64,
        timestamp: DateTime<Utc>,
    },
}

impl WorkshopEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkshopEvent::PhaseChanged { .. } => "PhaseChanged",
            WorkshopEvent::JourneySubmitted { .. } => "JourneySubmitted",
            WorkshopEvent::JourneyDeleted { .. } => "JourneyDeleted",
            WorkshopEvent::CategoriesReassigned { .. } => "CategoriesReassigned",
        }
    }
}

/// Broadcast channel shared by every handler that emits events
///
/// Slow subscribers lag and lose old events; producers never block.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WorkshopEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<WorkshopEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of subscribers reached, or `Err` when nobody listens
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: WorkshopEvent,
    ) -> Result<usize, broadcast::error::SendError<WorkshopEvent>> {
        self.tx.send(event)
    }

    /// Emit without caring whether anyone is listening
    pub fn emit_lossy(&self, event: WorkshopEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase_changed() -> WorkshopEvent {
        WorkshopEvent::PhaseChanged {
            old_phase: Phase::EvidenceCollection,
            new_phase: Phase::Categories,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(phase_changed()).is_err());
        bus.emit_lossy(phase_changed());
    }

    #[test]
    fn test_every_subscriber_receives() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.emit(phase_changed()).unwrap(), 2);
        assert_eq!(rx1.try_recv().unwrap().event_type(), "PhaseChanged");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "PhaseChanged");
    }

    #[test]
    fn test_lossy_emit_on_full_channel() {
        let bus = EventBus::new(2);
        let _rx = bus.subscribe();
        for i in 0..10 {
            bus.emit_lossy(WorkshopEvent::JourneyDeleted {
                journey_id: format!("j-{}", i),
                timestamp: Utc::now(),
            });
        }
        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_wire_form_is_tagged() {
        let json = serde_json::to_value(phase_changed()).unwrap();
        assert_eq!(json["type"], "PhaseChanged");
        assert_eq!(json["new_phase"], "2_categories");
    }
}
