//! Server-Sent Events stream of workshop events

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::access::Phase;
use crate::events::EventBus;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// One named SSE message before it is framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFrame {
    pub event: &'static str,
    pub data: String,
}

impl EventFrame {
    fn new(event: &'static str, data: impl Into<String>) -> Self {
        Self {
            event,
            data: data.into(),
        }
    }
}

/// Messages for one client: `ConnectionStatus`, the phase current at connect
/// time, then every bus event until the bus closes
pub fn workshop_event_frames(bus: &EventBus, current_phase: Phase) -> impl Stream<Item = EventFrame> {
    let mut rx = bus.subscribe();

    async_stream::stream! {
        yield EventFrame::new("ConnectionStatus", "connected");
        yield EventFrame::new("CurrentPhase", current_phase.as_str());

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!(event_type, "SSE: forwarding event");
                            yield EventFrame::new(event_type, json);
                        }
                        Err(e) => warn!("SSE: Failed to serialize event {}: {}", event_type, e),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: client lagged behind event bus");
                }
                Err(RecvError::Closed) => {
                    info!("SSE: event bus closed, ending stream");
                    break;
                }
            }
        }
    }
}

/// Forward every [`crate::events::WorkshopEvent`] to one SSE client
///
/// Idle connections are kept open by the `heartbeat` keep-alive comment.
pub fn workshop_event_stream(
    bus: &EventBus,
    current_phase: Phase,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to workshop events");
    let stream = workshop_event_frames(bus, current_phase)
        .map(|frame| Ok(Event::default().event(frame.event).data(frame.data)));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WorkshopEvent;
    use chrono::Utc;

    #[tokio::test]
    async fn test_frames_carry_only_bus_events() {
        let bus = EventBus::new(8);
        let mut frames = Box::pin(workshop_event_frames(&bus, Phase::Categories));

        assert_eq!(frames.next().await, Some(EventFrame::new("ConnectionStatus", "connected")));
        assert_eq!(frames.next().await, Some(EventFrame::new("CurrentPhase", "2_categories")));

        let idle = tokio::time::timeout(Duration::from_millis(50), frames.next()).await;
        assert!(idle.is_err(), "nothing is sent while the bus is quiet");

        bus.emit_lossy(WorkshopEvent::JourneyDeleted {
            journey_id: "j-1".to_string(),
            timestamp: Utc::now(),
        });
        let frame = frames.next().await.unwrap();
        assert_eq!(frame.event, "JourneyDeleted");
        assert!(frame.data.contains("\"journey_id\":\"j-1\""));
    }
}
