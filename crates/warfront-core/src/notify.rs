//! Event publisher port and in-process publishers.
//!
//! Publishing is fire-and-forget: [`EventPublisher::publish`] must return
//! immediately and never report failure to the caller. Transport adapters
//! (see `warfront-nats`) hand the event to a background task and log
//! delivery errors themselves.

use std::sync::Mutex;

use warfront_types::{Event, EventType};

/// Receives domain events after successful transitions.
pub trait EventPublisher: Send + Sync {
    /// Hand off an event for delivery. Must not block.
    fn publish(&self, event: &Event);
}

/// Writes every event to the `tracing` log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl EventPublisher for LogPublisher {
    fn publish(&self, event: &Event) {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            war_id = %event.war_id,
            battle_id = ?event.battle_id.map(|b| b.to_string()),
            "domain event"
        );
    }
}

/// Keeps every published event in memory, in publication order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingPublisher {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Published events of one type, in order.
    pub fn of_type(&self, event_type: EventType) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Types of all published events, in order.
    pub fn types(&self) -> Vec<EventType> {
        self.events().iter().map(|e| e.event_type).collect()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
