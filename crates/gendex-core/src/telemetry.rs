//! Usage events and the fire-and-forget sink they are handed to.
//!
//! Emitting must never block or fail the caller. Implementations drop
//! events rather than push back.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    WriteSummary {
        index: String,
        documents: u64,
        optimized: bool,
        timestamp: DateTime<Utc>,
    },
    ReadSummary {
        index: String,
        documents: u64,
        canceled: bool,
        timestamp: DateTime<Utc>,
    },
    SearchSummary {
        indexes: Vec<String>,
        query: String,
        results: u64,
        canceled: bool,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl TelemetryEvent {
    pub fn is_canceled(&self) -> bool {
        match self {
            TelemetryEvent::WriteSummary { .. } => false,
            TelemetryEvent::ReadSummary { canceled, .. } | TelemetryEvent::SearchSummary { canceled, .. } => *canceled,
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}

pub type SharedSink = Arc<dyn TelemetrySink>;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn emit(&self, _event: TelemetryEvent) {}
}

pub fn noop() -> SharedSink {
    Arc::new(NoopSink)
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl TelemetrySink for RecordingSink {
    fn emit(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = TelemetryEvent::ReadSummary {
            index: "books".into(),
            documents: 0,
            canceled: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "read_summary");
        assert_eq!(json["canceled"], true);
        assert!(event.is_canceled());
    }

    #[test]
    fn recording_sink_drains() {
        let sink = RecordingSink::new();
        sink.emit(TelemetryEvent::WriteSummary { index: "i".into(), documents: 2, optimized: false, timestamp: Utc::now() });
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }
}
