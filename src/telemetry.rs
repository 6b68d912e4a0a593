//! Structured telemetry emission.
//!
//! Every selection transition is reported as a flat tag + key/value event
//! through an [`EventSink`]. The default sink forwards to tracing; tests
//! install a [`RecordingSink`] to assert on emissions. Tag and field names
//! are fixed identifiers consumed by downstream analytics and must not
//! change between releases.

use std::sync::{Mutex, PoisonError};

/// Event tags, matched exactly by downstream analytics.
pub mod tags {
    pub const SELECTED_URL: &str = "SELECTED_URL";
    pub const DIRECT_URL: &str = "DIRECT_URL";
    pub const VALID_URL: &str = "VALID_URL";
    pub const INVALID_URL: &str = "INVALID_URL";
    pub const VALID_BATCH: &str = "VALID_BATCH";
    pub const INVALID_BATCH: &str = "INVALID_BATCH";
    pub const VALIDATION_TIME: &str = "VALIDATION_TIME";
    pub const VALIDATION_ENDED: &str = "VALIDATION_ENDED";
    pub const UPDATE_SUCCEEDED: &str = "UPDATE_SUCCEEDED";
    pub const UPDATE_FAILED: &str = "UPDATE_FAILED";
    pub const CONTINUE_VALIDATION: &str = "continue_validation";
}

/// Field keys, one flat namespace across all tags.
pub mod fields {
    pub const SELECTED_URL_VALUE: &str = "selected_url_value";
    pub const SELECTED_URL_SERVICE: &str = "selected_url_service";
    pub const DIRECT_URL_VALUE: &str = "direct_url_value";
    pub const DIRECT_URL_SERVICE: &str = "direct_url_service";
    pub const VALID_URL_VALUE: &str = "valid_url_value";
    pub const VALID_URL_SERVICE: &str = "valid_url_service";
    pub const INVALID_URL_VALUE: &str = "invalid_url_value";
    pub const INVALID_URL_SERVICE: &str = "invalid_url_service";
    pub const VALID_BATCH_URLS: &str = "valid_batch_urls";
    pub const VALID_BATCH_SERVICES: &str = "valid_batch_services";
    pub const INVALID_BATCH_URLS: &str = "invalid_batch_urls";
    pub const INVALID_BATCH_SERVICES: &str = "invalid_batch_services";
    pub const VALIDATION_SECONDS: &str = "validation_seconds";
    pub const VALIDATION_CAUSE: &str = "validation_cause";
    pub const UPDATE_SUCCEEDED_URL: &str = "update_succeeded_url";
    pub const UPDATE_SUCCEEDED_COUNT: &str = "update_succeeded_count";
    pub const UPDATE_FAILED_URL: &str = "update_failed_url";
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Str(_) => None,
            FieldValue::Int(i) => Some(*i),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub tag: &'static str,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl TelemetryEvent {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            fields: Vec::new(),
        }
    }

    pub fn with_str(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((key, FieldValue::Str(value.into())));
        self
    }

    pub fn with_int(mut self, key: &'static str, value: i64) -> Self {
        self.fields.push((key, FieldValue::Int(value)));
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

pub trait EventSink: Send + Sync {
    fn log_event(&self, event: TelemetryEvent);
}

/// Default sink: structured emission through tracing.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log_event(&self, event: TelemetryEvent) {
        tracing::debug!(
            target: "telemetry",
            tag = event.tag,
            fields = ?event.fields,
            "telemetry event"
        );
    }
}

/// Capturing sink for unit and integration tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.events().into_iter().map(|e| e.tag).collect()
    }
}

impl EventSink for RecordingSink {
    fn log_event(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Whole seconds for a reported duration, with sub-second probes rounded up
/// so a received positive duration is never reported as zero.
pub fn clamp_validation_seconds(elapsed_ms: u64) -> i64 {
    let seconds = i64::try_from(elapsed_ms / 1000).unwrap_or(i64::MAX);
    seconds.max(1)
}
