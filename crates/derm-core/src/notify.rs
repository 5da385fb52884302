//! Structured notification events.
//!
//! The engine produces a `{recipient, kind, details}` event on every
//! successful booking, cancellation, and reschedule. An external
//! notifier owns formatting and transport; a delivery failure must
//! never roll back appointment state, so sinks are infallible from the
//! engine's point of view and log their own trouble.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened to the appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A new appointment was booked.
    Confirmation,
    /// An appointment was cancelled.
    Cancellation,
    /// An appointment was moved to a new slot.
    Reschedule,
    /// An upcoming-visit reminder. The engine never emits this on its
    /// own; an external scheduler builds reminders from the registry's
    /// upcoming-appointments query.
    Reminder,
}

impl NotificationKind {
    /// Human heading for the event, matching the clinic's message
    /// templates.
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::Confirmation => "Appointment Confirmed",
            Self::Cancellation => "Appointment Cancelled",
            Self::Reschedule => "Appointment Rescheduled",
            Self::Reminder => "Appointment Reminder",
        }
    }
}

/// One notification produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Who should be told (an opaque recipient handle, here the
    /// patient id).
    pub recipient: String,
    /// What happened.
    pub kind: NotificationKind,
    /// Structured appointment details for the formatter.
    pub details: Value,
}

impl NotificationEvent {
    /// One-line human summary, used for logging and as a fallback
    /// message body.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind.heading(), self.details)
    }
}

/// Delivery boundary for notification events.
///
/// Implementations must not fail into the engine: log and drop on
/// transport trouble.
pub trait NotificationSink: Send + Sync {
    /// Hands one event to the notifier.
    fn deliver(&self, event: &NotificationEvent);
}

/// Sink that discards events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn deliver(&self, _event: &NotificationEvent) {}
}

/// Sink that records events in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    #[must_use]
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, event: &NotificationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
