//! Event types for reactive pipeline lifecycle tracing
//!
//! These events represent everything observable about a pipeline:
//! - Stage lifecycle (creation, with label and upstream parent)
//! - Subscription lifecycle (subscribe, value, error, complete, unsubscribe)
//!
//! On the wire every event is a flat JSON record discriminated by `type`, so a
//! log is either one record per line or a single array of records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EventFormatError;

/// Process-unique stage identity, assigned on first observation
pub type StageId = u64;

/// Process-unique subscription identity
pub type SubscriptionId = u64;

/// Run grouping key (typically one process execution)
pub type RunId = u64;

/// Milliseconds, same unit across a run
pub type Timestamp = i64;

/// Milliseconds from `from` to `to`, zero when `to` is not later
///
/// Exact for any pair of timestamps, including the full `i64` range.
pub fn span_ms(from: Timestamp, to: Timestamp) -> u64 {
    if to <= from { 0 } else { to.abs_diff(from) }
}

/// Label used when no provenance information is available
pub const UNKNOWN_LABEL: &str = "unknown";

/// Core event enum - the vocabulary of pipeline activity
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A stage was observed for the first time
    StageCreated {
        stage_id: StageId,
        label: String,
        parent_id: Option<StageId>,
        timestamp: Timestamp,
    },
    /// A consumer subscribed to a stage
    Subscribed {
        stage_id: StageId,
        subscription_id: SubscriptionId,
        timestamp: Timestamp,
    },
    /// A stage emitted a value to one subscription
    ValueEmitted {
        stage_id: StageId,
        subscription_id: SubscriptionId,
        timestamp: Timestamp,
        payload: Value,
    },
    /// A subscription terminated with an error
    Failed {
        stage_id: StageId,
        subscription_id: SubscriptionId,
        timestamp: Timestamp,
        error: Value,
    },
    /// A subscription completed
    Completed {
        stage_id: StageId,
        subscription_id: SubscriptionId,
        timestamp: Timestamp,
    },
    /// A subscription was torn down by its consumer
    Unsubscribed {
        stage_id: StageId,
        subscription_id: SubscriptionId,
        timestamp: Timestamp,
    },
}

impl Event {
    pub fn created(stage_id: StageId, label: impl Into<String>, parent_id: Option<StageId>, timestamp: Timestamp) -> Self {
        Event::StageCreated {
            stage_id,
            label: label.into(),
            parent_id,
            timestamp,
        }
    }

    pub fn subscribed(stage_id: StageId, subscription_id: SubscriptionId, timestamp: Timestamp) -> Self {
        Event::Subscribed {
            stage_id,
            subscription_id,
            timestamp,
        }
    }

    pub fn next(stage_id: StageId, subscription_id: SubscriptionId, timestamp: Timestamp, payload: Value) -> Self {
        Event::ValueEmitted {
            stage_id,
            subscription_id,
            timestamp,
            payload,
        }
    }

    pub fn failed(stage_id: StageId, subscription_id: SubscriptionId, timestamp: Timestamp, error: Value) -> Self {
        Event::Failed {
            stage_id,
            subscription_id,
            timestamp,
            error,
        }
    }

    pub fn completed(stage_id: StageId, subscription_id: SubscriptionId, timestamp: Timestamp) -> Self {
        Event::Completed {
            stage_id,
            subscription_id,
            timestamp,
        }
    }

    pub fn unsubscribed(stage_id: StageId, subscription_id: SubscriptionId, timestamp: Timestamp) -> Self {
        Event::Unsubscribed {
            stage_id,
            subscription_id,
            timestamp,
        }
    }

    /// Get the stage this event belongs to
    pub fn stage_id(&self) -> StageId {
        match self {
            Event::StageCreated { stage_id, .. }
            | Event::Subscribed { stage_id, .. }
            | Event::ValueEmitted { stage_id, .. }
            | Event::Failed { stage_id, .. }
            | Event::Completed { stage_id, .. }
            | Event::Unsubscribed { stage_id, .. } => *stage_id,
        }
    }

    /// Get the subscription id (`None` for stage creation)
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        match self {
            Event::StageCreated { .. } => None,
            Event::Subscribed { subscription_id, .. }
            | Event::ValueEmitted { subscription_id, .. }
            | Event::Failed { subscription_id, .. }
            | Event::Completed { subscription_id, .. }
            | Event::Unsubscribed { subscription_id, .. } => Some(*subscription_id),
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Event::StageCreated { timestamp, .. }
            | Event::Subscribed { timestamp, .. }
            | Event::ValueEmitted { timestamp, .. }
            | Event::Failed { timestamp, .. }
            | Event::Completed { timestamp, .. }
            | Event::Unsubscribed { timestamp, .. } => *timestamp,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::StageCreated { .. } => EventKind::Created,
            Event::Subscribed { .. } => EventKind::Subscribe,
            Event::ValueEmitted { .. } => EventKind::Next,
            Event::Failed { .. } => EventKind::Error,
            Event::Completed { .. } => EventKind::Complete,
            Event::Unsubscribed { .. } => EventKind::Unsubscribe,
        }
    }

    /// Get the wire name of this event's kind
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Event discriminant
///
/// Declaration order is the logical lifecycle order; `Ord` follows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Created,
    Subscribe,
    Next,
    Error,
    Complete,
    Unsubscribe,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Created,
        EventKind::Subscribe,
        EventKind::Next,
        EventKind::Error,
        EventKind::Complete,
        EventKind::Unsubscribe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "observable-create",
            EventKind::Subscribe => "subscribe",
            EventKind::Next => "next",
            EventKind::Error => "error",
            EventKind::Complete => "complete",
            EventKind::Unsubscribe => "unsubscribe",
        }
    }

    /// Parse a wire name, accepting the older spellings found in existing logs
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "observable-create" | "stage-created" | "create" => Some(EventKind::Created),
            "subscribe" => Some(EventKind::Subscribe),
            "next" => Some(EventKind::Next),
            "error" => Some(EventKind::Error),
            "complete" => Some(EventKind::Complete),
            "unsubscribe" => Some(EventKind::Unsubscribe),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A log record: an event plus the run it belongs to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct EventLogEntry {
    /// Run identifier; `None` for legacy records
    pub run_id: Option<RunId>,
    /// The event
    pub event: Event,
}

impl EventLogEntry {
    pub fn new(run_id: Option<RunId>, event: Event) -> Self {
        Self { run_id, event }
    }

    /// Create an entry that belongs to no run
    pub fn legacy(event: Event) -> Self {
        Self { run_id: None, event }
    }
}

/// Nested provenance block written by older producers
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct OperatorInfo {
    name: Option<String>,
    parent: Option<StageId>,
}

/// Flat on-the-wire record shape
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(rename = "type", alias = "kind")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Timestamp>,
    #[serde(default, alias = "stageId", skip_serializing_if = "Option::is_none")]
    observable_id: Option<StageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subscription_id: Option<SubscriptionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<StageId>,
    #[serde(default, skip_serializing)]
    operator_info: Option<OperatorInfo>,
    #[serde(default, skip_serializing)]
    info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

impl From<EventLogEntry> for WireEvent {
    fn from(entry: EventLogEntry) -> Self {
        let mut wire = WireEvent {
            kind: entry.event.event_type().to_string(),
            run_id: entry.run_id,
            timestamp: Some(entry.event.timestamp()),
            observable_id: Some(entry.event.stage_id()),
            subscription_id: entry.event.subscription_id(),
            ..Default::default()
        };
        match entry.event {
            Event::StageCreated { label, parent_id, .. } => {
                wire.label = Some(label);
                wire.parent_id = parent_id;
            }
            Event::ValueEmitted { payload, .. } => wire.value = Some(payload),
            Event::Failed { error, .. } => wire.error = Some(error),
            Event::Subscribed { .. } | Event::Completed { .. } | Event::Unsubscribed { .. } => {}
        }
        wire
    }
}

impl TryFrom<WireEvent> for EventLogEntry {
    type Error = EventFormatError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let kind = EventKind::from_wire(&wire.kind).ok_or_else(|| EventFormatError::UnknownKind(wire.kind.clone()))?;
        let missing = |field: &'static str| EventFormatError::MissingField {
            kind: kind.as_str(),
            field,
        };

        let timestamp = wire.timestamp.ok_or_else(|| missing("timestamp"))?;
        let stage_id = wire.observable_id.ok_or_else(|| missing("observableId"))?;

        let event = if kind == EventKind::Created {
            let info = wire.operator_info.unwrap_or_default();
            let label = wire
                .label
                .or(info.name)
                .or(wire.info)
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
            Event::StageCreated {
                stage_id,
                label,
                parent_id: wire.parent_id.or(info.parent),
                timestamp,
            }
        } else {
            let subscription_id = wire.subscription_id.ok_or_else(|| missing("subscriptionId"))?;
            match kind {
                EventKind::Subscribe => Event::subscribed(stage_id, subscription_id, timestamp),
                EventKind::Next => Event::next(stage_id, subscription_id, timestamp, wire.value.unwrap_or(Value::Null)),
                EventKind::Error => Event::failed(stage_id, subscription_id, timestamp, wire.error.unwrap_or(Value::Null)),
                EventKind::Complete => Event::completed(stage_id, subscription_id, timestamp),
                EventKind::Unsubscribe => Event::unsubscribed(stage_id, subscription_id, timestamp),
                EventKind::Created => unreachable!("handled above"),
            }
        };

        Ok(EventLogEntry {
            run_id: wire.run_id,
            event,
        })
    }
}
