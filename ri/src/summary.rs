//! Per-stage summaries and advisory warnings
//!
//! Tracks per-stage aggregates over one run:
//! - Event counts by kind
//! - Distinct subscriptions
//! - First/last timestamps and duration
//!
//! Warnings are pure classifications over those counts.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::{Event, EventKind, StageId, SubscriptionId, Timestamp};

/// Aggregate statistics for one stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage_id: StageId,
    /// Label from the stage's creation event, if present in the run
    pub label: Option<String>,
    pub subscription_ids: BTreeSet<SubscriptionId>,
    pub total_events: usize,
    pub created: usize,
    pub subscribed: usize,
    pub next: usize,
    pub error: usize,
    pub complete: usize,
    pub unsubscribe: usize,
    pub first_timestamp: Option<Timestamp>,
    pub last_timestamp: Option<Timestamp>,
}

impl StageSummary {
    pub fn new(stage_id: StageId) -> Self {
        Self {
            stage_id,
            ..Default::default()
        }
    }

    /// Fold one event into the aggregate
    pub fn record(&mut self, event: &Event) {
        self.total_events += 1;
        match event {
            Event::StageCreated { label, .. } => {
                self.created += 1;
                self.label.get_or_insert_with(|| label.clone());
            }
            Event::Subscribed { .. } => self.subscribed += 1,
            Event::ValueEmitted { .. } => self.next += 1,
            Event::Failed { .. } => self.error += 1,
            Event::Completed { .. } => self.complete += 1,
            Event::Unsubscribed { .. } => self.unsubscribe += 1,
        }
        if let Some(sub) = event.subscription_id() {
            self.subscription_ids.insert(sub);
        }

        let ts = event.timestamp();
        self.first_timestamp = Some(self.first_timestamp.map_or(ts, |first| first.min(ts)));
        self.last_timestamp = Some(self.last_timestamp.map_or(ts, |last| last.max(ts)));
    }

    pub fn count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Created => self.created,
            EventKind::Subscribe => self.subscribed,
            EventKind::Next => self.next,
            EventKind::Error => self.error,
            EventKind::Complete => self.complete,
            EventKind::Unsubscribe => self.unsubscribe,
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscription_ids.len()
    }

    /// `last - first`, never negative; saturates at `Timestamp::MAX`
    pub fn duration(&self) -> Timestamp {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last.saturating_sub(first).max(0),
            _ => 0,
        }
    }

    /// Advisory warnings derived from the counts
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();

        if self.next > 0 && self.complete == 0 && self.error == 0 {
            warnings.push(Warning::PossibleLeak);
        }
        if self.error > 0 {
            warnings.push(Warning::Errors { count: self.error });
        }
        if self.subscription_count() > 1 {
            warnings.push(Warning::MultipleSubscriptions {
                count: self.subscription_count(),
            });
        }

        warnings
    }
}

/// How loud a warning is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Info,
}

/// Advisory finding about one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// Emits values but never completes or errors
    PossibleLeak,
    /// Encountered errors
    Errors { count: usize },
    /// More than one subscription; the upstream work may be repeated
    MultipleSubscriptions { count: usize },
}

impl Warning {
    pub fn severity(&self) -> Severity {
        match self {
            Warning::PossibleLeak | Warning::Errors { .. } => Severity::Warning,
            Warning::MultipleSubscriptions { .. } => Severity::Info,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::PossibleLeak => write!(
                f,
                "emits values but never completes or errors (possible leak / intentionally infinite stream)"
            ),
            Warning::Errors { count } => write!(f, "emitted errors (errorCount = {})", count),
            Warning::MultipleSubscriptions { count } => write!(
                f,
                "multiple subscriptions ({}) - consider sharing the upstream if it is expensive",
                count
            ),
        }
    }
}

/// Summarize one run's events per stage
pub fn summarize(events: &[Event]) -> BTreeMap<StageId, StageSummary> {
    debug!(events = events.len(), "summarize: called");
    let mut by_stage: BTreeMap<StageId, StageSummary> = BTreeMap::new();
    for event in events {
        by_stage
            .entry(event.stage_id())
            .or_insert_with(|| StageSummary::new(event.stage_id()))
            .record(event);
    }
    by_stage
}
