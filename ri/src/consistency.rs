//! Referential consistency checks over a run
//!
//! Problems found here are reported, never fatal: views still render.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::debug;

use crate::events::{Event, EventKind, StageId, SubscriptionId};

/// One referential problem in record order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    /// An event references a subscription before its `subscribe` event
    SubscriptionBeforeSubscribe {
        index: usize,
        stage_id: StageId,
        subscription_id: SubscriptionId,
        kind: EventKind,
    },
    /// A subscription id shows up under a different stage than it subscribed to
    StageMismatch {
        index: usize,
        subscription_id: SubscriptionId,
        expected: StageId,
        found: StageId,
    },
    /// A `subscribe` event for an id that is already subscribed
    DuplicateSubscribe {
        index: usize,
        stage_id: StageId,
        subscription_id: SubscriptionId,
    },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::SubscriptionBeforeSubscribe {
                index,
                stage_id,
                subscription_id,
                kind,
            } => write!(
                f,
                "event #{}: {} on stage {} references subscription {} before it subscribed",
                index, kind, stage_id, subscription_id
            ),
            ConsistencyIssue::StageMismatch {
                index,
                subscription_id,
                expected,
                found,
            } => write!(
                f,
                "event #{}: subscription {} belongs to stage {} but appears on stage {}",
                index, subscription_id, expected, found
            ),
            ConsistencyIssue::DuplicateSubscribe {
                index,
                stage_id,
                subscription_id,
            } => write!(
                f,
                "event #{}: subscription {} subscribed to stage {} more than once",
                index, subscription_id, stage_id
            ),
        }
    }
}

/// Check events in record order; an orphan subscription is reported once
pub fn check_consistency(events: &[Event]) -> Vec<ConsistencyIssue> {
    debug!(events = events.len(), "check_consistency: called");
    let mut owners: HashMap<SubscriptionId, StageId> = HashMap::new();
    let mut orphans: BTreeSet<SubscriptionId> = BTreeSet::new();
    let mut issues = Vec::new();

    for (index, event) in events.iter().enumerate() {
        let Some(sub) = event.subscription_id() else {
            continue;
        };
        let stage_id = event.stage_id();

        if event.kind() == EventKind::Subscribe {
            if owners.insert(sub, stage_id).is_some() {
                issues.push(ConsistencyIssue::DuplicateSubscribe {
                    index,
                    stage_id,
                    subscription_id: sub,
                });
            }
            continue;
        }

        match owners.get(&sub) {
            Some(expected) if *expected != stage_id => issues.push(ConsistencyIssue::StageMismatch {
                index,
                subscription_id: sub,
                expected: *expected,
                found: stage_id,
            }),
            Some(_) => {}
            None => {
                if orphans.insert(sub) {
                    issues.push(ConsistencyIssue::SubscriptionBeforeSubscribe {
                        index,
                        stage_id,
                        subscription_id: sub,
                        kind: event.kind(),
                    });
                }
            }
        }
    }

    debug!(issues = issues.len(), "check_consistency: done");
    issues
}
