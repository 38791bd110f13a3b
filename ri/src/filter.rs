//! Event filters
//!
//! Pure slice-in, vec-out narrowing applied before any view is rendered.

use tracing::debug;

use crate::events::{Event, StageId, SubscriptionId};

/// Keep events whose stage id is at most `max_id`
pub fn filter_by_max_stage_id(events: &[Event], max_id: StageId) -> Vec<Event> {
    events.iter().filter(|e| e.stage_id() <= max_id).cloned().collect()
}

/// Keep events of one stage
pub fn filter_by_stage(events: &[Event], stage_id: StageId) -> Vec<Event> {
    events.iter().filter(|e| e.stage_id() == stage_id).cloned().collect()
}

/// Keep events of one subscription
///
/// Creation events have no subscription and are kept so the graph around the
/// subscription can still be reconstructed.
pub fn filter_by_subscription(events: &[Event], subscription_id: SubscriptionId) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.subscription_id().is_none_or(|sub| sub == subscription_id))
        .cloned()
        .collect()
}

/// Combined filter built from CLI flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub max_stage_id: Option<StageId>,
    pub subscription_id: Option<SubscriptionId>,
}

impl EventFilter {
    pub fn is_empty(&self) -> bool {
        self.max_stage_id.is_none() && self.subscription_id.is_none()
    }

    pub fn apply(&self, events: &[Event]) -> Vec<Event> {
        debug!(?self, events = events.len(), "EventFilter::apply: called");
        let mut out = match self.max_stage_id {
            Some(max) => filter_by_max_stage_id(events, max),
            None => events.to_vec(),
        };
        if let Some(sub) = self.subscription_id {
            out = filter_by_subscription(&out, sub);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Event> {
        vec![
            Event::created(1, "of", None, 0),
            Event::created(2, "map", Some(1), 0),
            Event::subscribed(2, 10, 1),
            Event::subscribed(1, 11, 1),
            Event::next(1, 11, 2, json!(1)),
            Event::next(2, 10, 2, json!(2)),
            Event::completed(2, 10, 3),
        ]
    }

    #[test]
    fn test_filter_by_max_stage_id() {
        let out = filter_by_max_stage_id(&sample(), 1);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|e| e.stage_id() == 1));
        assert!(filter_by_max_stage_id(&sample(), 0).is_empty());
    }

    #[test]
    fn test_filter_by_stage() {
        let out = filter_by_stage(&sample(), 2);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], Event::created(2, "map", Some(1), 0));
    }

    #[test]
    fn test_filter_by_subscription_keeps_creations() {
        let out = filter_by_subscription(&sample(), 10);
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|e| e.subscription_id().is_none_or(|s| s == 10)));
    }

    #[test]
    fn test_combined_filter() {
        let filter = EventFilter {
            max_stage_id: Some(1),
            subscription_id: Some(10),
        };
        let out = filter.apply(&sample());
        assert_eq!(out, vec![Event::created(1, "of", None, 0)]);

        assert!(EventFilter::default().is_empty());
        assert_eq!(EventFilter::default().apply(&sample()), sample());
    }
}
