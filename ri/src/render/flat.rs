//! Flat event log grouped by run, stage and subscription

use std::collections::BTreeMap;

use tracing::debug;

use crate::events::{Event, StageId, SubscriptionId, UNKNOWN_LABEL, span_ms};
use crate::runs::RunGroups;

/// Render one run: stages ascending, subscriptions ascending, times relative to the run start
pub fn render_run_log(events: &[Event]) -> Vec<String> {
    debug!(events = events.len(), "render_run_log: called");
    let Some(start) = events.iter().map(Event::timestamp).min() else {
        return vec!["  (no events)".to_string()];
    };

    let mut labels: BTreeMap<StageId, &str> = BTreeMap::new();
    let mut by_stage: BTreeMap<StageId, BTreeMap<SubscriptionId, Vec<&Event>>> = BTreeMap::new();
    for event in events {
        let stage = by_stage.entry(event.stage_id()).or_default();
        match (event, event.subscription_id()) {
            (Event::StageCreated { label, .. }, _) => {
                labels.entry(event.stage_id()).or_insert(label.as_str());
            }
            (_, Some(sub)) => stage.entry(sub).or_default().push(event),
            (_, None) => {}
        }
    }

    let mut lines = Vec::new();
    for (stage_id, subscriptions) in by_stage {
        let label = labels.get(&stage_id).copied().unwrap_or(UNKNOWN_LABEL);
        lines.push(format!("Stage {} ({}):", stage_id, label));
        for (subscription_id, mut sub_events) in subscriptions {
            lines.push(format!("  Subscription {}:", subscription_id));
            sub_events.sort_by_key(|e| e.timestamp());
            for event in sub_events {
                let base = format!("    +{}ms {:<10}", span_ms(start, event.timestamp()), event.event_type());
                let line = match event {
                    Event::ValueEmitted { payload, .. } => format!("{} value = {}", base, payload),
                    Event::Failed { error, .. } => format!("{} error = {}", base, error),
                    _ => base.trim_end().to_string(),
                };
                lines.push(line);
            }
        }
    }
    lines
}

/// Render every run, legacy first, each under a `=== {run} ===` header
pub fn render_log(groups: &RunGroups) -> Vec<String> {
    debug!(events = groups.event_count(), "render_log: called");
    if groups.is_empty() {
        return vec!["No events found.".to_string()];
    }

    let mut lines = Vec::new();
    for (index, (key, events)) in groups.iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        lines.push(format!("=== {} ===", key.label()));
        lines.extend(render_run_log(events));
    }
    lines
}
