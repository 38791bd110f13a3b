//! Tick-quantized timeline
//!
//! Timestamps are bucketed into fixed-width ticks measured from the earliest
//! event. Events past the last tick collapse into it, which bounds output for
//! runaway streams. Inside a tick, events are grouped per (stage, subscription)
//! and a complete + unsubscribe pair in the same tick becomes one line.

use std::collections::BTreeMap;

use tracing::debug;

use super::{DEFAULT_VALUE_WIDTH, short_value};
use crate::config::RenderConfig;
use crate::events::{Event, StageId, SubscriptionId, Timestamp, span_ms};

/// Shown when there are no events
pub const NO_EVENTS: &str = "(no events)";

/// Indent used for the second and later lines of a tick
const CONTINUATION: &str = "        :";

/// Timeline parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineOptions {
    pub tick_width_ms: u64,
    pub max_ticks: u64,
    pub value_width: usize,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self::from(&RenderConfig::default())
    }
}

impl From<&RenderConfig> for TimelineOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            tick_width_ms: config.tick_width_ms,
            max_ticks: config.max_ticks,
            value_width: config.value_width,
        }
    }
}

/// Timeline entry kind; declaration order is the in-tick display priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EntryKind {
    Created,
    Subscribed,
    Next,
    Error,
    Complete,
    Unsubscribed,
    CompleteAndUnsubscribed,
}

#[derive(Debug)]
struct Entry<'a> {
    kind: EntryKind,
    event: &'a Event,
}

impl Entry<'_> {
    fn sort_key(&self) -> (StageId, Option<SubscriptionId>, EntryKind) {
        (self.event.stage_id(), self.event.subscription_id(), self.kind)
    }

    fn text(&self, value_width: usize) -> String {
        let stage = format!("stage{}", self.event.stage_id());
        let sub = self
            .event
            .subscription_id()
            .map(|id| format!(" (sub{})", id))
            .unwrap_or_default();

        match (self.kind, self.event) {
            (EntryKind::Created, Event::StageCreated { label, .. }) if !label.is_empty() => {
                format!("{} created ({})", stage, label)
            }
            (EntryKind::Created, _) => format!("{} created", stage),
            (EntryKind::Subscribed, _) => format!("{} subscribed{}", stage, sub),
            (EntryKind::Next, Event::ValueEmitted { payload, .. }) => {
                format!("{} next {}{}", stage, short_value(payload, value_width), sub)
            }
            (EntryKind::Error, Event::Failed { error, .. }) => {
                format!("{} error {}{}", stage, short_value(error, value_width), sub)
            }
            (EntryKind::Next, _) => format!("{} next null{}", stage, sub),
            (EntryKind::Error, _) => format!("{} error null{}", stage, sub),
            (EntryKind::Complete, _) => format!("{} complete{}", stage, sub),
            (EntryKind::Unsubscribed, _) => format!("{} unsubscribed{}", stage, sub),
            (EntryKind::CompleteAndUnsubscribed, _) => format!("{} complete & unsubscribed{}", stage, sub),
        }
    }
}

fn entry_kind(event: &Event) -> EntryKind {
    match event {
        Event::StageCreated { .. } => EntryKind::Created,
        Event::Subscribed { .. } => EntryKind::Subscribed,
        Event::ValueEmitted { .. } => EntryKind::Next,
        Event::Failed { .. } => EntryKind::Error,
        Event::Completed { .. } => EntryKind::Complete,
        Event::Unsubscribed { .. } => EntryKind::Unsubscribed,
    }
}

/// Turn one tick's events into ordered entries
fn tick_entries<'a>(bucket: &[&'a Event]) -> Vec<Entry<'a>> {
    let mut groups: BTreeMap<(StageId, Option<SubscriptionId>), Vec<&'a Event>> = BTreeMap::new();
    for event in bucket {
        groups
            .entry((event.stage_id(), event.subscription_id()))
            .or_default()
            .push(event);
    }

    let mut entries = Vec::new();
    for mut events in groups.into_values() {
        events.sort_by_key(|e| (e.timestamp(), entry_kind(e)));

        let complete = events.iter().find(|e| matches!(e, Event::Completed { .. })).copied();
        let unsubscribe = events.iter().find(|e| matches!(e, Event::Unsubscribed { .. })).copied();

        entries.extend(
            events
                .iter()
                .copied()
                .filter(|e| !matches!(e, Event::Completed { .. } | Event::Unsubscribed { .. }))
                .map(|e| Entry {
                    kind: entry_kind(e),
                    event: e,
                }),
        );

        match (complete, unsubscribe) {
            (Some(event), Some(_)) => entries.push(Entry {
                kind: EntryKind::CompleteAndUnsubscribed,
                event,
            }),
            (Some(event), None) => entries.push(Entry {
                kind: EntryKind::Complete,
                event,
            }),
            (None, Some(event)) => entries.push(Entry {
                kind: EntryKind::Unsubscribed,
                event,
            }),
            (None, None) => {}
        }
    }

    // stable: equal keys keep timestamp order
    entries.sort_by_key(Entry::sort_key);
    entries
}

/// Ticks in ascending order, each with its rendered entry texts
fn ticks(events: &[Event], options: &TimelineOptions) -> Vec<(u64, Vec<String>)> {
    let Some(start) = events.iter().map(Event::timestamp).min() else {
        return Vec::new();
    };
    let width = options.tick_width_ms.max(1);
    let last_tick = options.max_ticks.max(1) - 1;

    let quantize = |ts: Timestamp| -> u64 { (span_ms(start, ts) / width).min(last_tick) };

    let mut buckets: BTreeMap<u64, Vec<&Event>> = BTreeMap::new();
    for event in events {
        buckets.entry(quantize(event.timestamp())).or_default().push(event);
    }

    buckets
        .into_iter()
        .map(|(tick, bucket)| {
            let texts = tick_entries(&bucket)
                .iter()
                .map(|entry| entry.text(options.value_width))
                .collect();
            (tick, texts)
        })
        .collect()
}

fn tick_seconds(tick: u64, width: u64) -> String {
    format!("{:.3}", tick.saturating_mul(width.max(1)) as f64 / 1000.0)
}

fn push_tick_lines(lines: &mut Vec<String>, tick: u64, width: u64, texts: &[String]) {
    for (index, text) in texts.iter().enumerate() {
        if index == 0 {
            lines.push(format!("  {} : {}", tick_seconds(tick, width), text));
        } else {
            lines.push(format!("{} {}", CONTINUATION, text));
        }
    }
}

/// Render a run as timeline lines with default value truncation
pub fn render_timeline(events: &[Event], tick_width_ms: u64, max_ticks: u64) -> Vec<String> {
    render_timeline_with(
        events,
        &TimelineOptions {
            tick_width_ms,
            max_ticks,
            value_width: DEFAULT_VALUE_WIDTH,
        },
    )
}

/// Render a run as timeline lines
pub fn render_timeline_with(events: &[Event], options: &TimelineOptions) -> Vec<String> {
    debug!(events = events.len(), ?options, "render_timeline_with: called");
    let ticks = ticks(events, options);
    if ticks.is_empty() {
        return vec![NO_EVENTS.to_string()];
    }

    let mut lines = Vec::new();
    for (tick, texts) in &ticks {
        push_tick_lines(&mut lines, *tick, options.tick_width_ms, texts);
    }
    lines
}

/// Render a run as a fenced Mermaid `timeline` block
pub fn render_timeline_mermaid(events: &[Event], options: &TimelineOptions, title: &str) -> String {
    debug!(events = events.len(), %title, "render_timeline_mermaid: called");
    let ticks = ticks(events, options);
    if ticks.is_empty() {
        return format!("```mermaid\ntimeline\n  title {}\n```", NO_EVENTS);
    }

    let mut lines = vec![
        "```mermaid".to_string(),
        "timeline".to_string(),
        format!("  title {}", title),
        String::new(),
    ];
    for (tick, texts) in &ticks {
        push_tick_lines(&mut lines, *tick, options.tick_width_ms, texts);
        lines.push(String::new());
    }
    lines.push("```".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_events() {
        assert_eq!(render_timeline(&[], 100, 8), vec!["(no events)"]);
        assert_eq!(
            render_timeline_mermaid(&[], &TimelineOptions::default(), "t"),
            "```mermaid\ntimeline\n  title (no events)\n```"
        );
    }

    #[test]
    fn test_complete_and_unsubscribe_merge_in_one_tick() {
        let events = vec![
            Event::subscribed(1, 1, 0),
            Event::next(1, 1, 50, json!(1)),
            Event::completed(1, 1, 60),
            Event::unsubscribed(1, 1, 61),
        ];
        assert_eq!(
            render_timeline(&events, 100, 8),
            vec![
                "  0.000 : stage1 subscribed (sub1)",
                "        : stage1 next 1 (sub1)",
                "        : stage1 complete & unsubscribed (sub1)",
            ]
        );
    }

    #[test]
    fn test_complete_and_unsubscribe_in_different_ticks() {
        let events = vec![Event::completed(1, 1, 0), Event::unsubscribed(1, 1, 150)];
        assert_eq!(
            render_timeline(&events, 100, 8),
            vec!["  0.000 : stage1 complete (sub1)", "  0.100 : stage1 unsubscribed (sub1)"]
        );
    }

    #[test]
    fn test_late_events_collapse_into_last_tick() {
        let events = vec![
            Event::next(1, 1, 0, json!("a")),
            Event::next(1, 1, 5_000, json!("b")),
            Event::next(1, 1, 90_000, json!("c")),
        ];
        let lines = render_timeline(&events, 100, 8);
        assert_eq!(
            lines,
            vec![
                "  0.000 : stage1 next \"a\" (sub1)",
                "  0.700 : stage1 next \"b\" (sub1)",
                "        : stage1 next \"c\" (sub1)",
            ]
        );
    }

    #[test]
    fn test_in_tick_order_by_stage_subscription_then_lifecycle() {
        // record order scrambled on purpose
        let events = vec![
            Event::unsubscribed(2, 5, 10),
            Event::next(1, 3, 9, json!(7)),
            Event::subscribed(1, 3, 9),
            Event::created(2, "map", Some(1), 1),
            Event::created(1, "of", None, 0),
            Event::subscribed(2, 5, 2),
        ];
        assert_eq!(
            render_timeline(&events, 100, 8),
            vec![
                "  0.000 : stage1 created (of)",
                "        : stage1 subscribed (sub3)",
                "        : stage1 next 7 (sub3)",
                "        : stage2 created (map)",
                "        : stage2 subscribed (sub5)",
                "        : stage2 unsubscribed (sub5)",
            ]
        );
    }

    #[test]
    fn test_values_are_truncated() {
        let events = vec![Event::failed(1, 1, 0, json!("e".repeat(80)))];
        let lines = render_timeline(&events, 100, 8);
        let expected_value = format!("\"{}...", "e".repeat(36));
        assert_eq!(lines, vec![format!("  0.000 : stage1 error {} (sub1)", expected_value)]);
    }

    #[test]
    fn test_mermaid_block_layout() {
        let events = vec![Event::subscribed(1, 1, 0), Event::completed(1, 1, 120)];
        let block = render_timeline_mermaid(&events, &TimelineOptions::default(), "Demo");
        assert_eq!(
            block,
            "```mermaid\ntimeline\n  title Demo\n\n  0.000 : stage1 subscribed (sub1)\n\n  0.100 : stage1 complete (sub1)\n\n```"
        );
    }

    #[test]
    fn test_zero_width_and_zero_ticks_do_not_panic() {
        let events = vec![Event::subscribed(1, 1, 0), Event::completed(1, 1, 3)];
        assert_eq!(render_timeline(&events, 0, 0).len(), 2);
    }

    #[test]
    fn test_deterministic() {
        let events = vec![
            Event::subscribed(1, 1, 0),
            Event::subscribed(2, 2, 0),
            Event::next(2, 2, 3, json!({"a": 1})),
            Event::next(1, 1, 3, json!([1, 2])),
        ];
        assert_eq!(render_timeline(&events, 100, 8), render_timeline(&events, 100, 8));
    }

    #[test]
    fn test_extreme_timestamps_land_in_first_and_last_tick() {
        let events = vec![
            Event::next(1, 1, i64::MIN, json!(1)),
            Event::completed(1, 1, i64::MAX),
        ];
        assert_eq!(
            render_timeline(&events, 100, 8),
            vec!["  0.000 : stage1 next 1 (sub1)", "  0.700 : stage1 complete (sub1)"]
        );
    }
}
