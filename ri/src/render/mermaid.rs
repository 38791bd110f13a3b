//! Mermaid flowchart of a run
//!
//! One node per stage carrying its statistics, one edge per linked parent in
//! the reconstructed graph (upstream --> downstream).

use tracing::debug;

use crate::events::{Event, EventKind, UNKNOWN_LABEL};
use crate::graph::build_graph;
use crate::summary::summarize;

/// Mermaid-safe label text
fn escape(label: &str) -> String {
    label.replace('"', "#quot;")
}

/// Render a run as a `flowchart TD` document; `title` goes into a comment
pub fn render_flowchart(events: &[Event], title: &str) -> String {
    debug!(events = events.len(), %title, "render_flowchart: called");
    let mut lines = vec![
        "flowchart TD".to_string(),
        "  %% rxinspect flowchart".to_string(),
        format!("  %% {}", title),
    ];

    let summaries = summarize(events);
    if summaries.is_empty() {
        lines.push("  %% (no events)".to_string());
        return lines.join("\n");
    }

    let forest = build_graph(events);
    for summary in summaries.values() {
        let label = forest
            .label(summary.stage_id)
            .or(summary.label.as_deref())
            .unwrap_or(UNKNOWN_LABEL);
        let stats = [
            format!("{} #{}", escape(label), summary.stage_id),
            format!("subs: {}", summary.subscription_count()),
            format!("next: {}", summary.count(EventKind::Next)),
            format!("complete: {}", summary.count(EventKind::Complete)),
            format!("error: {}", summary.count(EventKind::Error)),
            format!("unsubscribe: {}", summary.count(EventKind::Unsubscribe)),
            format!("dur: {}ms", summary.duration()),
        ];
        lines.push(format!("  stage{}[\"{}\"]", summary.stage_id, stats.join("\\n")));
    }

    for node in forest.nodes() {
        if let Some(parent) = node.parent_id {
            lines.push(format!("  stage{} --> stage{}", parent, node.id));
        }
    }

    lines.join("\n")
}
