//! Summary report text

use std::collections::BTreeMap;

use crate::events::{EventKind, StageId, UNKNOWN_LABEL};
use crate::runs::RunGroups;
use crate::summary::{Severity, StageSummary, summarize};

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "⚠",
        Severity::Info => "ℹ",
    }
}

/// Per-stage statistics block, stages ascending
pub fn render_summary(summaries: &BTreeMap<StageId, StageSummary>) -> Vec<String> {
    let mut lines = Vec::new();
    for summary in summaries.values() {
        let label = summary.label.as_deref().unwrap_or(UNKNOWN_LABEL);
        lines.push(format!("Stage {} ({}):", summary.stage_id, label));
        lines.push(format!("  subscriptions:    {}", summary.subscription_count()));
        lines.push(format!("  events:           {}", summary.total_events));
        lines.push(format!("  next:             {}", summary.count(EventKind::Next)));
        lines.push(format!("  complete:         {}", summary.count(EventKind::Complete)));
        lines.push(format!("  error:            {}", summary.count(EventKind::Error)));
        lines.push(format!("  unsubscribe:      {}", summary.count(EventKind::Unsubscribe)));
        lines.push(format!("  duration:         {}ms", summary.duration()));

        let warnings = summary.warnings();
        if warnings.is_empty() {
            lines.push("  warnings:         (none)".to_string());
        } else {
            lines.push("  warnings:".to_string());
            for warning in warnings {
                lines.push(format!("    - {} {}", severity_icon(warning.severity()), warning));
            }
        }
    }
    lines
}

/// Summaries for every run, legacy first
pub fn render_run_summary(groups: &RunGroups) -> Vec<String> {
    if groups.is_empty() {
        return vec!["No events found.".to_string()];
    }

    let mut lines = Vec::new();
    for (key, events) in groups.iter() {
        lines.push(format!("=== {} ===", key.label()));
        if events.is_empty() {
            lines.push("  (no events)".to_string());
            continue;
        }
        lines.extend(render_summary(&summarize(events)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventLogEntry};
    use crate::runs::group_by_run;
    use serde_json::json;

    #[test]
    fn test_render_summary_block() {
        let events = vec![
            Event::created(1, "interval", None, 0),
            Event::subscribed(1, 1, 0),
            Event::next(1, 1, 10, json!(0)),
            Event::next(1, 1, 20, json!(1)),
        ];
        let lines = render_summary(&summarize(&events));
        assert_eq!(lines[0], "Stage 1 (interval):");
        assert_eq!(lines[3], "  next:             2");
        assert_eq!(lines[7], "  duration:         20ms");
        assert_eq!(lines[8], "  warnings:");
        assert!(lines[9].starts_with("    - ⚠ emits values but never completes"));
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn test_render_summary_no_warnings() {
        let events = vec![Event::subscribed(2, 1, 0), Event::completed(2, 1, 5)];
        let lines = render_summary(&summarize(&events));
        assert_eq!(lines[0], "Stage 2 (unknown):");
        assert_eq!(lines.last().unwrap(), "  warnings:         (none)");
    }

    #[test]
    fn test_render_summary_info_icon() {
        let events = vec![Event::subscribed(1, 1, 0), Event::subscribed(1, 2, 0)];
        let lines = render_summary(&summarize(&events));
        assert!(lines.iter().any(|l| l.starts_with("    - ℹ multiple subscriptions (2)")));
    }

    #[test]
    fn test_render_run_summary_headers() {
        let entries = vec![
            EventLogEntry::new(Some(3), Event::subscribed(1, 1, 0)),
            EventLogEntry::new(Some(1), Event::subscribed(1, 1, 0)),
        ];
        let lines = render_run_summary(&group_by_run(&entries));
        let headers: Vec<_> = lines.iter().filter(|l| l.starts_with("===")).collect();
        assert_eq!(headers, vec!["=== Run 1 ===", "=== Run 3 ==="]);
        assert_eq!(render_run_summary(&RunGroups::default()), vec!["No events found."]);
    }
}
