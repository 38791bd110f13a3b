//! Marble view for a single stage
//!
//! Time runs left to right at `scale` characters per second. One slot is
//! appended past the end so a terminal marker at the last timestamp never
//! overwrites the value emitted just before it. Markers that land in the same
//! slot overwrite each other; the last one wins.

use serde_json::Value;
use tracing::{debug, warn};

use crate::events::{Event, StageId, span_ms};

pub const IDLE_MARKER: char = '-';
pub const COMPLETE_MARKER: char = '|';
pub const ERROR_MARKER: char = 'X';
/// Marker for a value whose text form is empty
pub const EMPTY_VALUE_MARKER: char = '?';

/// Upper bound on marble width; longer spans are compressed to fit
pub const MAX_MARBLE_SLOTS: usize = 100_000;

fn value_marker(payload: &Value) -> char {
    let first = match payload {
        Value::String(s) => s.chars().next(),
        other => other.to_string().chars().next(),
    };
    first.unwrap_or(EMPTY_VALUE_MARKER)
}

/// Render one stage's events as a marble string
///
/// Returns an empty string when the stage has no events.
pub fn render_marble(events: &[Event], stage_id: StageId, scale: u32) -> String {
    debug!(stage_id, scale, "render_marble: called");
    let stage_events: Vec<&Event> = events.iter().filter(|e| e.stage_id() == stage_id).collect();
    let (Some(first), Some(last)) = (
        stage_events.iter().map(|e| e.timestamp()).min(),
        stage_events.iter().map(|e| e.timestamp()).max(),
    ) else {
        return String::new();
    };

    let duration = span_ms(first, last).max(1);
    let scale = u64::from(scale.max(1));
    let wanted = duration.saturating_mul(scale).div_ceil(1000).saturating_add(1);
    let slots = usize::try_from(wanted).unwrap_or(usize::MAX).min(MAX_MARBLE_SLOTS);
    let compressed = (slots as u64) < wanted;
    if compressed {
        warn!(stage_id, wanted, slots, "render_marble: span too wide, compressing");
    }

    let mut chars = vec![IDLE_MARKER; slots];
    for event in stage_events {
        let offset = span_ms(first, event.timestamp());
        let index = if compressed {
            (u128::from(offset) * (slots as u128 - 1) / u128::from(duration)) as u64
        } else {
            offset.saturating_mul(scale) / 1000
        };
        let index = usize::try_from(index).unwrap_or(usize::MAX).min(slots - 1);

        let marker = match event {
            Event::ValueEmitted { payload, .. } => value_marker(payload),
            Event::Completed { .. } => COMPLETE_MARKER,
            Event::Failed { .. } => ERROR_MARKER,
            Event::StageCreated { .. } | Event::Subscribed { .. } | Event::Unsubscribed { .. } => continue,
        };
        chars[index] = marker;
    }

    chars.into_iter().collect()
}
