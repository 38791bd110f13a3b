//! Text views over one run's events
//!
//! Every renderer is a pure function from events (or structures derived from
//! them) to text. None of them perform I/O; the CLI decides where output goes.
//!
//! - [`tree`] - noise-collapsing operator tree
//! - [`flat`] - per-stage, per-subscription event log
//! - [`marble`] - single-stage marble string
//! - [`timeline`] - tick-quantized timeline, optionally as a Mermaid block
//! - [`mermaid`] - Mermaid flowchart with per-stage statistics
//! - [`summary`] - per-stage statistics and warnings

pub mod flat;
pub mod marble;
pub mod mermaid;
pub mod summary;
pub mod timeline;
pub mod tree;

pub use flat::{render_log, render_run_log};
pub use marble::{COMPLETE_MARKER, ERROR_MARKER, IDLE_MARKER, render_marble};
pub use mermaid::render_flowchart;
pub use summary::{render_run_summary, render_summary};
pub use timeline::{TimelineOptions, render_timeline, render_timeline_mermaid, render_timeline_with};
pub use tree::{TreeLine, render_tree, tree_lines};

use serde_json::Value;

/// Default width at which rendered payloads are truncated
pub const DEFAULT_VALUE_WIDTH: usize = 40;

/// Compact JSON for a payload, truncated to `width` characters with a `...` tail
pub fn short_value(value: &Value, width: usize) -> String {
    let json = value.to_string();
    if json.chars().count() <= width {
        return json;
    }
    let keep = width.saturating_sub(3);
    let mut out: String = json.chars().take(keep).collect();
    out.push_str("...");
    out
}
