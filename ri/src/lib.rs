//! rxinspect - Reactive Pipeline Lifecycle Inspector
//!
//! rxinspect records the lifecycle of a reactive pipeline (stage creation,
//! subscription, values, errors, completion and teardown) as a flat event
//! stream, and reconstructs human-readable views from a recorded log.
//!
//! # Core Concepts
//!
//! - **Stages and Subscriptions**: every stage and subscription gets a
//!   process-unique, never-reused id on first observation
//! - **Fan-out Bus**: any number of listeners see every event exactly once, in
//!   emission order, without slowing each other down
//! - **Runs**: events are grouped by run id, with id-less records kept apart
//! - **Pure Views**: graph, summary, marble and timeline views are pure
//!   functions over an already-loaded event set
//!
//! # Modules
//!
//! - [`events`] - Event model, wire format, loader, identity, bus and file logger
//! - [`instrument`] - Producer-facing instrumentation facade
//! - [`runs`] - Run grouping and selection
//! - [`filter`] - Event filters
//! - [`graph`] - Operator graph reconstruction
//! - [`summary`] - Per-stage statistics and warnings
//! - [`consistency`] - Referential consistency report
//! - [`render`] - Text renderers (tree, flat log, marble, timeline, Mermaid)
//! - [`demo`] - Built-in sample pipeline
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod consistency;
pub mod demo;
pub mod error;
pub mod events;
pub mod filter;
pub mod graph;
pub mod instrument;
pub mod render;
pub mod runs;
pub mod summary;

// Re-export commonly used types
pub use config::{Config, InstrumentationConfig, RenderConfig};
pub use consistency::{ConsistencyIssue, check_consistency};
pub use error::{EventFormatError, LoadError};
pub use filter::{EventFilter, filter_by_max_stage_id, filter_by_stage, filter_by_subscription};
pub use graph::{Forest, StageNode, build_graph};
pub use instrument::{Instrumentation, InstrumentationBuilder, SubscriptionToken};
pub use render::{render_marble, render_timeline, render_tree};
pub use runs::{RunGroups, RunKey, group_by_run};
pub use summary::{Severity, StageSummary, Warning, summarize};

// Events module re-exports
pub use events::{
    Event, EventBus, EventKind, EventLogEntry, EventLogger, EventLoggerHandle, Listener, Provenance, RunId,
    StageHandle, StageId, StageInfo, SubscriptionId, Timestamp, create_event_bus, load_events, parse_events,
    spawn_event_logger, spawn_sink, span_ms,
};
