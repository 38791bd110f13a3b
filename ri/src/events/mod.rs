//! Event Bus Architecture for pipeline observability
//!
//! This module provides the event system for visibility into reactive
//! pipelines. Every lifecycle transition of an instrumented stage emits an
//! event. All consumers (file logger, live views, tests) subscribe to the bus.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EVENT BUS                              │
//! │          (one unbounded tokio mpsc queue per listener)       │
//! │                                                              │
//! │  Every transition emits an event. Every consumer listens.    │
//! └─────────────────────────────────────────────────────────────┘
//!         ↑               ↑               ↑               ↑
//!    Stage seen      Subscribe        Emission        Teardown
//!    emits:          emits:           emits:          emits:
//!    - created       - subscribe      - next          - complete
//!                                     - error         - unsubscribe
//!
//!         ↓               ↓               ↓
//! ┌───────────┐   ┌───────────┐   ┌───────────┐
//! │ File Log  │   │ Callback  │   │ Renderers │
//! │ .ndjson   │   │ sinks     │   │ (offline) │
//! └───────────┘   └───────────┘   └───────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use rxinspect::events::{StageHandle, StaticProvenance};
//! use rxinspect::instrument::Instrumentation;
//! use std::sync::Arc;
//!
//! let provenance = Arc::new(StaticProvenance::new());
//! provenance.insert(StageHandle(1), "of", None);
//! provenance.insert(StageHandle(2), "map", Some(StageHandle(1)));
//!
//! let inst = Instrumentation::builder().provenance(provenance).build();
//! let mut listener = inst.bus().subscribe();
//!
//! let sub = inst.subscribe(StageHandle(2)).unwrap();
//! inst.next(&sub, &10);
//! inst.complete(&sub);
//! ```

mod bus;
mod identity;
mod loader;
mod logger;
mod types;

pub use bus::{EventBus, Listener, create_event_bus, spawn_sink};
pub use identity::{
    IdAllocator, NewStage, Provenance, Registration, StageHandle, StageInfo, StageRegistry, StaticProvenance,
    UnknownProvenance,
};
pub use loader::{Framing, LoadedEvents, load_events, parse_events};
pub use logger::{DEFAULT_LOG_FILE, EventLogger, EventLoggerHandle, spawn_event_logger};
pub use types::{Event, EventKind, EventLogEntry, RunId, StageId, SubscriptionId, Timestamp, UNKNOWN_LABEL, span_ms};
