//! Sample pipeline recorded through the instrumentation
//!
//! Simulates `from([1..=9]) -> map(x * 10) -> filter(x > 40)` with each stage
//! observed independently, and writes the events through a bus-attached
//! [`EventLogger`](crate::events::EventLogger). Handy for trying the views
//! without a real producer.

use std::path::Path;
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{debug, info};

use crate::config::InstrumentationConfig;
use crate::events::{RunId, StageHandle, StaticProvenance, create_event_bus, spawn_event_logger};
use crate::instrument::{Instrumentation, SubscriptionToken};

pub const SOURCE: StageHandle = StageHandle(1);
pub const MAP: StageHandle = StageHandle(2);
pub const FILTER: StageHandle = StageHandle(3);

/// Labels and parent links for the sample stages
pub fn demo_provenance() -> StaticProvenance {
    let provenance = StaticProvenance::new();
    provenance.insert(SOURCE, "from", None);
    provenance.insert(MAP, "map", Some(SOURCE));
    provenance.insert(FILTER, "filter", Some(MAP));
    provenance.tag(SOURCE, "numbers-from-array");
    provenance
}

/// Drive the sample pipeline and return what reached the final consumer
pub fn run_demo_pipeline(instr: &Instrumentation) -> Vec<i64> {
    debug!("run_demo_pipeline: called");
    // subscription flows downstream to upstream
    let filter = instr.subscribe(FILTER);
    let map = instr.subscribe(MAP);
    let source = instr.subscribe(SOURCE);

    let emit = |token: &Option<SubscriptionToken>, value: i64| {
        if let Some(token) = token {
            instr.next(token, &value);
        }
    };

    let mut results = Vec::new();
    for n in 1..=9_i64 {
        emit(&source, n);
        let mapped = n * 10;
        emit(&map, mapped);
        if mapped > 40 {
            emit(&filter, mapped);
            results.push(mapped);
        }
    }

    for token in [source, map, filter].iter().flatten() {
        instr.complete(token);
    }
    for token in [filter, map, source].iter().flatten() {
        instr.unsubscribe(token);
    }

    results
}

/// What a recorded demo produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoOutcome {
    pub run_id: Option<RunId>,
    pub results: Vec<i64>,
}

/// Record one demo run, appending to the NDJSON log at `path`
pub async fn record_demo(path: &Path, config: &InstrumentationConfig) -> Result<DemoOutcome> {
    debug!(?path, ?config, "record_demo: called");
    let bus = create_event_bus();
    let logger = spawn_event_logger(&bus, path);

    let instr = Instrumentation::builder()
        .bus(bus)
        .provenance(Arc::new(demo_provenance()))
        .config(config.clone())
        .build();
    let results = run_demo_pipeline(&instr);
    let run_id = instr.run_id();

    // last handle on the bus; dropping it ends the logger
    drop(instr);
    let written = logger
        .finish()
        .await
        .context(format!("Failed to record demo events to {}", path.display()))?;
    if config.enabled && written == 0 {
        eyre::bail!("No demo events were written to {}", path.display());
    }

    info!(?run_id, written, results = results.len(), path = %path.display(), "record_demo: recorded");
    Ok(DemoOutcome { run_id, results })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, EventKind, load_events};
    use crate::graph::build_graph;
    use crate::runs::group_by_run;
    use crate::summary::summarize;
    use std::fs;
    use tempfile::tempdir;

    fn instrumentation(bus: Arc<EventBus>) -> Instrumentation {
        Instrumentation::builder()
            .bus(bus)
            .provenance(Arc::new(demo_provenance()))
            .run_id(Some(7))
            .clock(Arc::new(|| 100))
            .build()
    }

    #[test]
    fn test_pipeline_results() {
        let instr = instrumentation(create_event_bus());
        assert_eq!(run_demo_pipeline(&instr), vec![50, 60, 70, 80, 90]);
    }

    #[test]
    fn test_pipeline_events_per_stage() {
        let bus = create_event_bus();
        let mut listener = bus.subscribe();
        let instr = instrumentation(bus);
        run_demo_pipeline(&instr);

        let events: Vec<_> = listener.drain().into_iter().map(|e| e.event).collect();
        let summaries = summarize(&events);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[&1].count(EventKind::Next), 9);
        assert_eq!(summaries[&2].count(EventKind::Next), 9);
        assert_eq!(summaries[&3].count(EventKind::Next), 5);
        assert!(summaries.values().all(|s| s.warnings().is_empty()));

        let forest = build_graph(&events);
        assert_eq!(forest.roots(), &[1]);
        assert_eq!(forest.label(1), Some("numbers-from-array"));
        assert_eq!(forest.ancestors(3), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_record_demo_writes_log() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("demo.ndjson");

        let outcome = record_demo(&path, &InstrumentationConfig::default()).await.unwrap();
        assert_eq!(outcome.results.len(), 5);

        let loaded = load_events(&path).unwrap();
        assert_eq!(loaded.skipped, 0);
        // 3 created + 3 subscribe + 23 next + 3 complete + 3 unsubscribe
        assert_eq!(loaded.len(), 35);
        let groups = group_by_run(&loaded.entries);
        assert_eq!(groups.runs.len(), 1);
        assert!(groups.runs.contains_key(&outcome.run_id.unwrap()));
    }

    #[tokio::test]
    async fn test_record_demo_disabled_writes_nothing() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("demo.ndjson");
        let config = InstrumentationConfig {
            enabled: false,
            ..Default::default()
        };

        let outcome = record_demo(&path, &config).await.unwrap();
        assert_eq!(outcome.results, vec![50, 60, 70, 80, 90]);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_record_demo_fails_on_unwritable_log() {
        let temp = tempdir().unwrap();
        let blocker = temp.path().join("events.ndjson");
        fs::write(&blocker, "").unwrap();
        let path = blocker.join("events.ndjson");

        let result = record_demo(&path, &InstrumentationConfig::default()).await;
        assert!(result.is_err());
        assert!(!path.exists());
    }
}
