//! Property-based tests for reconstruction, grouping and rendering
//!
//! Generated event sets are arbitrary: parent links may dangle, point forward
//! or form cycles, timestamps may go backwards, and runs interleave.

use std::collections::HashSet;

use proptest::prelude::*;
use rxinspect::config::RenderConfig;
use rxinspect::events::{Event, EventLogEntry, RunId};
use rxinspect::graph::build_graph;
use rxinspect::render::{TimelineOptions, render_marble, render_timeline, render_timeline_mermaid, render_tree};
use rxinspect::runs::group_by_run;
use rxinspect::summary::{Warning, summarize};
use serde_json::json;

// =============================================================================
// Strategies
// =============================================================================

fn arb_label() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("unknown".to_string()),
        Just("Observable".to_string()),
        "[a-z]{1,8}",
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    let stage = 1u64..12;
    let sub = 1u64..6;
    let ts = 0i64..2_000;
    prop_oneof![
        (stage.clone(), arb_label(), proptest::option::of(0u64..14), ts.clone())
            .prop_map(|(s, l, p, t)| Event::created(s, l, p, t)),
        (stage.clone(), sub.clone(), ts.clone()).prop_map(|(s, u, t)| Event::subscribed(s, u, t)),
        (stage.clone(), sub.clone(), ts.clone(), any::<i32>()).prop_map(|(s, u, t, v)| Event::next(s, u, t, json!(v))),
        (stage.clone(), sub.clone(), ts.clone(), "[a-z]{0,50}")
            .prop_map(|(s, u, t, e)| Event::failed(s, u, t, json!(e))),
        (stage.clone(), sub.clone(), ts.clone()).prop_map(|(s, u, t)| Event::completed(s, u, t)),
        (stage, sub, ts).prop_map(|(s, u, t)| Event::unsubscribed(s, u, t)),
    ]
}

fn arb_events() -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(arb_event(), 0..60)
}

fn arb_entries() -> impl Strategy<Value = Vec<EventLogEntry>> {
    prop::collection::vec(
        (proptest::option::of(0 as RunId..4), arb_event()).prop_map(|(run, e)| EventLogEntry::new(run, e)),
        0..60,
    )
}

// =============================================================================
// Graph Reconstruction
// =============================================================================

proptest! {
    #[test]
    fn prop_graph_is_acyclic_with_resolvable_parents(events in arb_events()) {
        let forest = build_graph(&events);

        for node in forest.nodes() {
            if let Some(parent) = node.parent_id {
                prop_assert!(forest.get(parent).is_some());
                prop_assert!(forest.get(parent).unwrap().children.contains(&node.id));
            }
            // walking up always terminates at a root
            let ancestors = forest.ancestors(node.id);
            prop_assert!(!ancestors.contains(&node.id));
            prop_assert!(ancestors.len() < forest.len());
        }

        // every node is reachable exactly once from the roots
        let walk = forest.walk();
        prop_assert_eq!(walk.len(), forest.len());
        let unique: HashSet<_> = walk.iter().map(|(_, id)| *id).collect();
        prop_assert_eq!(unique.len(), forest.len());
    }

    #[test]
    fn prop_roots_and_children_sorted(events in arb_events()) {
        let forest = build_graph(&events);
        prop_assert!(forest.roots().windows(2).all(|w| w[0] < w[1]));
        for node in forest.nodes() {
            prop_assert!(node.children.windows(2).all(|w| w[0] < w[1]));
        }
    }
}

// =============================================================================
// Run Grouping
// =============================================================================

proptest! {
    #[test]
    fn prop_run_grouping_partitions_exactly(entries in arb_entries()) {
        let groups = group_by_run(&entries);
        prop_assert_eq!(groups.event_count(), entries.len());

        let legacy: Vec<Event> = entries.iter().filter(|e| e.run_id.is_none()).map(|e| e.event.clone()).collect();
        prop_assert_eq!(&groups.legacy, &legacy);

        for (run_id, events) in &groups.runs {
            let expected: Vec<Event> = entries
                .iter()
                .filter(|e| e.run_id == Some(*run_id))
                .map(|e| e.event.clone())
                .collect();
            prop_assert_eq!(events, &expected);
        }
    }
}

// =============================================================================
// Rendering Determinism
// =============================================================================

proptest! {
    #[test]
    fn prop_renderers_are_deterministic(events in arb_events(), stage in 1u64..12, scale in 1u32..200) {
        let config = RenderConfig::default();
        let options = TimelineOptions::default();

        prop_assert_eq!(render_marble(&events, stage, scale), render_marble(&events, stage, scale));
        prop_assert_eq!(render_timeline(&events, 100, 8), render_timeline(&events, 100, 8));
        prop_assert_eq!(
            render_timeline_mermaid(&events, &options, "t"),
            render_timeline_mermaid(&events, &options, "t")
        );
        prop_assert_eq!(
            render_tree(&build_graph(&events), &config),
            render_tree(&build_graph(&events), &config)
        );
    }

    #[test]
    fn prop_timeline_never_exceeds_tick_budget(events in arb_events(), max_ticks in 1u64..10) {
        let lines = render_timeline(&events, 100, max_ticks);
        let tick_heads = lines.iter().filter(|l| !l.starts_with("        :")).count();
        prop_assert!(tick_heads as u64 <= max_ticks.max(1));
        prop_assert!(!lines.is_empty());
    }

    #[test]
    fn prop_marble_length_matches_span(events in arb_events(), stage in 1u64..12, scale in 1u32..200) {
        let marble = render_marble(&events, stage, scale);
        let stamps: Vec<i64> = events.iter().filter(|e| e.stage_id() == stage).map(Event::timestamp).collect();
        match (stamps.iter().min(), stamps.iter().max()) {
            (Some(first), Some(last)) => {
                let duration = (last - first).max(1) as u64;
                let expected = (duration * u64::from(scale)).div_ceil(1000) + 1;
                prop_assert_eq!(marble.chars().count() as u64, expected);
            }
            _ => prop_assert!(marble.is_empty()),
        }
    }
}

// =============================================================================
// Summaries
// =============================================================================

proptest! {
    #[test]
    fn prop_unterminated_emitter_only_leaks(count in 1usize..30, start in 0i64..1_000) {
        let events: Vec<Event> = (0..count).map(|i| Event::next(1, 1, start + i as i64, json!(i))).collect();
        let summaries = summarize(&events);
        prop_assert_eq!(summaries[&1].warnings(), vec![Warning::PossibleLeak]);
    }

    #[test]
    fn prop_two_subscriptions_always_noted(a in 1u64..100, b in 100u64..200) {
        let events = vec![Event::subscribed(1, a, 0), Event::subscribed(1, b, 1)];
        let warnings = summarize(&events)[&1].warnings();
        prop_assert!(
            warnings.contains(&Warning::MultipleSubscriptions { count: 2 }),
            "expected MultipleSubscriptions {{ count: 2 }} in {:?}",
            warnings
        );
    }

    #[test]
    fn prop_duration_never_negative(events in arb_events()) {
        for summary in summarize(&events).values() {
            prop_assert!(summary.duration() >= 0);
            prop_assert!(summary.total_events > 0);
        }
    }
}

// =============================================================================
// Empty Input
// =============================================================================

#[test]
fn test_empty_input_everywhere() {
    let config = RenderConfig::default();
    assert!(build_graph(&[]).is_empty());
    assert!(summarize(&[]).is_empty());
    assert_eq!(render_marble(&[], 1, 50), "");
    assert_eq!(render_timeline(&[], 100, 8), vec!["(no events)"]);
    assert_eq!(render_tree(&build_graph(&[]), &config), vec!["(no stages)"]);
    assert!(group_by_run(&Vec::<EventLogEntry>::new()).is_empty());
}
