//! Run grouping
//!
//! Partitions a flat event log into one bucket per run, with events that carry
//! no run id isolated in a legacy bucket. Insertion order is kept inside each
//! bucket.

use std::collections::BTreeMap;

use tracing::debug;

use crate::events::{Event, EventLogEntry, RunId};

/// Which bucket a group of events came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunKey {
    /// Events without a run id
    Legacy,
    Run(RunId),
}

impl RunKey {
    /// Header used when printing this run
    pub fn label(&self) -> String {
        match self {
            RunKey::Legacy => "Legacy events (no runId)".to_string(),
            RunKey::Run(id) => format!("Run {}", id),
        }
    }
}

/// Events partitioned by run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunGroups {
    pub legacy: Vec<Event>,
    pub runs: BTreeMap<RunId, Vec<Event>>,
}

impl RunGroups {
    /// Total number of events across all buckets
    pub fn event_count(&self) -> usize {
        self.legacy.len() + self.runs.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.legacy.is_empty() && self.runs.is_empty()
    }

    /// Display order: legacy first (if non-empty), then runs by ascending id
    pub fn iter(&self) -> impl Iterator<Item = (RunKey, &[Event])> {
        let legacy = (!self.legacy.is_empty()).then_some((RunKey::Legacy, self.legacy.as_slice()));
        legacy
            .into_iter()
            .chain(self.runs.iter().map(|(id, events)| (RunKey::Run(*id), events.as_slice())))
    }

    pub fn get(&self, key: RunKey) -> Option<&[Event]> {
        match key {
            RunKey::Legacy => (!self.legacy.is_empty()).then_some(self.legacy.as_slice()),
            RunKey::Run(id) => self.runs.get(&id).map(Vec::as_slice),
        }
    }

    /// Highest run id, or the legacy bucket when there are no runs
    pub fn latest(&self) -> Option<RunKey> {
        self.runs
            .keys()
            .next_back()
            .map(|id| RunKey::Run(*id))
            .or_else(|| (!self.legacy.is_empty()).then_some(RunKey::Legacy))
    }

    /// Pick a run to view: the requested one if present, else the latest
    pub fn select(&self, requested: Option<RunId>) -> Option<(RunKey, &[Event])> {
        if let Some(id) = requested
            && let Some(events) = self.runs.get(&id)
        {
            return Some((RunKey::Run(id), events.as_slice()));
        }
        let key = self.latest()?;
        self.get(key).map(|events| (key, events))
    }
}

/// Partition entries by run in a single pass
pub fn group_by_run<'a, I>(entries: I) -> RunGroups
where
    I: IntoIterator<Item = &'a EventLogEntry>,
{
    let mut groups = RunGroups::default();
    for entry in entries {
        match entry.run_id {
            Some(id) => groups.runs.entry(id).or_default().push(entry.event.clone()),
            None => groups.legacy.push(entry.event.clone()),
        }
    }
    debug!(
        legacy = groups.legacy.len(),
        runs = groups.runs.len(),
        "group_by_run: partitioned events"
    );
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(run_id: Option<RunId>, stage_id: u64) -> EventLogEntry {
        EventLogEntry::new(run_id, Event::subscribed(stage_id, 1, 0))
    }

    fn stage_ids(events: &[Event]) -> Vec<u64> {
        events.iter().map(Event::stage_id).collect()
    }

    #[test]
    fn test_group_empty() {
        let groups = group_by_run(&Vec::<EventLogEntry>::new());
        assert!(groups.is_empty());
        assert_eq!(groups.iter().count(), 0);
        assert_eq!(groups.latest(), None);
        assert!(groups.select(None).is_none());
    }

    #[test]
    fn test_group_preserves_order_within_bucket() {
        let entries = vec![
            entry(Some(20), 1),
            entry(None, 2),
            entry(Some(10), 3),
            entry(Some(20), 4),
            entry(None, 5),
        ];
        let groups = group_by_run(&entries);

        assert_eq!(stage_ids(&groups.legacy), vec![2, 5]);
        assert_eq!(stage_ids(&groups.runs[&20]), vec![1, 4]);
        assert_eq!(stage_ids(&groups.runs[&10]), vec![3]);
        assert_eq!(groups.event_count(), entries.len());
    }

    #[test]
    fn test_iteration_order_legacy_first_then_ascending() {
        let entries = vec![entry(Some(20), 1), entry(Some(3), 2), entry(None, 3)];
        let groups = group_by_run(&entries);
        let keys: Vec<_> = groups.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![RunKey::Legacy, RunKey::Run(3), RunKey::Run(20)]);
    }

    #[test]
    fn test_empty_legacy_not_listed() {
        let groups = group_by_run(&[entry(Some(1), 1)]);
        let keys: Vec<_> = groups.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![RunKey::Run(1)]);
    }

    #[test]
    fn test_select_explicit_latest_and_legacy() {
        let entries = vec![entry(Some(1), 1), entry(Some(2), 2), entry(None, 3)];
        let groups = group_by_run(&entries);

        let (key, events) = groups.select(Some(1)).unwrap();
        assert_eq!(key, RunKey::Run(1));
        assert_eq!(stage_ids(events), vec![1]);

        // unknown run falls back to the latest
        assert_eq!(groups.select(Some(99)).unwrap().0, RunKey::Run(2));
        assert_eq!(groups.select(None).unwrap().0, RunKey::Run(2));

        let legacy_only = group_by_run(&[entry(None, 7)]);
        assert_eq!(legacy_only.select(None).unwrap().0, RunKey::Legacy);
    }

    #[test]
    fn test_run_key_label() {
        assert_eq!(RunKey::Run(5).label(), "Run 5");
        assert_eq!(RunKey::Legacy.label(), "Legacy events (no runId)");
    }
}
