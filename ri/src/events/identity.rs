//! Stage and subscription identity
//!
//! The producer hands us opaque [`StageHandle`]s; we turn them into small dense
//! [`StageId`]s. Label and parent information come from a [`Provenance`]
//! implementation supplied by the producer, so how a label is derived (an
//! explicit tag, stack inspection, ...) stays outside this crate.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::types::{StageId, SubscriptionId, UNKNOWN_LABEL};

/// Opaque producer-side handle for one physical pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageHandle(pub u64);

/// What the producer knows about a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    /// Best-effort human label, may be "unknown"
    pub label: String,
    /// The upstream stage this one was derived from
    pub parent: Option<StageHandle>,
}

impl StageInfo {
    pub fn new(label: impl Into<String>, parent: Option<StageHandle>) -> Self {
        Self {
            label: label.into(),
            parent,
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_LABEL, None)
    }
}

/// Producer capability: describe a stage handle
///
/// Must be a pure function of the handle. Returning [`StageInfo::unknown`]
/// is always acceptable.
pub trait Provenance: Send + Sync {
    fn describe(&self, handle: StageHandle) -> StageInfo;
}

/// Provenance that knows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownProvenance;

impl Provenance for UnknownProvenance {
    fn describe(&self, _handle: StageHandle) -> StageInfo {
        StageInfo::unknown()
    }
}

/// Provenance backed by a table the producer fills in as it builds pipelines
#[derive(Debug, Default)]
pub struct StaticProvenance {
    stages: std::sync::RwLock<HashMap<StageHandle, StageInfo>>,
}

impl StaticProvenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe a stage; later calls for the same handle replace the label but
    /// never the parent
    pub fn insert(&self, handle: StageHandle, label: impl Into<String>, parent: Option<StageHandle>) {
        let label = label.into();
        debug!(?handle, %label, ?parent, "StaticProvenance::insert: called");
        let mut stages = self.stages.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        match stages.get_mut(&handle) {
            Some(info) => info.label = label,
            None => {
                stages.insert(handle, StageInfo::new(label, parent));
            }
        }
    }

    /// Attach an explicit tag to a stage, the equivalent of a `tag(name)` operator
    pub fn tag(&self, handle: StageHandle, name: impl Into<String>) {
        let parent = self.describe(handle).parent;
        self.insert(handle, name, parent);
    }
}

impl Provenance for StaticProvenance {
    fn describe(&self, handle: StageHandle) -> StageInfo {
        self.stages
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&handle)
            .cloned()
            .unwrap_or_else(StageInfo::unknown)
    }
}

/// Hands out stage and subscription ids
///
/// Both counters start at 1, only ever increase and are never reset.
#[derive(Debug)]
pub struct IdAllocator {
    next_stage: AtomicU64,
    next_subscription: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next_stage: AtomicU64::new(1),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn next_stage_id(&self) -> StageId {
        self.next_stage.fetch_add(1, Ordering::SeqCst)
    }

    pub fn next_subscription_id(&self) -> SubscriptionId {
        self.next_subscription.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A stage that was just assigned an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStage {
    pub stage_id: StageId,
    pub label: String,
    pub parent_id: Option<StageId>,
}

/// Outcome of asking the registry about a handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Handle belongs to the bus's own plumbing; emit nothing
    Internal,
    /// Handle already had an identity
    Known(StageId),
    /// Handle (and possibly some of its ancestors) got fresh identities,
    /// listed top-down so every parent precedes its children
    Created { stage_id: StageId, new_stages: Vec<NewStage> },
}

impl Registration {
    pub fn stage_id(&self) -> Option<StageId> {
        match self {
            Registration::Internal => None,
            Registration::Known(id) => Some(*id),
            Registration::Created { stage_id, .. } => Some(*stage_id),
        }
    }
}

/// Maps handles to identities and remembers which handles are internal
#[derive(Debug, Default)]
pub struct StageRegistry {
    assigned: HashMap<StageHandle, StageId>,
    internal: HashSet<StageHandle>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag a handle as part of the bus's own plumbing
    pub fn mark_internal(&mut self, handle: StageHandle) {
        debug!(?handle, "StageRegistry::mark_internal: called");
        self.internal.insert(handle);
    }

    /// Is this handle, or any ancestor reachable through provenance, internal?
    pub fn is_internal(&self, handle: StageHandle, provenance: &dyn Provenance) -> bool {
        let mut visited = HashSet::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            if self.internal.contains(&h) {
                return true;
            }
            if !visited.insert(h) {
                // provenance describes a cycle; stop walking
                return false;
            }
            current = provenance.describe(h).parent;
        }
        false
    }

    pub fn lookup(&self, handle: StageHandle) -> Option<StageId> {
        self.assigned.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Forget all assignments and internal flags (instrumentation reinstall)
    pub fn clear(&mut self) {
        debug!(assigned = self.assigned.len(), "StageRegistry::clear: called");
        self.assigned.clear();
        self.internal.clear();
    }

    /// Assign an identity to a handle the first time it is seen
    ///
    /// Idempotent: a handle that already carries an identity is returned as
    /// [`Registration::Known`]. Unseen ancestors are registered first.
    pub fn register(&mut self, handle: StageHandle, provenance: &dyn Provenance, ids: &IdAllocator) -> Registration {
        if self.is_internal(handle, provenance) {
            debug!(?handle, "StageRegistry::register: internal handle, skipping");
            return Registration::Internal;
        }
        if let Some(id) = self.lookup(handle) {
            return Registration::Known(id);
        }

        // Walk up until we hit a known stage (or the root), then assign top-down
        let mut chain: Vec<(StageHandle, StageInfo)> = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(handle);
        while let Some(h) = current {
            if self.assigned.contains_key(&h) || !seen.insert(h) {
                break;
            }
            let info = provenance.describe(h);
            current = info.parent;
            chain.push((h, info));
        }

        let mut new_stages = Vec::with_capacity(chain.len());
        for (h, info) in chain.into_iter().rev() {
            let parent_id = info.parent.and_then(|p| self.assigned.get(&p).copied());
            let stage_id = ids.next_stage_id();
            self.assigned.insert(h, stage_id);
            debug!(?h, stage_id, label = %info.label, ?parent_id, "StageRegistry::register: assigned id");
            new_stages.push(NewStage {
                stage_id,
                label: info.label,
                parent_id,
            });
        }

        match self.assigned.get(&handle) {
            Some(&stage_id) => Registration::Created { stage_id, new_stages },
            None => Registration::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_provenance() -> StaticProvenance {
        let provenance = StaticProvenance::new();
        provenance.insert(StageHandle(100), "of", None);
        provenance.insert(StageHandle(200), "map", Some(StageHandle(100)));
        provenance.insert(StageHandle(300), "filter", Some(StageHandle(200)));
        provenance
    }

    #[test]
    fn test_allocator_starts_at_one_and_increases() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_stage_id(), 1);
        assert_eq!(ids.next_stage_id(), 2);
        assert_eq!(ids.next_subscription_id(), 1);
        assert_eq!(ids.next_subscription_id(), 2);
        assert_eq!(ids.next_stage_id(), 3);
    }

    #[test]
    fn test_unknown_provenance() {
        assert_eq!(UnknownProvenance.describe(StageHandle(1)), StageInfo::unknown());
    }

    #[test]
    fn test_static_provenance_tag_keeps_parent() {
        let provenance = chain_provenance();
        provenance.tag(StageHandle(200), "double");
        assert_eq!(
            provenance.describe(StageHandle(200)),
            StageInfo::new("double", Some(StageHandle(100)))
        );
    }

    #[test]
    fn test_register_is_idempotent() {
        let provenance = UnknownProvenance;
        let ids = IdAllocator::new();
        let mut registry = StageRegistry::new();

        let first = registry.register(StageHandle(7), &provenance, &ids);
        assert!(matches!(first, Registration::Created { stage_id: 1, .. }));
        let second = registry.register(StageHandle(7), &provenance, &ids);
        assert_eq!(second, Registration::Known(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_assigns_ancestors_top_down() {
        let provenance = chain_provenance();
        let ids = IdAllocator::new();
        let mut registry = StageRegistry::new();

        let registration = registry.register(StageHandle(300), &provenance, &ids);
        let Registration::Created { stage_id, new_stages } = registration else {
            panic!("Expected Created registration");
        };
        assert_eq!(stage_id, 3);
        let labels: Vec<_> = new_stages.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["of", "map", "filter"]);
        assert_eq!(new_stages[0].parent_id, None);
        assert_eq!(new_stages[1].parent_id, Some(1));
        assert_eq!(new_stages[2].parent_id, Some(2));
    }

    #[test]
    fn test_register_stops_at_known_ancestor() {
        let provenance = chain_provenance();
        let ids = IdAllocator::new();
        let mut registry = StageRegistry::new();

        registry.register(StageHandle(100), &provenance, &ids);
        let Registration::Created { new_stages, .. } = registry.register(StageHandle(300), &provenance, &ids) else {
            panic!("Expected Created registration");
        };
        assert_eq!(new_stages.len(), 2);
        assert_eq!(new_stages[0].parent_id, Some(1));
    }

    #[test]
    fn test_internal_is_transitive() {
        let provenance = chain_provenance();
        let ids = IdAllocator::new();
        let mut registry = StageRegistry::new();
        registry.mark_internal(StageHandle(100));

        assert!(registry.is_internal(StageHandle(300), &provenance));
        assert_eq!(registry.register(StageHandle(300), &provenance, &ids), Registration::Internal);
        assert!(registry.is_empty());
        // no id was consumed
        assert_eq!(ids.next_stage_id(), 1);
    }

    #[test]
    fn test_provenance_cycle_does_not_hang() {
        let provenance = StaticProvenance::new();
        provenance.insert(StageHandle(1), "a", Some(StageHandle(2)));
        provenance.insert(StageHandle(2), "b", Some(StageHandle(1)));
        let ids = IdAllocator::new();
        let mut registry = StageRegistry::new();

        let registration = registry.register(StageHandle(1), &provenance, &ids);
        assert!(registration.stage_id().is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clear_keeps_ids_monotonic() {
        let ids = IdAllocator::new();
        let mut registry = StageRegistry::new();
        registry.register(StageHandle(1), &UnknownProvenance, &ids);
        registry.clear();

        let again = registry.register(StageHandle(1), &UnknownProvenance, &ids);
        assert_eq!(again.stage_id(), Some(2));
    }
}
