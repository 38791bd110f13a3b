//! Instrumentation - turns producer callbacks into bus events
//!
//! A producer (the shim hooked into a concrete reactive library) calls into
//! [`Instrumentation`] at each lifecycle transition. This type owns identity
//! assignment, run stamping and the sampling / redaction policies, and
//! publishes the resulting events on its [`EventBus`].

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::InstrumentationConfig;
use crate::events::{
    Event, EventBus, EventLogEntry, IdAllocator, Provenance, Registration, RunId, StageHandle, StageId,
    StageRegistry, SubscriptionId, Timestamp, UnknownProvenance,
};

/// Payload written in place of values when redaction is on
pub const REDACTED: &str = "<redacted>";

/// Source of event timestamps (milliseconds)
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Current wall-clock time in milliseconds
pub fn now_ms() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Identity of one live subscription, handed back to the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    pub stage_id: StageId,
    pub subscription_id: SubscriptionId,
}

/// Identity allocation and event publication for one instrumented process
pub struct Instrumentation {
    bus: Arc<EventBus>,
    ids: IdAllocator,
    registry: Mutex<StageRegistry>,
    provenance: Arc<dyn Provenance>,
    config: InstrumentationConfig,
    run_id: Option<RunId>,
    clock: Clock,
}

impl Instrumentation {
    pub fn builder() -> InstrumentationBuilder {
        InstrumentationBuilder::default()
    }

    /// Instrumentation with default policies publishing on `bus`
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::builder().bus(bus).build()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    pub fn next_stage_id(&self) -> StageId {
        self.ids.next_stage_id()
    }

    pub fn next_subscription_id(&self) -> SubscriptionId {
        self.ids.next_subscription_id()
    }

    /// Exclude a handle (and everything derived from it) from instrumentation
    pub fn mark_internal(&self, handle: StageHandle) {
        self.registry().mark_internal(handle);
    }

    pub fn is_internal(&self, handle: StageHandle) -> bool {
        self.registry().is_internal(handle, self.provenance.as_ref())
    }

    /// Forget every assigned identity, as on reinstall
    ///
    /// Id counters are not rewound, so ids are never reused.
    pub fn reset(&self) {
        debug!("Instrumentation::reset: called");
        self.registry().clear();
    }

    /// Give a stage its identity the first time it is seen
    ///
    /// Emits `StageCreated` for the stage and for any ancestor not seen before,
    /// parents first. Calling again for the same handle emits nothing and
    /// returns the same id. Internal stages get `None`.
    pub fn record_stage_first_seen(&self, handle: StageHandle) -> Option<StageId> {
        if !self.config.enabled {
            return None;
        }
        let mut registry = self.registry();
        match registry.register(handle, self.provenance.as_ref(), &self.ids) {
            Registration::Internal => None,
            Registration::Known(stage_id) => Some(stage_id),
            Registration::Created { stage_id, new_stages } => {
                // Still holding the registry lock so parents are published first
                for stage in new_stages {
                    self.publish(Event::created(stage.stage_id, stage.label, stage.parent_id, self.now()));
                }
                Some(stage_id)
            }
        }
    }

    /// A consumer subscribed to a stage
    pub fn subscribe(&self, handle: StageHandle) -> Option<SubscriptionToken> {
        let stage_id = self.record_stage_first_seen(handle)?;
        let subscription_id = self.ids.next_subscription_id();
        debug!(stage_id, subscription_id, "Instrumentation::subscribe");
        self.publish(Event::subscribed(stage_id, subscription_id, self.now()));
        Some(SubscriptionToken {
            stage_id,
            subscription_id,
        })
    }

    /// A value was delivered on a subscription (subject to sampling)
    pub fn next<T: Serialize + ?Sized>(&self, token: &SubscriptionToken, value: &T) {
        if !self.config.enabled || !self.sampled() {
            return;
        }
        let payload = self.payload(value);
        self.publish(Event::next(token.stage_id, token.subscription_id, self.now(), payload));
    }

    /// A subscription terminated with an error
    pub fn error<E: Serialize + ?Sized>(&self, token: &SubscriptionToken, error: &E) {
        if !self.config.enabled {
            return;
        }
        let payload = self.payload(error);
        self.publish(Event::failed(token.stage_id, token.subscription_id, self.now(), payload));
    }

    /// A subscription completed
    pub fn complete(&self, token: &SubscriptionToken) {
        if !self.config.enabled {
            return;
        }
        self.publish(Event::completed(token.stage_id, token.subscription_id, self.now()));
    }

    /// A subscription was torn down
    pub fn unsubscribe(&self, token: &SubscriptionToken) {
        if !self.config.enabled {
            return;
        }
        self.publish(Event::unsubscribed(token.stage_id, token.subscription_id, self.now()));
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, StageRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    fn publish(&self, event: Event) {
        self.bus.emit(EventLogEntry::new(self.run_id, event));
    }

    fn sampled(&self) -> bool {
        let rate = self.config.sample_rate;
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            rand::random::<f64>() < rate
        }
    }

    fn payload<T: Serialize + ?Sized>(&self, value: &T) -> Value {
        if self.config.exclude_values {
            return Value::String(REDACTED.to_string());
        }
        serde_json::to_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "Instrumentation: payload is not serializable");
            Value::String(format!("<unserializable: {}>", e))
        })
    }
}

/// Builder for [`Instrumentation`]
pub struct InstrumentationBuilder {
    bus: Option<Arc<EventBus>>,
    provenance: Arc<dyn Provenance>,
    config: InstrumentationConfig,
    run_id: Option<RunId>,
    clock: Clock,
}

impl Default for InstrumentationBuilder {
    fn default() -> Self {
        Self {
            bus: None,
            provenance: Arc::new(UnknownProvenance),
            config: InstrumentationConfig::default(),
            run_id: Some(now_ms().max(0) as RunId),
            clock: Arc::new(now_ms),
        }
    }
}

impl InstrumentationBuilder {
    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn provenance(mut self, provenance: Arc<dyn Provenance>) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn config(mut self, config: InstrumentationConfig) -> Self {
        self.config = config;
        self
    }

    /// Run id stamped on every event; `None` writes legacy records
    pub fn run_id(mut self, run_id: Option<RunId>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Instrumentation {
        debug!(run_id = ?self.run_id, config = ?self.config, "InstrumentationBuilder::build: called");
        Instrumentation {
            bus: self.bus.unwrap_or_default(),
            ids: IdAllocator::new(),
            registry: Mutex::new(StageRegistry::new()),
            provenance: self.provenance,
            config: self.config,
            run_id: self.run_id,
            clock: self.clock,
        }
    }
}
