//! Event Bus implementation.
//!
//! Provides the core EventBus struct: registration tables for handlers and
//! observers, and dispatch onto the worker pool.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::events::{
    DispatchId, DispatchOptions, Event, EventType, IntoEventType, IntoObserverId, ObserverId,
};
use crate::deferred::Deferred;
use crate::error::{BusError, DispatchError};
use crate::pool::{PoolConfig, RunState, WorkerPool};
use crate::types::{
    DispatchDeferred, DispatchResolver, DispatchValue, HandlerFn, Job, ObserverFn,
    ThreadSafeRwMap, ThreadSafeRwNestedMap,
};

/// Configuration for the event bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Number of workers executing dispatched events.
    pub pool_size: usize,
    /// Number of dispatched events that may wait for a free worker.
    pub queue_capacity: usize,
    /// Start the workers as part of construction.
    pub auto_start: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            queue_capacity: 1024,
            auto_start: true,
        }
    }
}

impl EventBusConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), BusError> {
        self.pool_config().validate()
    }

    fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            size: self.pool_size,
            queue_capacity: self.queue_capacity,
        }
    }
}

/// Snapshot of bus activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Events accepted onto the queue
    pub dispatched: u64,
    /// Events fully processed by a worker
    pub completed: u64,
    /// Handlers that failed, panicked or returned without settling
    pub handler_faults: u64,
    /// Observer invocations that failed or panicked
    pub observer_faults: u64,
    /// Events processed while no handler was registered
    pub missing_handlers: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    handler_faults: AtomicU64,
    observer_faults: AtomicU64,
    missing_handlers: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BusStats {
        BusStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            handler_faults: self.handler_faults.load(Ordering::Relaxed),
            observer_faults: self.observer_faults.load(Ordering::Relaxed),
            missing_handlers: self.missing_handlers.load(Ordering::Relaxed),
        }
    }
}

/// Handler and observer tables, shared with the tasks running on workers
#[derive(Clone, Default)]
struct Registry {
    handlers: ThreadSafeRwMap<EventType, HandlerFn>,
    observers: ThreadSafeRwNestedMap<EventType, ObserverId, ObserverFn>,
    counters: Arc<Counters>,
}

/// A dispatched event travelling to a worker
struct Task {
    id: DispatchId,
    event: Event,
    options: DispatchOptions,
    deferred: DispatchDeferred,
}

/// In-process event bus with single-handler and multi-observer fan-out
///
/// Each event type has at most one handler, which produces the dispatch
/// result, and any number of observers, which only perform side effects.
/// Dispatched events are executed by a fixed pool of workers.
pub struct EventBus {
    registry: Registry,
    pool: WorkerPool,
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Result<Self, BusError> {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    ///
    /// With `auto_start` set the workers are started immediately, which
    /// requires a tokio runtime.
    pub fn with_config(config: EventBusConfig) -> Result<Self, BusError> {
        config.validate()?;
        let bus = Self {
            registry: Registry::default(),
            pool: WorkerPool::new(config.pool_config())?,
            config,
        };
        if bus.config.auto_start {
            bus.start()?;
        }
        Ok(bus)
    }

    /// Start the workers. Idempotent.
    pub fn start(&self) -> Result<(), BusError> {
        self.pool.start()
    }

    /// Refuse new dispatches, finish everything already queued, and wait for
    /// the workers to exit. Idempotent.
    pub async fn stop(&self) {
        self.pool.stop().await;
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.pool.state()
    }

    /// Register the handler for an event type, replacing any previous one
    pub fn add_handler<F>(
        &self,
        event_type: impl IntoEventType,
        handler: F,
    ) -> Result<(), BusError>
    where
        F: Fn(&[serde_json::Value], DispatchResolver) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event_type = event_type.into_event_type()?;
        let mut handlers = self.registry.handlers.write();
        if handlers.insert(event_type.clone(), Arc::new(handler)).is_some() {
            tracing::debug!("Handler for '{}' replaced", event_type);
        } else {
            tracing::debug!("Handler for '{}' added", event_type);
        }
        Ok(())
    }

    /// Register an observer for an event type, replacing any observer with the same id
    pub fn add_observer<F>(
        &self,
        event_type: impl IntoEventType,
        id: impl IntoObserverId,
        observer: F,
    ) -> Result<(), BusError>
    where
        F: Fn(&[serde_json::Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let event_type = event_type.into_event_type()?;
        let id = id.into_observer_id()?;
        let mut observers = self.registry.observers.write();
        let set = observers.entry(event_type.clone()).or_default();
        if set.insert(id.clone(), Arc::new(observer)).is_some() {
            tracing::debug!("Observer '{}' for '{}' replaced", id, event_type);
        } else {
            tracing::debug!("Observer '{}' for '{}' added", id, event_type);
        }
        Ok(())
    }

    /// Remove the handler for an event type
    ///
    /// Returns true if a handler was registered.
    pub fn remove_handler(&self, event_type: impl IntoEventType) -> Result<bool, BusError> {
        let event_type = event_type.into_event_type()?;
        let removed = self.registry.handlers.write().remove(&event_type).is_some();
        if removed {
            tracing::debug!("Handler for '{}' removed", event_type);
        }
        Ok(removed)
    }

    /// Remove one observer of an event type
    ///
    /// Returns true if the observer was registered.
    pub fn remove_observer(
        &self,
        event_type: impl IntoEventType,
        id: impl IntoObserverId,
    ) -> Result<bool, BusError> {
        let event_type = event_type.into_event_type()?;
        let id = id.into_observer_id()?;
        let mut observers = self.registry.observers.write();
        let Some(set) = observers.get_mut(&event_type) else {
            return Ok(false);
        };
        let removed = set.remove(&id).is_some();
        if set.is_empty() {
            observers.remove(&event_type);
        }
        if removed {
            tracing::debug!("Observer '{}' for '{}' removed", id, event_type);
        }
        Ok(removed)
    }

    /// Whether a handler is registered for the event type
    pub fn has_handler(&self, event_type: &EventType) -> bool {
        self.registry.handlers.read().contains_key(event_type)
    }

    /// Number of event types with a handler
    pub fn handler_count(&self) -> usize {
        self.registry.handlers.read().len()
    }

    /// Number of observers registered for the event type
    pub fn observer_count(&self, event_type: &EventType) -> usize {
        self.registry
            .observers
            .read()
            .get(event_type)
            .map_or(0, |set| set.len())
    }

    /// Dispatch an event and return its deferred result
    ///
    /// Returns as soon as the event is queued; waits only while the queue is
    /// full. Handler failures never surface here, only through the deferred.
    pub async fn dispatch(
        &self,
        event: Event,
        options: DispatchOptions,
    ) -> Result<DispatchDeferred, BusError> {
        let (job, deferred) = self.prepare(event, options);
        self.pool.submit(job).await?;
        Counters::bump(&self.registry.counters.dispatched);
        Ok(deferred)
    }

    /// Dispatch from synchronous code, blocking the thread while the queue is full
    ///
    /// Must not be called from within an async execution context.
    pub fn blocking_dispatch(
        &self,
        event: Event,
        options: DispatchOptions,
    ) -> Result<DispatchDeferred, BusError> {
        let (job, deferred) = self.prepare(event, options);
        self.pool.blocking_submit(job)?;
        Counters::bump(&self.registry.counters.dispatched);
        Ok(deferred)
    }

    /// Get a snapshot of the activity counters
    pub fn stats(&self) -> BusStats {
        self.registry.counters.snapshot()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    fn prepare(&self, event: Event, options: DispatchOptions) -> (Job, DispatchDeferred) {
        let deferred = Deferred::labelled(event.event_type.as_str());
        let task = Task {
            id: DispatchId::new(),
            event,
            options,
            deferred: deferred.clone(),
        };
        tracing::debug!("{} queued for '{}'", task.id, task.event.event_type);
        let registry = self.registry.clone();
        (Box::new(move || registry.execute(task)), deferred)
    }
}

impl Registry {
    /// Run one task on the current worker: observers first, then the handler.
    fn execute(&self, task: Task) {
        let Task {
            id,
            event,
            options,
            deferred,
        } = task;

        self.notify_observers(id, &event);

        let handler = self.handlers.read().get(&event.event_type).cloned();
        match handler {
            Some(handler) => self.invoke_handler(id, &event, handler, &deferred),
            None => {
                Counters::bump(&self.counters.missing_handlers);
                if options.enforce_handler {
                    tracing::warn!("{} has no handler for '{}'", id, event.event_type);
                    deferred.settle_quietly(Err(DispatchError::NoHandler {
                        event_type: event.event_type.to_string(),
                    }));
                } else {
                    deferred.settle_quietly(Ok(DispatchValue::Null));
                }
            }
        }

        Counters::bump(&self.counters.completed);
    }

    fn notify_observers(&self, id: DispatchId, event: &Event) {
        // Snapshot so observers run without holding the lock.
        let observers: Vec<(ObserverId, ObserverFn)> = self
            .observers
            .read()
            .get(&event.event_type)
            .map(|set| {
                set.iter()
                    .map(|(observer_id, observer)| (observer_id.clone(), Arc::clone(observer)))
                    .collect()
            })
            .unwrap_or_default();

        for (observer_id, observer) in observers {
            let reason = match panic::catch_unwind(AssertUnwindSafe(|| observer(&event.args))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{:#}", e),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };
            Counters::bump(&self.counters.observer_faults);
            tracing::warn!(
                "{} observer '{}' for '{}' failed: {}",
                id,
                observer_id,
                event.event_type,
                reason
            );
        }
    }

    fn invoke_handler(
        &self,
        id: DispatchId,
        event: &Event,
        handler: HandlerFn,
        deferred: &DispatchDeferred,
    ) {
        let armed = Arc::new(AtomicBool::new(false));
        let resolver = deferred.guarded_resolver(Arc::clone(&armed));

        let fault = match panic::catch_unwind(AssertUnwindSafe(|| handler(&event.args, resolver)))
        {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{:#}", e)),
            Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
        };

        let reason = match fault {
            Some(reason) => reason,
            None if deferred.is_settled() => return,
            None => {
                // The resolver now rejects on drop; if it is already gone nobody can settle.
                armed.store(true, Ordering::SeqCst);
                if Arc::strong_count(&armed) > 1 {
                    tracing::debug!("{} handler for '{}' completes later", id, event.event_type);
                    return;
                }
                if deferred.is_settled() {
                    return;
                }
                "handler returned without settling".to_string()
            }
        };

        let rejected = deferred.settle_quietly(Err(DispatchError::HandlerFault {
            event_type: event.event_type.to_string(),
            reason: reason.clone(),
        }));
        if rejected {
            Counters::bump(&self.counters.handler_faults);
            tracing::error!("{} handler for '{}' failed: {}", id, event.event_type, reason);
        } else {
            tracing::warn!(
                "{} handler for '{}' failed after settling: {}",
                id,
                event.event_type,
                reason
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}
