//! # Brewbus Core
//!
//! In-process event dispatch for Brewbus.
//! Provides the event bus with handler and observer registration, the bounded
//! worker pool that executes dispatched events, and the single-assignment
//! deferred values that carry results back to callers.

pub mod deferred;
pub mod error;
pub mod event_bus;
pub mod pool;
pub mod types;

pub use deferred::{Deferred, Outcome, Resolver};

pub use error::{BusError, DispatchError, Error, Result};

pub use event_bus::{
    BusStats, DispatchId, DispatchOptions, Event, EventBus, EventBusConfig, EventType,
    IntoEventType, IntoObserverId, ObserverId,
};

pub use pool::{PoolConfig, RunState, WorkerPool};

pub use types::{
    DispatchDeferred, DispatchResolver, DispatchValue, EventArgs, HandlerFn, Job, ObserverFn,
};
