//! Type aliases for the callback shapes the bus stores.
//!
//! Handlers and observers are kept behind `Arc` so the worker executing a task
//! can take a snapshot of the registration tables and release the lock before
//! calling into user code.

use crate::deferred::{Deferred, Resolver};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// The value a dispatched event resolves to.
///
/// Handlers produce JSON-shaped values so the boundary can return them as a
/// response body unchanged.
pub type DispatchValue = serde_json::Value;

/// The argument list of an event, interpreted only by its handler and observers.
pub type EventArgs = Vec<serde_json::Value>;

/// The caller-side deferred returned by a dispatch.
pub type DispatchDeferred = Deferred<DispatchValue>;

/// The write capability passed to a handler.
pub type DispatchResolver = Resolver<DispatchValue>;

/// A handler: computes a result and settles the resolver.
///
/// Returning an error or panicking before the resolver is settled rejects the
/// dispatch with a handler fault.
pub type HandlerFn =
    Arc<dyn Fn(&[serde_json::Value], DispatchResolver) -> anyhow::Result<()> + Send + Sync>;

/// An observer: a side effect run on every dispatch of its event type.
pub type ObserverFn = Arc<dyn Fn(&[serde_json::Value]) -> anyhow::Result<()> + Send + Sync>;

/// A thread-safe reader-writer hash map.
pub type ThreadSafeRwMap<K, V> = Arc<RwLock<HashMap<K, V>>>;

/// A thread-safe reader-writer map of per-key ordered maps.
pub type ThreadSafeRwNestedMap<K, I, V> = Arc<RwLock<HashMap<K, BTreeMap<I, V>>>>;

/// A job executed by the worker pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;
