//! Single-assignment deferred results.
//!
//! A [`Deferred`] starts pending and settles at most once, either resolved with
//! a value or rejected with a [`DispatchError`]. Any number of tasks may wait on
//! it; all of them observe the same outcome. Later attempts to settle it are
//! ignored and logged.
//!
//! A [`Resolver`] is the write-only half handed to event handlers so they can
//! complete a dispatch whenever their work is done.

use crate::error::DispatchError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The settled state of a deferred value
pub type Outcome<T> = std::result::Result<T, DispatchError>;

/// Shared single-assignment cell backing both halves
struct Slot<T> {
    label: Arc<str>,
    tx: watch::Sender<Option<Outcome<T>>>,
}

impl<T> Slot<T> {
    fn new(label: Arc<str>) -> (Self, watch::Receiver<Option<Outcome<T>>>) {
        let (tx, rx) = watch::channel(None);
        (Self { label, tx }, rx)
    }

    /// Store the outcome if nothing was stored yet. Returns true if this call won.
    fn settle(&self, outcome: Outcome<T>) -> bool {
        let mut pending = Some(outcome);
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = pending.take();
            true
        })
    }

    fn settle_logged(&self, outcome: Outcome<T>) -> bool {
        let kind = if outcome.is_ok() { "resolve" } else { "reject" };
        let settled = self.settle(outcome);
        if !settled {
            tracing::warn!("Deferred '{}' already settled, ignoring {}", self.label, kind);
        }
        settled
    }

    fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Caller-side handle to a single-assignment result
pub struct Deferred<T> {
    slot: Arc<Slot<T>>,
    rx: watch::Receiver<Option<Outcome<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            rx: self.rx.clone(),
        }
    }
}

impl<T: Clone> Deferred<T> {
    /// Create a new pending deferred
    pub fn new() -> Self {
        Self::labelled("deferred")
    }

    /// Create a new pending deferred with a label used in log messages
    pub fn labelled(label: impl Into<Arc<str>>) -> Self {
        let (slot, rx) = Slot::new(label.into());
        Self {
            slot: Arc::new(slot),
            rx,
        }
    }

    /// The label this deferred reports in log messages
    pub fn label(&self) -> &str {
        &self.slot.label
    }

    /// Resolve with a value. Returns false if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.slot.settle_logged(Ok(value))
    }

    /// Reject with an error. Returns false if already settled.
    pub fn reject(&self, error: DispatchError) -> bool {
        self.slot.settle_logged(Err(error))
    }

    /// Whether the deferred has been resolved or rejected
    pub fn is_settled(&self) -> bool {
        self.slot.is_settled()
    }

    /// The outcome if already settled, without waiting
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        self.rx.borrow().clone()
    }

    /// Create a write-only capability for this deferred
    pub fn resolver(&self) -> Resolver<T> {
        Resolver {
            slot: Arc::clone(&self.slot),
            armed: None,
        }
    }

    /// Create a resolver that rejects the deferred if it is dropped while
    /// pending, but only once `armed` has been set.
    pub(crate) fn guarded_resolver(&self, armed: Arc<AtomicBool>) -> Resolver<T> {
        Resolver {
            slot: Arc::clone(&self.slot),
            armed: Some(armed),
        }
    }

    /// Settle without logging a warning when already settled
    pub(crate) fn settle_quietly(&self, outcome: Outcome<T>) -> bool {
        self.slot.settle(outcome)
    }

    /// Wait until the deferred settles
    ///
    /// Only the calling task is suspended. Every waiter receives the same outcome.
    pub async fn wait(&self) -> Outcome<T> {
        let mut rx = self.rx.clone();
        let settled = rx
            .wait_for(Option::is_some)
            .await
            .map(|current| current.clone());
        match settled {
            Ok(Some(outcome)) => outcome,
            // The sender lives in our own slot, so the channel cannot close while we hold it.
            _ => Err(DispatchError::HandlerFault {
                event_type: self.slot.label.to_string(),
                reason: "result channel closed".to_string(),
            }),
        }
    }

    /// Wait until the deferred settles or the timeout elapses
    ///
    /// A timeout only stops this waiter; the deferred may still settle later.
    pub async fn wait_timeout(&self, timeout: Duration) -> Outcome<T> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(DispatchError::TimedOut {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("label", &self.slot.label)
            .field("settled", &self.slot.is_settled())
            .finish()
    }
}

/// Write-only capability to settle a [`Deferred`]
///
/// Handlers receive a resolver by value and may move it into background work
/// to complete the dispatch later.
pub struct Resolver<T> {
    slot: Arc<Slot<T>>,
    armed: Option<Arc<AtomicBool>>,
}

impl<T> Resolver<T> {
    /// Resolve with a value. Returns false if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.slot.settle_logged(Ok(value))
    }

    /// Reject with an error. Returns false if already settled.
    pub fn reject(&self, error: DispatchError) -> bool {
        self.slot.settle_logged(Err(error))
    }

    /// Whether the deferred has been resolved or rejected
    pub fn is_settled(&self) -> bool {
        self.slot.is_settled()
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        let Some(armed) = &self.armed else {
            return;
        };
        if armed.load(Ordering::SeqCst) && !self.slot.is_settled() {
            tracing::error!(
                "Resolver for '{}' dropped without settling",
                self.slot.label
            );
            self.slot.settle(Err(DispatchError::HandlerFault {
                event_type: self.slot.label.to_string(),
                reason: "resolver dropped without settling".to_string(),
            }));
        }
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("label", &self.slot.label)
            .field("settled", &self.slot.is_settled())
            .finish()
    }
}
