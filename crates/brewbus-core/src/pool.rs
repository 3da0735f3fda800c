//! Fixed-size worker pool.
//!
//! A fixed number of workers pull jobs from one shared bounded queue in FIFO
//! order. Submitting to a full queue waits for space rather than dropping or
//! rejecting the job. Each job runs on tokio's blocking thread pool so that it
//! may sleep or perform blocking work while occupying only its own worker.

use crate::error::BusError;
use crate::types::Job;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Lifecycle of a pool or bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Constructed; jobs may be queued but nothing runs yet
    Created,
    /// Workers are consuming the queue
    Running,
    /// No new jobs are accepted; terminal
    Stopped,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Created => write!(f, "created"),
            RunState::Running => write!(f, "running"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of workers
    pub size: usize,
    /// Maximum number of jobs waiting in the queue
    pub queue_capacity: usize,
}

impl PoolConfig {
    /// Reject zero-sized pools and queues
    pub fn validate(&self) -> Result<(), BusError> {
        if self.size == 0 {
            return Err(BusError::validation("pool size", "must be > 0"));
        }
        if self.queue_capacity == 0 {
            return Err(BusError::validation("queue capacity", "must be > 0"));
        }
        Ok(())
    }
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

/// A fixed set of workers consuming a bounded job queue
pub struct WorkerPool {
    config: PoolConfig,
    sender: RwLock<Option<mpsc::Sender<Job>>>,
    receiver: SharedReceiver,
    workers: Mutex<Vec<JoinHandle<()>>>,
    state: Mutex<RunState>,
    active: Arc<AtomicUsize>,
    /// Set once every worker has exited after a stop
    drained: watch::Sender<bool>,
}

impl WorkerPool {
    /// Create a pool. Workers are not spawned until [`start`](Self::start).
    pub fn new(config: PoolConfig) -> Result<Self, BusError> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        Ok(Self {
            config,
            sender: RwLock::new(Some(tx)),
            receiver: Arc::new(tokio::sync::Mutex::new(rx)),
            workers: Mutex::new(Vec::with_capacity(config.size)),
            state: Mutex::new(RunState::Created),
            active: Arc::new(AtomicUsize::new(0)),
            drained: watch::channel(false).0,
        })
    }

    /// Spawn the workers. Must be called from within a tokio runtime.
    ///
    /// Calling this on a running pool does nothing; a stopped pool stays stopped.
    pub fn start(&self) -> Result<(), BusError> {
        let mut state = self.state.lock();
        match *state {
            RunState::Running => return Ok(()),
            RunState::Stopped => {
                tracing::warn!("Ignoring start request for a stopped worker pool");
                return Ok(());
            }
            RunState::Created => {}
        }
        self.spawn_workers()?;
        *state = RunState::Running;
        tracing::info!(
            "Worker pool started with {} workers (queue capacity {})",
            self.config.size,
            self.config.queue_capacity
        );
        Ok(())
    }

    /// Stop accepting jobs, let queued and running jobs finish, then wait for
    /// every worker to exit.
    ///
    /// Concurrent callers all return only after the workers have exited.
    pub async fn stop(&self) {
        let mut drained = self.drained.subscribe();
        let already_stopping = {
            let mut state = self.state.lock();
            match *state {
                RunState::Stopped => true,
                // Spawn workers so jobs queued before start still drain.
                RunState::Created => {
                    if let Err(e) = self.spawn_workers() {
                        tracing::warn!("Queued jobs will not run: {}", e);
                    }
                    *state = RunState::Stopped;
                    false
                }
                RunState::Running => {
                    *state = RunState::Stopped;
                    false
                }
            }
        };

        if already_stopping {
            // The sender lives in `self`, so the channel stays open while we wait.
            let _ = drained.wait_for(|done| *done).await;
            return;
        }

        // Dropping our sender closes the queue once in-flight submits complete.
        self.sender.write().take();

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!("Worker ended abnormally: {}", e);
            }
        }
        self.drained.send_replace(true);
        tracing::info!("Worker pool stopped");
    }

    /// Queue a job, waiting for space if the queue is full
    pub async fn submit(&self, job: Job) -> Result<(), BusError> {
        let sender = self.sender()?;
        sender.send(job).await.map_err(|_| BusError::EmitterStopped)
    }

    /// Queue a job from synchronous code, blocking the thread while the queue is full
    ///
    /// Must not be called from within an async execution context.
    pub fn blocking_submit(&self, job: Job) -> Result<(), BusError> {
        let sender = self.sender()?;
        sender.blocking_send(job).map_err(|_| BusError::EmitterStopped)
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Whether workers are consuming the queue
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.config.size
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    /// Jobs executing right now
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn sender(&self) -> Result<mpsc::Sender<Job>, BusError> {
        if self.state() == RunState::Stopped {
            return Err(BusError::EmitterStopped);
        }
        self.sender.read().clone().ok_or(BusError::EmitterStopped)
    }

    fn spawn_workers(&self) -> Result<(), BusError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime)?;
        let mut workers = self.workers.lock();
        for id in 0..self.config.size {
            let receiver = Arc::clone(&self.receiver);
            let active = Arc::clone(&self.active);
            workers.push(runtime.spawn(run_worker(id, receiver, active)));
        }
        Ok(())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("active", &self.active())
            .finish()
    }
}

async fn run_worker(id: usize, receiver: SharedReceiver, active: Arc<AtomicUsize>) {
    tracing::debug!("Worker {} started", id);
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        active.fetch_add(1, Ordering::SeqCst);
        let result = tokio::task::spawn_blocking(job).await;
        active.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = result {
            tracing::error!("Worker {} job failed: {}", id, e);
        }
    }
    tracing::debug!("Worker {} exiting", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(size: usize, queue_capacity: usize) -> PoolConfig {
        PoolConfig {
            size,
            queue_capacity,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(WorkerPool::new(config(0, 4)).is_err());
        assert!(WorkerPool::new(config(2, 0)).is_err());
        assert!(WorkerPool::new(config(2, 4)).is_ok());
    }

    #[test]
    fn test_start_requires_runtime() {
        let pool = WorkerPool::new(config(1, 1)).expect("valid config");
        assert_eq!(pool.start(), Err(BusError::NoRuntime));
        assert_eq!(pool.state(), RunState::Created);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_jobs_run_and_drain_on_stop() {
        let pool = WorkerPool::new(config(2, 16)).expect("valid config");
        pool.start().expect("runtime available");
        assert!(pool.is_running());

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                std::thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .expect("pool running");
        }

        pool.stop().await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.state(), RunState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_stops_wait_for_drain() {
        let pool = Arc::new(WorkerPool::new(config(1, 4)).expect("valid config"));
        pool.start().expect("runtime available");
        assert_eq!(pool.size(), 1);

        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        pool.submit(Box::new(move || {
            std::thread::sleep(Duration::from_millis(300));
            f.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .expect("pool running");

        let first = {
            let pool = pool.clone();
            let finished = finished.clone();
            tokio::spawn(async move {
                pool.stop().await;
                finished.load(Ordering::SeqCst)
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.stop().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(first.await.expect("first stop finished"), 1);
        assert_eq!(pool.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn test_submit_after_stop_fails() {
        let pool = WorkerPool::new(config(1, 1)).expect("valid config");
        pool.start().expect("runtime available");
        pool.stop().await;
        // Second stop is a no-op
        pool.stop().await;

        let result = pool.submit(Box::new(|| {})).await;
        assert_eq!(result, Err(BusError::EmitterStopped));
    }

    #[tokio::test]
    async fn test_jobs_queued_before_start_run_on_stop() {
        let pool = WorkerPool::new(config(1, 4)).expect("valid config");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = counter.clone();
            pool.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .expect("queue has space");
        }
        assert_eq!(pool.queued(), 3);

        pool.stop().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(config(1, 4)).expect("valid config");
        pool.start().expect("runtime available");

        let counter = Arc::new(AtomicUsize::new(0));
        pool.submit(Box::new(|| panic!("spilled the milk")))
            .await
            .expect("pool running");
        let c = counter.clone();
        pool.submit(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .expect("pool running");

        pool.stop().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
