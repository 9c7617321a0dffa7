//! Background search runtime.
//!
//! Searches for independent sessions run on a small, bounded pool of worker
//! threads. A search only holds a `RootHandle`, so the session stays usable
//! while it runs; results come back through a `SearchHandle`. Each job
//! carries its engine, so planners with different heuristics can share one
//! pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExecutionError, PlanError, PlanResult, ValidationError};
use crate::search::{SearchEngine, SearchReport, Target, TargetOrigin};
use crate::session::RootHandle;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of search workers.
    pub workers: usize,
    /// Maximum queued searches.
    pub queue_capacity: usize,
    /// How long a planner waits for a queued search before cancelling it.
    pub join_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            join_timeout_ms: 30_000,
        }
    }
}

impl RuntimeConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any value is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::InvalidRuntimeConfig {
                reason: "workers must be > 0".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidRuntimeConfig {
                reason: "queue_capacity must be > 0".to_string(),
            });
        }
        if self.join_timeout_ms == 0 {
            return Err(ValidationError::InvalidRuntimeConfig {
                reason: "join_timeout_ms must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

enum Job {
    Search {
        engine: Arc<SearchEngine>,
        root: RootHandle,
        targets: Vec<Target>,
        origin: TargetOrigin,
        cancel: Arc<AtomicBool>,
        reply: Sender<PlanResult<SearchReport>>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("diagplan-search-{idx}"))
                .spawn(move || loop {
                    match rx.recv() {
                        Ok(Job::Search {
                            engine,
                            root,
                            targets,
                            origin,
                            cancel,
                            reply,
                        }) => {
                            let result = engine.search_with(&root, &targets, origin, Some(&cancel));
                            let _ = reply.send(result);
                        }
                        Err(_) => break,

                        #[cfg(test)]
                        Ok(Job::Sleep { duration, reply }) => {
                            thread::sleep(duration);
                            let _ = reply.send(());
                        }
                    }
                })
                .expect("failed to spawn diagplan search worker");
            handles.push(handle);
        }

        Self {
            tx,
            workers: handles,
            queue_capacity,
        }
    }

    fn try_submit(&self, job: Job) -> PlanResult<()> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PlanError::Execution(ExecutionError::QueueFull {
                capacity: self.queue_capacity,
            })),
            Err(TrySendError::Disconnected(_)) => Err(PlanError::Execution(ExecutionError::Disconnected)),
        }
    }

    fn shutdown(self) {
        // Closing the channel lets workers drain queued jobs and exit.
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// Handle returned by `SearchRuntime::search_async`.
pub struct SearchHandle {
    rx: Receiver<PlanResult<SearchReport>>,
    cancel: Arc<AtomicBool>,
}

impl SearchHandle {
    /// Asks the search to stop. It finishes with `NoPathReason::Cancelled`
    /// unless it already completed.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Waits for the search to complete.
    ///
    /// # Errors
    ///
    /// The search's own error, or `Disconnected` if the worker went away.
    pub fn join(self) -> PlanResult<SearchReport> {
        self.rx
            .recv()
            .map_err(|_| PlanError::Execution(ExecutionError::Disconnected))?
    }

    /// Waits for the search to complete with a timeout.
    ///
    /// # Errors
    ///
    /// `Timeout` if no result arrived in time, otherwise as `join`.
    pub fn join_timeout(&self, timeout: Duration) -> PlanResult<SearchReport> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => PlanError::Execution(ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => PlanError::Execution(ExecutionError::Disconnected),
        })?
    }
}

/// Runs searches on a bounded worker pool.
pub struct SearchRuntime {
    engine: Arc<SearchEngine>,
    pool: Option<WorkerPool>,
}

impl SearchRuntime {
    /// Starts the worker threads.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid configuration.
    pub fn new(engine: SearchEngine, config: &RuntimeConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        let engine = Arc::new(engine);
        let pool = WorkerPool::start(config.workers, config.queue_capacity);
        debug!(workers = config.workers, queue = config.queue_capacity, "search runtime started");
        Ok(Self {
            engine,
            pool: Some(pool),
        })
    }

    /// Queues a search with the runtime's engine for derived targets.
    ///
    /// # Errors
    ///
    /// `QueueFull` when the queue is at capacity, `Disconnected` after shutdown.
    pub fn search_async(&self, root: RootHandle, targets: Vec<Target>) -> PlanResult<SearchHandle> {
        self.submit(Arc::clone(&self.engine), root, targets, TargetOrigin::Derived)
    }

    /// Queues a search with a caller-supplied engine.
    ///
    /// # Errors
    ///
    /// See `search_async`.
    pub fn submit(
        &self,
        engine: Arc<SearchEngine>,
        root: RootHandle,
        targets: Vec<Target>,
        origin: TargetOrigin,
    ) -> PlanResult<SearchHandle> {
        let pool = self
            .pool
            .as_ref()
            .ok_or(PlanError::Execution(ExecutionError::Disconnected))?;
        let (tx, rx) = bounded::<PlanResult<SearchReport>>(1);
        let cancel = Arc::new(AtomicBool::new(false));
        pool.try_submit(Job::Search {
            engine,
            root,
            targets,
            origin,
            cancel: Arc::clone(&cancel),
            reply: tx,
        })?;
        debug!(queued = pool.tx.len(), "search queued");
        Ok(SearchHandle { rx, cancel })
    }

    /// Runs a search on the pool and waits for it.
    ///
    /// # Errors
    ///
    /// See `search_async` and `SearchHandle::join`.
    pub fn search(&self, root: RootHandle, targets: Vec<Target>) -> PlanResult<SearchReport> {
        self.search_async(root, targets)?.join()
    }

    /// Engine used by `search_async`.
    #[must_use]
    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Stops accepting work and joins all workers.
    pub fn shutdown(mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> PlanResult<Receiver<()>> {
        let pool = self
            .pool
            .as_ref()
            .ok_or(PlanError::Execution(ExecutionError::Disconnected))?;
        let (tx, rx) = bounded::<()>(1);
        pool.try_submit(Job::Sleep { duration, reply: tx })?;
        Ok(rx)
    }
}

impl Drop for SearchRuntime {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;
    use crate::search::{NoPathReason, SearchLimits, SearchOutcome};
    use crate::session::Session;

    fn session() -> (Session, Target) {
        let mut kb = KnowledgeBase::builder();
        let a = kb.action("A", 1.0);
        let session = Session::new(Arc::new(kb.build().unwrap()));
        (session, Target::single(a, 1.0).unwrap())
    }

    #[test]
    fn queue_full_is_reported() {
        let runtime = SearchRuntime::new(
            SearchEngine::default(),
            &RuntimeConfig {
                workers: 1,
                queue_capacity: 1,
                ..RuntimeConfig::default()
            },
        )
        .unwrap();

        // Occupy the worker, then fill the queue.
        let busy = runtime.submit_sleep(Duration::from_millis(200)).unwrap();
        thread::sleep(Duration::from_millis(20));
        let queued = runtime.submit_sleep(Duration::from_millis(1)).unwrap();

        let (session, target) = session();
        let err = runtime
            .search_async(session.root_handle(), vec![target])
            .err()
            .unwrap();
        assert!(err.is_retryable());

        busy.recv().unwrap();
        queued.recv().unwrap();
    }

    #[test]
    fn search_runs_on_the_pool() {
        let runtime = SearchRuntime::new(SearchEngine::default(), &RuntimeConfig::default()).unwrap();
        let (session, target) = session();
        let report = runtime.search(session.root_handle(), vec![target]).unwrap();
        assert!(report.path().is_some());
        runtime.shutdown();
    }

    #[test]
    fn join_timeout_reports_timeout() {
        let runtime = SearchRuntime::new(
            SearchEngine::new(SearchLimits::default()),
            &RuntimeConfig {
                workers: 1,
                queue_capacity: 4,
                ..RuntimeConfig::default()
            },
        )
        .unwrap();
        let busy = runtime.submit_sleep(Duration::from_millis(200)).unwrap();
        let (session, target) = session();
        let handle = runtime.search_async(session.root_handle(), vec![target]).unwrap();
        let err = handle.join_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, PlanError::Execution(ExecutionError::Timeout { .. })));
        busy.recv().unwrap();
    }

    #[test]
    fn cancel_before_start_yields_cancelled() {
        let runtime = SearchRuntime::new(
            SearchEngine::default(),
            &RuntimeConfig {
                workers: 1,
                queue_capacity: 4,
                ..RuntimeConfig::default()
            },
        )
        .unwrap();
        let busy = runtime.submit_sleep(Duration::from_millis(100)).unwrap();
        let (session, target) = session();
        let handle = runtime.search_async(session.root_handle(), vec![target]).unwrap();
        handle.cancel();
        busy.recv().unwrap();
        let report = handle.join().unwrap();
        assert_eq!(report.outcome, SearchOutcome::NoPath(NoPathReason::Cancelled));
    }

    #[test]
    fn zero_workers_are_rejected() {
        let config = RuntimeConfig {
            workers: 0,
            queue_capacity: 1,
            ..RuntimeConfig::default()
        };
        assert!(SearchRuntime::new(SearchEngine::default(), &config).is_err());
        let config = RuntimeConfig {
            join_timeout_ms: 0,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
