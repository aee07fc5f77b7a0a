//! Worker pool implementation with hand-off admission control.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigSource, EnvConfig, PoolConfig};
use crate::dispatch::{self, DispatchQueue, IdleWorkers, Slot};
use crate::error::{ConfigError, EnqueueError, PoolError};
use crate::job::{report_failure, BoxedJob, Job, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Stopped,
}

struct PoolState {
    phase: Phase,
    max_workers: usize,
    /// `None` once the pool has stopped and released the queue.
    dispatch: Option<DispatchQueue>,
}

struct Inner {
    state: RwLock<PoolState>,
    shutdown: CancellationToken,
    stop_requested: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    async fn advertiser(&self) -> Option<mpsc::Sender<Slot>> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        let state = self.state.read().await;
        state.dispatch.as_ref().map(DispatchQueue::advertiser)
    }

    async fn idle_workers(&self) -> Option<IdleWorkers> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        let state = self.state.read().await;
        state.dispatch.as_ref().map(DispatchQueue::idle_workers)
    }

    /// Mark the pool stopped and release the dispatch queue.
    async fn close(&self) {
        let mut state = self.state.write().await;
        state.phase = Phase::Stopped;
        if let Some(dispatch) = state.dispatch.take() {
            dispatch.close().await;
        }
        info!("Worker pool stopped");
    }
}

/// A bounded pool of worker tasks fed through direct hand-off.
///
/// The pool spawns `max_workers` tasks. Each idle worker publishes a
/// single-use slot into the dispatch queue; [`enqueue`] claims the oldest
/// slot and hands the job straight to that worker. Nothing is buffered: if
/// no worker becomes idle before the timeout, the job is rejected.
///
/// `WorkerPool` is a cheap handle; clones share the same workers.
///
/// # Lifecycle
///
/// 1. Create with [`WorkerPool::new`]
/// 2. Call [`WorkerPool::start`] to spawn the workers
/// 3. Submit work with [`WorkerPool::enqueue`]
/// 4. Call [`WorkerPool::stop`] (or [`WorkerPool::shutdown`] to also wait for
///    in-flight jobs). Stopping is permanent.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use handoff_pool::{BlockingJob, PoolConfig, WorkerPool};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = WorkerPool::new(PoolConfig { max_workers: 4 })?;
/// pool.start().await?;
///
/// let job = BlockingJob::new("resize_thumbnail", || Ok(()));
/// pool.enqueue(job, Some(Duration::from_millis(50))).await?;
///
/// pool.shutdown().await?;
/// # Ok(())
/// # }
/// ```
///
/// [`enqueue`]: WorkerPool::enqueue
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

impl WorkerPool {
    /// Create a pool from any configuration source.
    ///
    /// Workers are not spawned until [`WorkerPool::start`].
    ///
    /// # Errors
    ///
    /// Returns the source's [`ConfigError`] if it cannot be resolved, or the
    /// [`PoolConfig::validate`] error if `max_workers` is 0 or too large.
    pub fn new<S: ConfigSource>(source: S) -> Result<Self, ConfigError> {
        let config = source.resolve()?;
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(PoolState {
                    phase: Phase::Created,
                    max_workers: config.max_workers,
                    dispatch: Some(DispatchQueue::new(config.max_workers)),
                }),
                shutdown: CancellationToken::new(),
                stop_requested: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Create a pool configured from `POOL_MAX_WORKERS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(EnvConfig::new())
    }

    /// Spawn the worker tasks and the shutdown watcher.
    ///
    /// Returns once every task has been spawned; it does not wait for them
    /// to finish.
    ///
    /// # Errors
    ///
    /// - [`PoolError::AlreadyStarted`] if the pool is running
    /// - [`PoolError::Stopped`] if the pool has been stopped
    pub async fn start(&self) -> Result<(), PoolError> {
        let mut state = self.inner.state.write().await;
        match state.phase {
            Phase::Running => return Err(PoolError::AlreadyStarted),
            Phase::Stopped => return Err(PoolError::Stopped),
            Phase::Created => {}
        }

        if self.inner.shutdown.is_cancelled() {
            drop(state);
            self.inner.close().await;
            return Err(PoolError::Stopped);
        }

        let max_workers = state.max_workers;
        let mut tasks = self.inner.tasks.lock().await;
        tasks.reserve(max_workers + 1);
        for worker_id in 0..max_workers {
            tasks.push(tokio::spawn(run_worker(worker_id, Arc::clone(&self.inner))));
        }
        tasks.push(tokio::spawn(watch_shutdown(Arc::clone(&self.inner))));

        state.phase = Phase::Running;
        info!(max_workers, "Worker pool started");
        Ok(())
    }

    /// Signal the pool to stop accepting jobs.
    ///
    /// Idle workers exit and pending [`enqueue`] calls fail with
    /// [`EnqueueError::Stopped`]. Jobs already handed to a worker run to
    /// completion. Calling this more than once has no further effect.
    ///
    /// [`enqueue`]: WorkerPool::enqueue
    pub fn stop(&self) {
        if self
            .inner
            .stop_requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Worker pool stop already requested");
            return;
        }
        info!("Stopping worker pool");
        self.inner.shutdown.cancel();
    }

    /// Stop the pool and wait for every worker to finish its current job.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::WorkerPanicked`] if a pool task panicked.
    pub async fn shutdown(&self) -> Result<(), PoolError> {
        self.stop();

        let tasks = std::mem::take(&mut *self.inner.tasks.lock().await);
        for (idx, handle) in tasks.into_iter().enumerate() {
            handle.await.map_err(|e| PoolError::WorkerPanicked {
                reason: format!("Task {} panicked: {}", idx, e),
            })?;
        }

        info!("All workers shut down successfully");
        Ok(())
    }

    /// Stop the pool when the process receives Ctrl-C.
    ///
    /// The listener exits on its own once the pool is stopped by other means.
    pub fn stop_on_ctrl_c(&self) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = pool.inner.shutdown.cancelled() => {}
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        info!("Received Ctrl-C");
                        pool.stop();
                    }
                    Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
                },
            }
        })
    }

    /// Replace the dispatch queue with one of capacity `max_workers`.
    ///
    /// Before [`WorkerPool::start`] this also sets how many workers are
    /// spawned. On a running pool it is best-effort: the worker count does not
    /// change, and idle workers move to the new queue once the old one is
    /// released.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Config`] if `max_workers` is 0 or too large
    /// - [`PoolError::Stopped`] if the pool has been stopped
    pub async fn resize(&self, max_workers: usize) -> Result<(), PoolError> {
        PoolConfig { max_workers }.validate()?;

        let mut state = self.inner.state.write().await;
        if state.phase == Phase::Stopped || self.inner.shutdown.is_cancelled() {
            return Err(PoolError::Stopped);
        }
        if state.phase == Phase::Running {
            warn!(
                from = state.max_workers,
                to = max_workers,
                "Resizing a running pool; worker count is unchanged"
            );
        }

        state.max_workers = max_workers;
        state.dispatch = Some(DispatchQueue::new(max_workers));
        Ok(())
    }

    /// Hand `job` to an idle worker, waiting at most `timeout`.
    ///
    /// `None` or a zero timeout waits until a worker is free or the pool
    /// stops. Success means a worker accepted the job, not that it finished.
    ///
    /// # Errors
    ///
    /// - [`EnqueueError::Stopped`] if the pool is stopped, before or during the wait
    /// - [`EnqueueError::Timeout`] if no worker became idle in time
    ///
    /// Both are also logged with the job's name and request context.
    pub async fn enqueue<J: Job>(
        &self,
        job: J,
        timeout: Option<Duration>,
    ) -> Result<(), EnqueueError> {
        self.enqueue_boxed(Box::new(job), timeout).await
    }

    /// Like [`WorkerPool::enqueue`] for an already boxed job.
    pub async fn enqueue_boxed(
        &self,
        job: BoxedJob,
        timeout: Option<Duration>,
    ) -> Result<(), EnqueueError> {
        let timeout = timeout.filter(|t| !t.is_zero());
        match self.hand_off(job, timeout).await {
            Ok(()) => Ok(()),
            Err((job, e)) => {
                report_failure(job.name(), job.context(), Stage::Admission, &e);
                Err(e)
            }
        }
    }

    async fn hand_off(
        &self,
        mut job: BoxedJob,
        timeout: Option<Duration>,
    ) -> Result<(), (BoxedJob, EnqueueError)> {
        let expired = async {
            match timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        loop {
            // The state lock is only held for this lookup, never while waiting.
            let Some(idle) = self.inner.idle_workers().await else {
                return Err((job, EnqueueError::Stopped));
            };

            let slot = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => {
                    return Err((job, EnqueueError::Stopped));
                }
                slot = idle.next() => slot,
                timeout = &mut expired => {
                    return Err((job, EnqueueError::Timeout { timeout }));
                }
            };

            // A closed queue was either released by shutdown or replaced by
            // resize; the next lookup tells which.
            let Some(slot) = slot else {
                continue;
            };

            match slot.send(job) {
                Ok(()) => return Ok(()),
                // The worker left before taking it; try the next one.
                Err(returned) => job = returned,
            }
        }
    }

    /// Current `max_workers` setting.
    pub async fn max_workers(&self) -> usize {
        self.inner.state.read().await.max_workers
    }

    /// Number of workers currently waiting for a job.
    pub async fn idle_workers(&self) -> usize {
        let state = self.inner.state.read().await;
        state.dispatch.as_ref().map_or(0, DispatchQueue::idle_count)
    }

    /// Whether the pool has been started and not yet stopped.
    pub async fn is_running(&self) -> bool {
        !self.is_stopped() && self.inner.state.read().await.phase == Phase::Running
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

async fn run_worker(worker_id: usize, inner: Arc<Inner>) {
    debug!(worker_id, "Worker starting");

    loop {
        let Some(advertiser) = inner.advertiser().await else {
            break;
        };

        // Advertise a fresh slot to announce this worker is idle.
        let (slot, intake) = dispatch::slot();
        tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => break,
            sent = advertiser.send(slot) => {
                if sent.is_err() {
                    // Queue closed or replaced; look it up again.
                    continue;
                }
            }
        }
        drop(advertiser);

        // An accepted job wins over shutdown.
        let job = tokio::select! {
            biased;
            job = intake => match job {
                Ok(job) => job,
                // Slot discarded with its queue.
                Err(_) => continue,
            },
            _ = inner.shutdown.cancelled() => break,
        };

        execute(worker_id, job).await;
    }

    debug!(worker_id, "Worker shutting down");
}

/// Run one job in its own task so a panic cannot take the worker down.
async fn execute(worker_id: usize, mut job: BoxedJob) {
    let name = job.name().to_owned();
    let context = job.context().cloned();
    debug!(worker_id, job_name = %name, "Worker received job");

    let run = tokio::spawn(async move { job.execute().await });

    match run.await {
        Ok(Ok(())) => debug!(worker_id, job_name = %name, "Job completed"),
        Ok(Err(e)) => report_failure(&name, context.as_ref(), Stage::Execution, &e),
        Err(e) => report_failure(&name, context.as_ref(), Stage::Execution, &e),
    }
}

async fn watch_shutdown(inner: Arc<Inner>) {
    inner.shutdown.cancelled().await;
    inner.close().await;
}

// =============================================================================
// Unit Tests
// =============================================================================
