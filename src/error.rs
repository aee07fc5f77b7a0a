//! Error types for the worker pool crate.

use std::error::Error;
use std::num::ParseIntError;
use std::time::Duration;

use thiserror::Error;

/// Error returned by a job's own execution.
///
/// Execution errors never reach the producer. The worker logs them and moves
/// on to the next job.
pub type JobError = Box<dyn Error + Send + Sync + 'static>;

/// Errors raised while resolving or validating pool configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Pool requires at least one worker.
    #[error("Invalid configuration: max_workers must be greater than 0 (got {value})")]
    MaxWorkersMustBePositive { value: i64 },

    /// Worker count exceeds what the dispatch queue can hold.
    #[error("Invalid configuration: max_workers must be at most {max} (got {value})")]
    MaxWorkersTooLarge { value: usize, max: usize },

    /// A configuration value could not be parsed.
    #[error("Invalid configuration value for {key}: {value:?}")]
    InvalidValue {
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// The dotenv file could not be loaded.
    #[error("Failed to load dotenv file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

/// Admission failures returned synchronously by [`WorkerPool::enqueue`].
///
/// [`WorkerPool::enqueue`]: crate::WorkerPool::enqueue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The pool has been stopped and no longer accepts jobs.
    #[error("send job to a stopped worker pool")]
    Stopped,

    /// No worker became idle before the deadline.
    #[error("wait for worker timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Errors from pool lifecycle operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `start` was called on a pool that is already running.
    #[error("Worker pool is already started")]
    AlreadyStarted,

    /// The operation needs a pool that has not been stopped.
    #[error("Worker pool is stopped")]
    Stopped,

    /// A worker task panicked outside of job execution.
    #[error("Worker panicked: {reason}")]
    WorkerPanicked { reason: String },
}
