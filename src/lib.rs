//! A bounded async worker pool with hand-off admission control.
//!
//! The pool runs a fixed number of worker tasks. Producers never push into a
//! backlog: each job is handed directly to an idle worker, and if none frees
//! up within the caller's timeout the job is rejected on the spot.
//!
//! - [`WorkerPool`] - Owns the workers and the enqueue/start/stop surface
//! - [`Job`] - Implement this for your unit of work
//! - [`BlockingJob`] - Runs a synchronous closure on the blocking thread pool
//! - [`reported`] - Opt-in delivery of a job's result back to the producer
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────┐  slot   ┌──────────┐
//! enqueue(job) ───►│  dispatch queue  │◄────────│ worker 0 │
//!      │           │ (idle worker     │◄────────│ worker 1 │
//!      │           │  slots, bounded) │◄────────│ worker N │
//!      │           └──────────────────┘         └──────────┘
//!      └──── job sent through the claimed slot ───────▲
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use handoff_pool::{Job, JobError, PoolConfig, WorkerPool};
//!
//! struct PrintJob;
//!
//! #[async_trait::async_trait]
//! impl Job for PrintJob {
//!     fn name(&self) -> &str {
//!         "print"
//!     }
//!
//!     async fn execute(&mut self) -> Result<(), JobError> {
//!         println!("Processing task");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = WorkerPool::new(PoolConfig { max_workers: 4 })?;
//!     pool.start().await?;
//!
//!     pool.enqueue(PrintJob, Some(Duration::from_millis(100))).await?;
//!
//!     pool.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod dispatch;
mod error;
mod job;
mod pool;

pub use config::{
    ConfigSource, EnvConfig, PoolConfig, DEFAULT_MAX_WORKERS, MAX_WORKERS_ENV, MAX_WORKERS_LIMIT,
};
pub use error::{ConfigError, EnqueueError, JobError, PoolError};
pub use job::{reported, BlockingJob, BoxedJob, Job, Outcome, Reported, RequestContext};
pub use pool::WorkerPool;
