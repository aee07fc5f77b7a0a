//! Job trait definition and helpers for work submitted to the pool.

use std::fmt;

use tokio::sync::oneshot;

use crate::error::JobError;

/// A job boxed for hand-off to a worker.
pub type BoxedJob = Box<dyn Job>;

/// Trait for units of work executed by pool workers.
///
/// The pool never looks inside a job beyond this contract. `name` and
/// `context` are only used to label log records.
///
/// # Example
///
/// ```rust
/// use handoff_pool::{Job, JobError};
///
/// struct SendWelcomeMail {
///     user_id: u64,
/// }
///
/// #[async_trait::async_trait]
/// impl Job for SendWelcomeMail {
///     fn name(&self) -> &str {
///         "send_welcome_mail"
///     }
///
///     async fn execute(&mut self) -> Result<(), JobError> {
///         println!("mailing user {}", self.user_id);
///         Ok(())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait Job: Send + 'static {
    /// Name used to identify the job in logs.
    fn name(&self) -> &str;

    /// Perform the work.
    ///
    /// An error is logged by the worker and then dropped; it is never
    /// returned to whoever enqueued the job.
    async fn execute(&mut self) -> Result<(), JobError>;

    /// Request metadata used to correlate log records with the caller.
    fn context(&self) -> Option<&RequestContext> {
        None
    }
}

#[async_trait::async_trait]
impl Job for BoxedJob {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        self.as_mut().execute().await
    }

    fn context(&self) -> Option<&RequestContext> {
        self.as_ref().context()
    }
}

/// Correlation identifiers carried by a job from the request that created it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub trace_id: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Where a job failure was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    /// The pool refused the job.
    Admission,
    /// The job ran and failed.
    Execution,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Admission => "admission",
            Stage::Execution => "execution",
        }
    }
}

/// Log a job failure, attaching the job's request context when it has one.
pub(crate) fn report_failure(
    job_name: &str,
    context: Option<&RequestContext>,
    stage: Stage,
    error: &dyn fmt::Display,
) {
    tracing::error!(
        job_name,
        stage = stage.as_str(),
        request_id = context.and_then(|c| c.request_id.as_deref()),
        trace_id = context.and_then(|c| c.trace_id.as_deref()),
        error = %error,
        "worker job error"
    );
}

type BlockingTask = Box<dyn FnOnce() -> Result<(), JobError> + Send + 'static>;

/// A job wrapping a synchronous closure.
///
/// The closure runs on tokio's blocking thread pool, so CPU-bound or
/// blocking I/O work does not stall the worker's runtime thread.
///
/// ```rust
/// use handoff_pool::BlockingJob;
///
/// let job = BlockingJob::new("checksum", || {
///     let _sum: u64 = (0..1_000u64).sum();
///     Ok(())
/// });
/// ```
pub struct BlockingJob {
    name: String,
    task: Option<BlockingTask>,
    context: Option<RequestContext>,
}

impl BlockingJob {
    pub fn new<F>(name: impl Into<String>, task: F) -> Self
    where
        F: FnOnce() -> Result<(), JobError> + Send + 'static,
    {
        Self {
            name: name.into(),
            task: Some(Box::new(task)),
            context: None,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }
}

impl fmt::Debug for BlockingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingJob")
            .field("name", &self.name)
            .field("executed", &self.task.is_none())
            .field("context", &self.context)
            .finish()
    }
}

#[async_trait::async_trait]
impl Job for BlockingJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        let Some(task) = self.task.take() else {
            return Err(format!("blocking job {} already executed", self.name).into());
        };
        tokio::task::spawn_blocking(task).await?
    }

    fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }
}

/// Receiver for the outcome of a [`Reported`] job.
pub type Outcome = oneshot::Receiver<Result<(), JobError>>;

/// A job that delivers its outcome to the producer.
///
/// The pool itself is fire-and-forget. Wrapping a job with [`reported`]
/// routes its result to a receiver instead of the pool's error log. If the
/// receiver has been dropped, a failure is logged by the pool as usual.
pub struct Reported<J> {
    inner: J,
    outcome: Option<oneshot::Sender<Result<(), JobError>>>,
}

/// Wrap `job` so its result can be awaited through the returned receiver.
///
/// The receiver resolves to `Err(RecvError)` if the job was never executed,
/// for example because the pool rejected it.
pub fn reported<J: Job>(job: J) -> (Reported<J>, Outcome) {
    let (tx, rx) = oneshot::channel();
    (
        Reported {
            inner: job,
            outcome: Some(tx),
        },
        rx,
    )
}

#[async_trait::async_trait]
impl<J: Job> Job for Reported<J> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        let result = self.inner.execute().await;
        match self.outcome.take() {
            Some(tx) => tx.send(result).or_else(|unsent| unsent),
            None => result,
        }
    }

    fn context(&self) -> Option<&RequestContext> {
        self.inner.context()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
