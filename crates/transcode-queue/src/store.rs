//! Durable store contract: FIFO queue, active set, per-job documents.

use async_trait::async_trait;
use transcode_models::{Job, JobError, JobId};

use crate::error::QueueResult;

/// Mutation applied to a job document inside an atomic update.
///
/// May run more than once when a concurrent writer wins the race, so it must
/// not have side effects beyond the document.
pub type JobMutation<'a> = &'a (dyn Fn(&mut Job) -> Result<(), JobError> + Send + Sync);

/// Storage operations the queue, gate and aggregator rely on.
///
/// Every method that touches more than one structure is atomic with respect
/// to all other callers of the same store, including other processes.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Check connectivity.
    async fn ping(&self) -> QueueResult<()>;

    /// Create the job document and push its id to the queue tail.
    ///
    /// Fails with `DuplicateJob` without touching anything if a document with
    /// the same id exists. Returns the queue length after the push.
    async fn create_and_enqueue(&self, job: &Job) -> QueueResult<u64>;

    /// If fewer than `capacity` jobs are active, pop the queue head and add it
    /// to the active set as a single step.
    async fn claim_next(&self, capacity: usize) -> QueueResult<Option<JobId>>;

    /// Undo a claim: remove from the active set and put back at the queue head.
    async fn unclaim(&self, job_id: &JobId) -> QueueResult<()>;

    /// Remove a job from the active set.
    async fn release(&self, job_id: &JobId) -> QueueResult<()>;

    /// Read a job document.
    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>>;

    /// Read-modify-write a job document, serialized per job id.
    ///
    /// Returns the document as written. Fails with `JobNotFound` if the
    /// document does not exist.
    async fn update_job(&self, job_id: &JobId, mutate: JobMutation<'_>) -> QueueResult<Job>;

    /// Every job document, in no particular order.
    async fn list_jobs(&self) -> QueueResult<Vec<Job>>;

    /// Number of queued (not yet admitted) jobs.
    async fn queue_len(&self) -> QueueResult<u64>;

    /// Queued job ids, next to be admitted first.
    async fn queued_ids(&self) -> QueueResult<Vec<JobId>>;

    /// Cardinality of the active set.
    async fn active_count(&self) -> QueueResult<usize>;

    /// Membership test on the active set.
    async fn is_active(&self, job_id: &JobId) -> QueueResult<bool>;

    /// Drop the queue, the active set and every job document.
    ///
    /// Returns the number of job documents removed.
    async fn reset(&self) -> QueueResult<usize>;
}
