//! Job queue and concurrency gate.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use transcode_models::{Job, JobId};

use crate::error::{QueueError, QueueResult};
use crate::memory::MemoryStore;
use crate::redis_store::RedisStore;
use crate::store::JobStore;

/// Which `JobStore` implementation backs the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Some(Self::Redis),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// List holding queued job ids
    pub queue_key: String,
    /// Set holding admitted, unfinished job ids
    pub active_set_key: String,
    /// Prefix of per-job document keys
    pub job_key_prefix: String,
    /// Admission cap across every worker sharing the store
    pub max_concurrent_jobs: usize,
    /// Store implementation
    pub backend: StoreBackend,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queue_key: "job_queue".to_string(),
            active_set_key: "active_jobs".to_string(),
            job_key_prefix: "job:".to_string(),
            max_concurrent_jobs: 2,
            backend: StoreBackend::Redis,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            queue_key: std::env::var("QUEUE_KEY").unwrap_or(defaults.queue_key),
            active_set_key: std::env::var("ACTIVE_SET_KEY").unwrap_or(defaults.active_set_key),
            job_key_prefix: std::env::var("JOB_KEY_PREFIX").unwrap_or(defaults.job_key_prefix),
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            backend: std::env::var("STORE_BACKEND")
                .ok()
                .and_then(|s| StoreBackend::parse(&s))
                .unwrap_or(defaults.backend),
        }
    }
}

/// Returned by a successful enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnqueueReceipt {
    pub job_id: JobId,
    /// Queue length right after the push
    pub position: u64,
}

/// One page of job documents, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    /// Number of documents in the store
    pub total: usize,
    pub jobs: Vec<Job>,
}

/// Point-in-time view of the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub active_jobs: usize,
    pub queued_jobs: u64,
    pub max_concurrent_jobs: usize,
    /// Queued ids, next to be admitted first
    pub queue_position: Vec<JobId>,
}

/// Durable FIFO queue plus the admission gate over one `JobStore`.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a queue over the backend named in `config`.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let store: Arc<dyn JobStore> = match config.backend {
            StoreBackend::Redis => Arc::new(RedisStore::new(&config)?),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(Self { store, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Create over an explicit store.
    pub fn with_store(store: Arc<dyn JobStore>, config: QueueConfig) -> Self {
        Self { store, config }
    }

    /// Self-contained queue with the given cap.
    pub fn in_memory(max_concurrent_jobs: usize) -> Self {
        let config = QueueConfig {
            max_concurrent_jobs,
            backend: StoreBackend::Memory,
            ..QueueConfig::default()
        };
        Self::with_store(Arc::new(MemoryStore::new()), config)
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.config.max_concurrent_jobs
    }

    /// Check that the store is reachable.
    pub async fn ping(&self) -> QueueResult<()> {
        self.store.ping().await
    }

    /// Create a waiting job and append it to the queue.
    pub async fn enqueue(
        &self,
        job_id: impl Into<JobId>,
        resolutions: impl IntoIterator<Item = impl Into<String>>,
        input_url: impl Into<String>,
    ) -> QueueResult<EnqueueReceipt> {
        let job = Job::new(job_id, input_url, resolutions);
        if job.conversions.is_empty() {
            return Err(QueueError::invalid_job(format!(
                "job {} requests no resolutions",
                job.job_id
            )));
        }

        let position = self.store.create_and_enqueue(&job).await?;
        info!(
            job_id = %job.job_id,
            resolutions = ?job.target_resolutions(),
            position,
            "Enqueued job"
        );

        Ok(EnqueueReceipt {
            job_id: job.job_id,
            position,
        })
    }

    /// Admit the next queued job if the cap allows.
    ///
    /// The admitted job is in the active set and its document is Pending.
    pub async fn try_admit(&self) -> QueueResult<Option<Job>> {
        loop {
            let Some(job_id) = self.store.claim_next(self.config.max_concurrent_jobs).await? else {
                return Ok(None);
            };

            match self
                .store
                .update_job(&job_id, &|job: &mut Job| {
                    job.mark_pending();
                    Ok(())
                })
                .await
            {
                Ok(job) => {
                    debug!(job_id = %job_id, "Admitted job");
                    return Ok(Some(job));
                }
                Err(QueueError::JobNotFound(_)) => {
                    // Document removed by a reset after the id was queued
                    warn!(job_id = %job_id, "Queued job has no document, skipping");
                    self.store.release(&job_id).await?;
                }
                Err(e) => {
                    if let Err(undo) = self.store.unclaim(&job_id).await {
                        warn!(job_id = %job_id, "Failed to return job to queue: {}", undo);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Remove a job from the active set.
    pub async fn release(&self, job_id: &JobId) -> QueueResult<()> {
        self.store.release(job_id).await
    }

    pub async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        self.store.get_job(job_id).await
    }

    /// Page through all jobs, newest `started_at` first.
    pub async fn list_jobs(&self, skip: usize, limit: usize) -> QueueResult<JobPage> {
        let mut jobs = self.store.list_jobs().await?;
        let total = jobs.len();
        jobs.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        let jobs = jobs.into_iter().skip(skip).take(limit).collect();
        Ok(JobPage { total, jobs })
    }

    /// Snapshot of active and queued jobs.
    pub async fn status(&self) -> QueueResult<QueueStatus> {
        let queue_position = self.store.queued_ids().await?;
        Ok(QueueStatus {
            active_jobs: self.store.active_count().await?,
            queued_jobs: queue_position.len() as u64,
            max_concurrent_jobs: self.config.max_concurrent_jobs,
            queue_position,
        })
    }

    /// Drop every queued, active and stored job.
    pub async fn reset(&self) -> QueueResult<usize> {
        let removed = self.store.reset().await?;
        warn!("Cleared {} jobs from the store", removed);
        Ok(removed)
    }
}
