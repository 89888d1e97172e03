//! In-process store for single-worker deployments and tests.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use transcode_models::{Job, JobId};

use crate::error::{QueueError, QueueResult};
use crate::store::{JobMutation, JobStore};

#[derive(Debug, Default)]
struct MemoryState {
    /// Head is the next job to admit
    queue: VecDeque<JobId>,
    active: HashSet<JobId>,
    jobs: HashMap<JobId, Job>,
}

/// `JobStore` held entirely in memory behind one lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn ping(&self) -> QueueResult<()> {
        Ok(())
    }

    async fn create_and_enqueue(&self, job: &Job) -> QueueResult<u64> {
        let mut state = self.state.lock().await;
        if state.jobs.contains_key(&job.job_id) {
            return Err(QueueError::DuplicateJob(job.job_id.clone()));
        }
        state.jobs.insert(job.job_id.clone(), job.clone());
        state.queue.push_back(job.job_id.clone());
        Ok(state.queue.len() as u64)
    }

    async fn claim_next(&self, capacity: usize) -> QueueResult<Option<JobId>> {
        let mut state = self.state.lock().await;
        if state.active.len() >= capacity {
            return Ok(None);
        }
        let Some(job_id) = state.queue.pop_front() else {
            return Ok(None);
        };
        state.active.insert(job_id.clone());
        debug!("Claimed job {} ({} active)", job_id, state.active.len());
        Ok(Some(job_id))
    }

    async fn unclaim(&self, job_id: &JobId) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        if state.active.remove(job_id) {
            state.queue.push_front(job_id.clone());
        }
        Ok(())
    }

    async fn release(&self, job_id: &JobId) -> QueueResult<()> {
        self.state.lock().await.active.remove(job_id);
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        Ok(self.state.lock().await.jobs.get(job_id).cloned())
    }

    async fn update_job(&self, job_id: &JobId, mutate: JobMutation<'_>) -> QueueResult<Job> {
        let mut state = self.state.lock().await;
        let stored = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.clone()))?;

        // Mutate a copy so a rejected mutation leaves the document untouched
        let mut job = stored.clone();
        mutate(&mut job)?;
        *stored = job.clone();
        Ok(job)
    }

    async fn list_jobs(&self) -> QueueResult<Vec<Job>> {
        Ok(self.state.lock().await.jobs.values().cloned().collect())
    }

    async fn queue_len(&self) -> QueueResult<u64> {
        Ok(self.state.lock().await.queue.len() as u64)
    }

    async fn queued_ids(&self) -> QueueResult<Vec<JobId>> {
        Ok(self.state.lock().await.queue.iter().cloned().collect())
    }

    async fn active_count(&self) -> QueueResult<usize> {
        Ok(self.state.lock().await.active.len())
    }

    async fn is_active(&self, job_id: &JobId) -> QueueResult<bool> {
        Ok(self.state.lock().await.active.contains(job_id))
    }

    async fn reset(&self) -> QueueResult<usize> {
        let mut state = self.state.lock().await;
        let removed = state.jobs.len();
        *state = MemoryState::default();
        Ok(removed)
    }
}
