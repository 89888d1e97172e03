//! Shared job status, written by many sub-tasks at once.
//!
//! Every write goes through `JobStore::update_job`, so sibling resolutions of
//! one job never overwrite each other. A write the store cannot take is
//! logged and dropped; the persisted document may then lag the runner.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use transcode_models::{ConversionUpdate, Job, JobId, JobStatus};
use transcode_queue::{JobMutation, JobStore, QueueError};

use crate::metrics;

/// Applies partial status updates to job documents.
#[derive(Clone)]
pub struct StatusAggregator {
    store: Arc<dyn JobStore>,
}

impl StatusAggregator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Splice one resolution's update and refresh overall progress.
    ///
    /// Returns `false` when the update was dropped.
    pub async fn update_conversion(
        &self,
        job_id: &JobId,
        resolution: &str,
        update: &ConversionUpdate,
    ) -> bool {
        let applied = self
            .apply(job_id, "update_conversion", &|job: &mut Job| {
                job.apply_update(resolution, update)
            })
            .await;

        if let Some(job) = &applied {
            debug!(
                job_id = %job_id,
                resolution,
                status = %update.status,
                progress = job.progress,
                "Updated conversion status"
            );
        }
        applied.is_some()
    }

    /// Mark an admitted job as running.
    pub async fn set_processing(&self, job_id: &JobId) -> bool {
        self.apply(job_id, "set_processing", &|job: &mut Job| {
            job.mark_processing();
            Ok(())
        })
        .await
        .is_some()
    }

    /// Write the terminal status, completion time and optional job-level fault.
    ///
    /// Returns the final document, or `None` when the write was dropped.
    pub async fn finalize(
        &self,
        job_id: &JobId,
        status: JobStatus,
        completed_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Option<Job> {
        self.apply(job_id, "finalize", &|job: &mut Job| {
            job.finalize(status, completed_at, error.clone())
        })
        .await
    }

    async fn apply(
        &self,
        job_id: &JobId,
        operation: &'static str,
        mutate: JobMutation<'_>,
    ) -> Option<Job> {
        match self.store.update_job(job_id, mutate).await {
            Ok(job) => Some(job),
            Err(e) => {
                if e.is_store_unavailable() {
                    warn!(
                        job_id = %job_id,
                        operation,
                        "Store unavailable, dropping status update: {}", e
                    );
                } else if matches!(e, QueueError::JobNotFound(_)) {
                    warn!(job_id = %job_id, operation, "Job document is gone, dropping status update");
                } else {
                    warn!(job_id = %job_id, operation, "Status update rejected: {}", e);
                }
                metrics::record_status_update_dropped(operation);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcode_models::ConversionStatus;
    use transcode_queue::MemoryStore;

    async fn setup(resolutions: &[&str]) -> (StatusAggregator, Arc<MemoryStore>, JobId) {
        let store = Arc::new(MemoryStore::new());
        let job = Job::new("j1", "/videos/in.mp4", resolutions.iter().copied());
        store.create_and_enqueue(&job).await.unwrap();
        (StatusAggregator::new(store.clone()), store, job.job_id)
    }

    #[tokio::test]
    async fn test_update_recomputes_mean_progress() {
        let (aggregator, store, job_id) = setup(&["720p", "480p"]).await;

        assert!(
            aggregator
                .update_conversion(&job_id, "720p", &ConversionUpdate::processing(40.0))
                .await
        );
        assert!(
            aggregator
                .update_conversion(&job_id, "480p", &ConversionUpdate::completed("/download/j1/480p"))
                .await
        );

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.conversion("720p").unwrap().status, ConversionStatus::Processing);
        assert_eq!(job.progress, 70.0);
    }

    #[tokio::test]
    async fn test_unknown_resolution_is_dropped() {
        let (aggregator, store, job_id) = setup(&["720p"]).await;

        let applied = aggregator
            .update_conversion(&job_id, "4K", &ConversionUpdate::processing(10.0))
            .await;
        assert!(!applied);

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.conversions.len(), 1);
        assert!(job.conversion("4K").is_none());
    }

    #[tokio::test]
    async fn test_missing_job_is_dropped() {
        let (aggregator, _store, _job_id) = setup(&["720p"]).await;
        assert!(!aggregator.set_processing(&JobId::from("nope")).await);
    }

    #[tokio::test]
    async fn test_finalize_sets_terminal_fields() {
        let (aggregator, _store, job_id) = setup(&["720p"]).await;
        aggregator.set_processing(&job_id).await;

        let at = Utc::now();
        let job = aggregator
            .finalize(&job_id, JobStatus::Failed, at, Some("worker fault".into()))
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.completed_at, Some(at));
        assert_eq!(job.error.as_deref(), Some("worker fault"));
    }

    #[tokio::test]
    async fn test_concurrent_siblings_keep_both_updates() {
        let (aggregator, store, job_id) = setup(&["720p", "480p", "360p"]).await;

        let writers = ["720p", "480p", "360p"].map(|label| {
            let aggregator = aggregator.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                for p in 1..=30 {
                    aggregator
                        .update_conversion(&job_id, label, &ConversionUpdate::processing(p as f64))
                        .await;
                }
                aggregator
                    .update_conversion(&job_id, label, &ConversionUpdate::completed("/out"))
                    .await;
            })
        });
        for writer in writers {
            writer.await.unwrap();
        }

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert!(job.conversions.values().all(|c| c.progress == 100.0));
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.outcome(), Some(JobStatus::Completed));
    }
}
