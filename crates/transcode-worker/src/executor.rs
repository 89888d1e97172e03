//! Job executor.

use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use transcode_media::{MediaError, Transcoder};
use transcode_models::{ConversionStatus, ConversionUpdate, Job, JobId, JobStatus};
use transcode_queue::JobQueue;

use crate::aggregator::StatusAggregator;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, FailureTracker, RetryConfig, RetryResult};
use crate::runner::SubtaskRunner;

/// Shared by the admission loop and every job handler.
struct ExecutorContext {
    config: WorkerConfig,
    queue: JobQueue,
    aggregator: StatusAggregator,
    runner: SubtaskRunner,
    transcode_permits: Arc<Semaphore>,
}

/// Admits jobs from the queue and fans each one out into per-resolution
/// sub-tasks.
pub struct JobExecutor {
    ctx: Arc<ExecutorContext>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, transcoder: Arc<dyn Transcoder>) -> Self {
        let aggregator = StatusAggregator::new(Arc::clone(queue.store()));
        let runner = SubtaskRunner::new(transcoder, aggregator.clone(), config.output_dir.clone())
            .with_timeout(config.subtask_timeout);
        let transcode_permits = Arc::new(Semaphore::new(config.max_transcodes.max(1)));
        let (shutdown, _) = watch::channel(false);

        Self {
            ctx: Arc::new(ExecutorContext {
                config,
                queue,
                aggregator,
                runner,
                transcode_permits,
            }),
            shutdown,
        }
    }

    /// Run the admission loop until `shutdown` is called.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor with {} max concurrent jobs, {} transcode slots",
            self.ctx.queue.max_concurrent_jobs(),
            self.ctx.config.max_transcodes
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut jobs = JoinSet::new();
        let mut admission_failures = FailureTracker::new(3);

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }

            while let Some(finished) = jobs.try_join_next() {
                if let Err(e) = finished {
                    error!("Job handler aborted: {}", e);
                }
            }
            metrics::set_active_jobs(jobs.len());

            let admitted = match self.ctx.queue.try_admit().await {
                Ok(admitted) => {
                    admission_failures.record_success();
                    admitted
                }
                Err(e) => {
                    if admission_failures.record_failure() {
                        warn!("Failed to admit job: {}", e);
                    }
                    None
                }
            };

            match admitted {
                Some(job) => {
                    metrics::record_job_admitted();
                    let ctx = Arc::clone(&self.ctx);
                    jobs.spawn(async move { ctx.handle_job(job).await });
                }
                None => {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {}
                        _ = tokio::time::sleep(self.ctx.config.poll_interval) => {}
                    }
                }
            }
        }

        info!("Waiting for {} in-flight jobs to complete...", jobs.len());
        let drained = tokio::time::timeout(self.ctx.config.shutdown_timeout, async {
            while jobs.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                "{} jobs still running after {:?}, abandoning them",
                jobs.len(),
                self.ctx.config.shutdown_timeout
            );
            jobs.shutdown().await;
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl ExecutorContext {
    /// Process one admitted job and always release its active slot.
    async fn handle_job(self: Arc<Self>, job: Job) {
        let job_id = job.job_id.clone();
        let logger = JobLogger::new(&job_id);
        logger.log_start(&format!("{} resolutions", job.target_resolutions().len()));

        // A fault in the job task itself lands here instead of unwinding
        let processing = tokio::spawn(Arc::clone(&self).process_job(job));
        let final_job = match processing.await {
            Ok(final_job) => final_job,
            Err(e) => {
                let fault = join_error_message(e);
                logger.log_error(&fault);
                self.aggregator
                    .finalize(&job_id, JobStatus::Failed, Utc::now(), Some(fault))
                    .await
            }
        };

        match final_job.as_ref().map(|job| job.status) {
            Some(JobStatus::Completed) => {
                metrics::record_job_completed();
                logger.log_completion("completed");
            }
            Some(status) => {
                metrics::record_job_failed();
                logger.log_completion(status.as_str());
            }
            None => {
                metrics::record_job_failed();
                logger.log_warning("Final status was not persisted");
            }
        }

        self.release(&job_id).await;
    }

    /// Fan out, wait for every sub-task, then write the terminal status.
    async fn process_job(self: Arc<Self>, job: Job) -> Option<Job> {
        let job_id = job.job_id.clone();
        self.aggregator.set_processing(&job_id).await;

        let resolutions = job.target_resolutions().to_vec();
        let handles = resolutions.iter().map(|resolution| {
            let ctx = Arc::clone(&self);
            let job_id = job_id.clone();
            let input_url = job.input_url().to_string();
            let label = resolution.clone();
            tokio::spawn(async move { ctx.run_subtask(&job_id, &input_url, &label).await })
        });
        let results = join_all(handles).await;

        let outcomes: Vec<(String, ConversionUpdate)> = resolutions
            .into_iter()
            .zip(results)
            .map(|(resolution, result)| {
                let update = result.unwrap_or_else(|e| {
                    let update = ConversionUpdate::failed(join_error_message(e));
                    JobLogger::for_resolution(&job_id, &resolution)
                        .log_error(update.error.as_deref().unwrap_or_default());
                    update
                });
                (resolution, update)
            })
            .collect();

        // Re-apply the final outcomes so a dropped runner write is repaired
        for (resolution, update) in &outcomes {
            self.aggregator
                .update_conversion(&job_id, resolution, update)
                .await;
        }

        let status = job_outcome(outcomes.iter().map(|(_, update)| update.status));
        self.aggregator
            .finalize(&job_id, status, Utc::now(), None)
            .await
    }

    /// One resolution: wait for a transcode slot, then run under the ceiling.
    async fn run_subtask(
        &self,
        job_id: &JobId,
        input_url: &str,
        resolution: &str,
    ) -> ConversionUpdate {
        let _permit = match Arc::clone(&self.transcode_permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                let update = ConversionUpdate::failed("Transcode pool closed");
                self.aggregator
                    .update_conversion(job_id, resolution, &update)
                    .await;
                return update;
            }
        };

        let ceiling = self.config.subtask_timeout;
        let run = self.runner.run(job_id, input_url, resolution);
        match tokio::time::timeout(ceiling, run).await {
            Ok(update) => update,
            Err(_) => {
                // Dropping the runner future kills the tool's process group
                let diagnostic = MediaError::Timeout(ceiling.as_secs()).to_string();
                let update = ConversionUpdate::failed(diagnostic);
                JobLogger::for_resolution(job_id, resolution)
                    .log_error(update.error.as_deref().unwrap_or_default());
                self.aggregator
                    .update_conversion(job_id, resolution, &update)
                    .await;
                metrics::record_conversion(
                    resolution,
                    ConversionStatus::Failed.as_str(),
                    ceiling.as_secs_f64(),
                );
                update
            }
        }
    }

    async fn release(&self, job_id: &JobId) {
        let retry = RetryConfig::new(format!("release job {}", job_id))
            .with_max_attempts(self.config.startup_retries)
            .with_delay(self.config.startup_retry_delay);

        match retry_async(&retry, || self.queue.release(job_id)).await {
            RetryResult::Success(()) => debug!(job_id = %job_id, "Released job"),
            RetryResult::Failed { error, attempts } => error!(
                job_id = %job_id,
                "Failed to release job after {} attempts: {}", attempts, error
            ),
        }
    }
}

/// Completed iff every sub-task completed.
fn job_outcome(statuses: impl IntoIterator<Item = ConversionStatus>) -> JobStatus {
    if statuses
        .into_iter()
        .all(|status| status == ConversionStatus::Completed)
    {
        JobStatus::Completed
    } else {
        JobStatus::Failed
    }
}

/// Diagnostic text for a task that panicked or was cancelled.
fn join_error_message(e: JoinError) -> String {
    if e.is_panic() {
        format!("Task panicked: {}", panic_message(e.into_panic()))
    } else {
        "Task was cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
