//! One (job, resolution) transcode, start to terminal status.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use transcode_media::{
    FfmpegProgress, MediaError, MediaResult, ProgressCallback, TranscodeRequest, Transcoder,
};
use transcode_models::{ConversionUpdate, JobId, Resolution};

use crate::aggregator::StatusAggregator;
use crate::logging::JobLogger;
use crate::metrics;

/// Download reference stored on a completed conversion.
pub fn output_url(job_id: &JobId, resolution: &str) -> String {
    format!("/download/{}/{}", job_id, resolution)
}

/// Artifact location for one resolution of a job.
pub fn output_path(output_dir: &Path, job_id: &JobId, resolution: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.mp4", job_id, resolution))
}

/// Drives the transcoder for a single resolution and reports to the aggregator.
pub struct SubtaskRunner {
    transcoder: Arc<dyn Transcoder>,
    aggregator: StatusAggregator,
    output_dir: PathBuf,
    timeout: Option<Duration>,
}

impl SubtaskRunner {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        aggregator: StatusAggregator,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transcoder,
            aggregator,
            output_dir: output_dir.into(),
            timeout: None,
        }
    }

    /// Kill the external tool once it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run the transcode and return its terminal update.
    ///
    /// Never fails: every fault becomes a Failed update carrying the
    /// diagnostic, which is also handed to the aggregator.
    pub async fn run(&self, job_id: &JobId, input_url: &str, resolution: &str) -> ConversionUpdate {
        let logger = JobLogger::for_resolution(job_id, resolution);
        let started = Instant::now();
        logger.log_start(input_url);

        let update = match self.execute(job_id, input_url, resolution, &logger).await {
            Ok(url) => {
                logger.log_completion(&format!("{:.1}s", started.elapsed().as_secs_f64()));
                ConversionUpdate::completed(url)
            }
            Err(e) => {
                let diagnostic = e.diagnostic();
                logger.log_error(&diagnostic);
                ConversionUpdate::failed(diagnostic)
            }
        };

        self.aggregator
            .update_conversion(job_id, resolution, &update)
            .await;
        metrics::record_conversion(
            resolution,
            update.status.as_str(),
            started.elapsed().as_secs_f64(),
        );
        update
    }

    async fn execute(
        &self,
        job_id: &JobId,
        input_url: &str,
        resolution: &str,
        logger: &JobLogger,
    ) -> MediaResult<String> {
        let source = self.transcoder.resolve_source(input_url).await?;

        let target = Resolution::from_label(resolution);
        if Resolution::lookup(resolution).is_none() {
            logger.log_warning(&format!("Unknown resolution label, using {}", target));
        }

        let duration = self.transcoder.probe_duration(&source).await?;
        let native = self.transcoder.probe_dimensions(&source).await?;
        logger.log_progress(&format!(
            "Input resolution {}x{}, target {}",
            native.width, native.height, target
        ));

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = output_path(&self.output_dir, job_id, resolution);

        self.aggregator
            .update_conversion(job_id, resolution, &ConversionUpdate::processing(0.0))
            .await;

        // Progress arrives on the tool's reader; the store writes happen here
        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let on_progress: ProgressCallback = Box::new(move |progress: FfmpegProgress| {
            let _ = tx.send(progress.percentage(duration));
        });

        let request = TranscodeRequest {
            input: source,
            output: output.clone(),
            target,
            timeout: self.timeout,
        };

        let forward = async {
            let mut reported = 0.0_f64;
            while let Some(mut percent) = rx.recv().await {
                // Backlogged ticks collapse into the latest high-water mark
                while let Ok(next) = rx.try_recv() {
                    percent = percent.max(next);
                }
                if percent > reported {
                    reported = percent;
                    self.aggregator
                        .update_conversion(job_id, resolution, &ConversionUpdate::processing(percent))
                        .await;
                }
            }
        };

        let (result, ()) = tokio::join!(self.transcoder.transcode(&request, on_progress), forward);
        result?;

        let created = tokio::fs::metadata(&output)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !created {
            return Err(MediaError::transcode_failed("Output file not created", None, None));
        }

        Ok(output_url(job_id, resolution))
    }
}
