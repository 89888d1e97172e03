//! Lookup of finished artifacts for a download handler.

use std::path::{Path, PathBuf};

use transcode_models::JobId;
use transcode_queue::{JobQueue, QueueError};

use crate::error::{WorkerError, WorkerResult};
use crate::runner::output_path;

/// Path of a finished artifact.
///
/// Succeeds only when the resolution is Completed and its file exists,
/// regardless of the overall job status.
pub async fn locate_artifact(
    queue: &JobQueue,
    output_dir: &Path,
    job_id: &JobId,
    resolution: &str,
) -> WorkerResult<PathBuf> {
    let job = queue
        .get_job(job_id)
        .await?
        .ok_or_else(|| QueueError::JobNotFound(job_id.clone()))?;

    let conversion = job.conversion(resolution).ok_or_else(|| {
        WorkerError::artifact_unavailable(job_id, resolution, "resolution not requested")
    })?;
    if !conversion.is_downloadable() {
        return Err(WorkerError::artifact_unavailable(
            job_id,
            resolution,
            format!("conversion is {}", conversion.status),
        ));
    }

    let path = output_path(output_dir, job_id, resolution);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        _ => Err(WorkerError::artifact_unavailable(
            job_id,
            resolution,
            "video file not found",
        )),
    }
}

/// Suggested download name: the source file stem plus the resolution.
pub fn download_filename(input_url: &str, resolution: &str) -> String {
    let stem = Path::new(input_url)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    format!("{}_{}.mp4", stem, resolution)
}
