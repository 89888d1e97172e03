//! Transcoding worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use transcode_media::{check_ffmpeg, check_ffprobe, FfmpegTranscoder};
use transcode_queue::JobQueue;
use transcode_worker::{metrics, retry_async, JobExecutor, RetryConfig, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting transcode-worker");

    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid METRICS_ADDR {addr}"))?;
        metrics::install_exporter(addr).context("failed to install Prometheus exporter")?;
        info!("Prometheus metrics listening on {}", addr);
    }

    check_ffmpeg().context("ffmpeg is required")?;
    check_ffprobe().context("ffprobe is required")?;

    let queue = JobQueue::from_env().context("failed to create job queue")?;

    let retry = RetryConfig::new("store connect")
        .with_max_attempts(config.startup_retries)
        .with_delay(config.startup_retry_delay);
    retry_async(&retry, || queue.ping())
        .await
        .into_result()
        .with_context(|| {
            format!(
                "could not reach the job store after {} attempts",
                retry.max_attempts
            )
        })?;
    info!("Connected to job store");

    let executor = Arc::new(JobExecutor::new(
        config,
        queue,
        Arc::new(FfmpegTranscoder::new()),
    ));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    executor.run().await?;
    Ok(())
}
