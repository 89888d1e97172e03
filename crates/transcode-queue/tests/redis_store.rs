//! Redis store integration tests.
//!
//! Each test works under its own key namespace so runs can share one Redis.

use std::sync::Arc;

use transcode_models::{ConversionUpdate, Job, JobId, JobStatus};
use transcode_queue::{JobQueue, JobStore, QueueConfig, QueueError, RedisStore, StoreBackend};

fn isolated_config(max_concurrent_jobs: usize) -> QueueConfig {
    dotenvy::dotenv().ok();

    let ns = uuid::Uuid::new_v4();
    QueueConfig {
        queue_key: format!("test:{ns}:job_queue"),
        active_set_key: format!("test:{ns}:active_jobs"),
        job_key_prefix: format!("test:{ns}:job:"),
        max_concurrent_jobs,
        backend: StoreBackend::Redis,
        ..QueueConfig::from_env()
    }
}

/// Test Redis connection.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    let queue = JobQueue::new(isolated_config(2)).expect("Failed to create queue");
    queue.ping().await.expect("Failed to ping Redis");
}

/// Test enqueue, duplicate rejection and FIFO admission.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_enqueue_and_admit() {
    let queue = JobQueue::new(isolated_config(2)).expect("Failed to create queue");

    queue.enqueue("j1", ["720p", "480p"], "/videos/a.mp4").await.unwrap();
    queue.enqueue("j2", ["720p"], "/videos/b.mp4").await.unwrap();
    queue.enqueue("j3", ["480p"], "/videos/c.mp4").await.unwrap();

    let err = queue.enqueue("j1", ["1080p"], "/videos/d.mp4").await.unwrap_err();
    assert!(matches!(err, QueueError::DuplicateJob(_)));

    let status = queue.status().await.unwrap();
    assert_eq!(status.queued_jobs, 3);
    assert_eq!(
        status.queue_position,
        vec![JobId::from("j1"), JobId::from("j2"), JobId::from("j3")]
    );

    let first = queue.try_admit().await.unwrap().unwrap();
    let second = queue.try_admit().await.unwrap().unwrap();
    assert_eq!(first.job_id.as_str(), "j1");
    assert_eq!(first.status, JobStatus::Pending);
    assert_eq!(second.job_id.as_str(), "j2");
    assert!(queue.try_admit().await.unwrap().is_none());

    queue.release(&first.job_id).await.unwrap();
    let third = queue.try_admit().await.unwrap().unwrap();
    assert_eq!(third.job_id.as_str(), "j3");

    assert_eq!(queue.reset().await.unwrap(), 3);
}

/// Test that sibling updates through the compare-and-set script are not lost.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_concurrent_updates_are_serialized() {
    let config = isolated_config(2);
    let store = Arc::new(RedisStore::new(&config).expect("Failed to create store"));

    let job = Job::new("cas", "/videos/a.mp4", ["720p", "480p", "360p"]);
    store.create_and_enqueue(&job).await.unwrap();

    let tasks = ["720p", "480p", "360p"].map(|label| {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for p in 1..=20 {
                store
                    .update_job(&JobId::from("cas"), &move |job: &mut Job| {
                        job.apply_update(label, &ConversionUpdate::processing(p as f64))
                    })
                    .await
                    .unwrap();
            }
        })
    });
    for task in tasks {
        task.await.unwrap();
    }

    let job = store.get_job(&JobId::from("cas")).await.unwrap().unwrap();
    for label in ["720p", "480p", "360p"] {
        assert_eq!(job.conversion(label).unwrap().progress, 20.0);
    }
    assert_eq!(job.progress, 20.0);

    store.reset().await.unwrap();
}
