//! Redis-backed job store.
//!
//! Layout:
//! - `job_queue`: list, new ids pushed on the left, admitted from the right
//! - `active_jobs`: set of admitted, unfinished job ids
//! - `job:<id>`: JSON job document
//!
//! Every multi-key step runs as a Lua script so that several workers sharing
//! one Redis instance observe a single order of claims and updates.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::{debug, info, warn};
use transcode_models::{Job, JobId};

use crate::error::{QueueError, QueueResult};
use crate::queue::QueueConfig;
use crate::store::{JobMutation, JobStore};

/// Attempts before a contended document update gives up.
pub const MAX_UPDATE_ATTEMPTS: u32 = 16;

const CREATE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return -1
end
redis.call('SET', KEYS[1], ARGV[1])
return redis.call('LPUSH', KEYS[2], ARGV[2])
"#;

const CLAIM_SCRIPT: &str = r#"
if redis.call('SCARD', KEYS[2]) >= tonumber(ARGV[1]) then
    return false
end
local id = redis.call('RPOP', KEYS[1])
if not id then
    return false
end
redis.call('SADD', KEYS[2], id)
return id
"#;

const UNCLAIM_SCRIPT: &str = r#"
if redis.call('SREM', KEYS[2], ARGV[1]) == 1 then
    redis.call('RPUSH', KEYS[1], ARGV[1])
    return 1
end
return 0
"#;

const COMPARE_AND_SET_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

/// `JobStore` over a shared Redis instance.
pub struct RedisStore {
    client: redis::Client,
    queue_key: String,
    active_set_key: String,
    job_key_prefix: String,
    create_script: Script,
    claim_script: Script,
    unclaim_script: Script,
    cas_script: Script,
}

impl RedisStore {
    /// Open a client for the configured URL. No connection is made yet.
    pub fn new(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            queue_key: config.queue_key.clone(),
            active_set_key: config.active_set_key.clone(),
            job_key_prefix: config.job_key_prefix.clone(),
            create_script: Script::new(CREATE_SCRIPT),
            claim_script: Script::new(CLAIM_SCRIPT),
            unclaim_script: Script::new(UNCLAIM_SCRIPT),
            cas_script: Script::new(COMPARE_AND_SET_SCRIPT),
        })
    }

    fn job_key(&self, job_id: &JobId) -> String {
        format!("{}{}", self.job_key_prefix, job_id)
    }

    async fn connection(&self) -> QueueResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn job_keys(&self, conn: &mut MultiplexedConnection) -> QueueResult<Vec<String>> {
        let pattern = format!("{}*", self.job_key_prefix);
        let keys: Vec<String> = redis::cmd("KEYS").arg(&pattern).query_async(conn).await?;
        Ok(keys)
    }
}

#[async_trait]
impl JobStore for RedisStore {
    async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn create_and_enqueue(&self, job: &Job) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(job)?;

        let length: i64 = self
            .create_script
            .key(self.job_key(&job.job_id))
            .key(&self.queue_key)
            .arg(&payload)
            .arg(job.job_id.as_str())
            .invoke_async(&mut conn)
            .await?;

        if length < 0 {
            warn!("Duplicate job rejected: {}", job.job_id);
            return Err(QueueError::DuplicateJob(job.job_id.clone()));
        }

        debug!("Stored job {} (queue length {})", job.job_id, length);
        Ok(length as u64)
    }

    async fn claim_next(&self, capacity: usize) -> QueueResult<Option<JobId>> {
        let mut conn = self.connection().await?;
        let claimed: Option<String> = self
            .claim_script
            .key(&self.queue_key)
            .key(&self.active_set_key)
            .arg(capacity)
            .invoke_async(&mut conn)
            .await?;
        Ok(claimed.map(JobId::from))
    }

    async fn unclaim(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let _returned: i32 = self
            .unclaim_script
            .key(&self.queue_key)
            .key(&self.active_set_key)
            .arg(job_id.as_str())
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn release(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        conn.srem::<_, _, ()>(&self.active_set_key, job_id.as_str())
            .await?;
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<Job>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.job_key(job_id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(QueueError::from))
            .transpose()
    }

    async fn update_job(&self, job_id: &JobId, mutate: JobMutation<'_>) -> QueueResult<Job> {
        let key = self.job_key(job_id);
        let mut conn = self.connection().await?;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current: Option<String> = conn.get(&key).await?;
            let current = current.ok_or_else(|| QueueError::JobNotFound(job_id.clone()))?;

            let mut job: Job = serde_json::from_str(&current)?;
            mutate(&mut job)?;
            let next = serde_json::to_string(&job)?;

            let swapped: i32 = self
                .cas_script
                .key(&key)
                .arg(&current)
                .arg(&next)
                .invoke_async(&mut conn)
                .await?;
            if swapped == 1 {
                return Ok(job);
            }

            debug!(
                job_id = %job_id,
                attempt,
                "Job document changed underneath update, retrying"
            );
        }

        Err(QueueError::UpdateConflict {
            job_id: job_id.clone(),
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }

    async fn list_jobs(&self) -> QueueResult<Vec<Job>> {
        let mut conn = self.connection().await?;
        let keys = self.job_keys(&mut conn).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let payloads: Vec<Option<String>> =
            redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut jobs = Vec::with_capacity(payloads.len());
        for (key, payload) in keys.iter().zip(payloads) {
            let Some(payload) = payload else { continue };
            match serde_json::from_str::<Job>(&payload) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("Skipping unreadable job document {}: {}", key, e),
            }
        }
        Ok(jobs)
    }

    async fn queue_len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.llen(&self.queue_key).await?;
        Ok(len)
    }

    async fn queued_ids(&self) -> QueueResult<Vec<JobId>> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn.lrange(&self.queue_key, 0, -1).await?;
        // Admission pops from the right, so the head is the last element
        Ok(ids.into_iter().rev().map(JobId::from).collect())
    }

    async fn active_count(&self) -> QueueResult<usize> {
        let mut conn = self.connection().await?;
        let count: usize = conn.scard(&self.active_set_key).await?;
        Ok(count)
    }

    async fn is_active(&self, job_id: &JobId) -> QueueResult<bool> {
        let mut conn = self.connection().await?;
        let member: bool = conn
            .sismember(&self.active_set_key, job_id.as_str())
            .await?;
        Ok(member)
    }

    async fn reset(&self) -> QueueResult<usize> {
        let mut conn = self.connection().await?;
        let keys = self.job_keys(&mut conn).await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(&self.queue_key)
            .ignore()
            .del(&self.active_set_key)
            .ignore();
        if !keys.is_empty() {
            pipe.del(&keys).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;

        info!("Reset store: removed {} job documents", keys.len());
        Ok(keys.len())
    }
}
