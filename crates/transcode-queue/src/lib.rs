//! Durable FIFO job queue with an atomic concurrency gate.
//!
//! This crate provides:
//! - The `JobStore` contract: queue, active set and per-job documents
//! - A Redis store using Lua scripts for claims and document updates
//! - An in-memory store for tests and single-process deployments
//! - `JobQueue`: enqueue, admission under a cap, listing and reset

pub mod error;
pub mod memory;
pub mod queue;
pub mod redis_store;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryStore;
pub use queue::{EnqueueReceipt, JobPage, JobQueue, QueueConfig, QueueStatus, StoreBackend};
pub use redis_store::{RedisStore, MAX_UPDATE_ATTEMPTS};
pub use store::{JobMutation, JobStore};
