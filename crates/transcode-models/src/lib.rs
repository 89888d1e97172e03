//! Shared data models for the transcode pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job documents and their per-resolution conversions
//! - The closed status enum shared by jobs and conversions
//! - The resolution label table

pub mod conversion;
pub mod job;
pub mod resolution;
pub mod status;

// Re-export common types
pub use conversion::{ConversionTask, ConversionUpdate, MAX_RUNNING_PROGRESS};
pub use job::{Job, JobError, JobId, JobRequest};
pub use resolution::{Resolution, DEFAULT_RESOLUTION};
pub use status::{ConversionStatus, JobStatus};
