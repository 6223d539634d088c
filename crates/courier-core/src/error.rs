//! Error types for Courier core.

use std::fmt;

use crate::threadpool::Job;

/// Errors raised while configuring a thread pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThreadPoolError {
    /// The configuration cannot describe a working pool.
    #[error("Invalid thread pool configuration: {0}")]
    InvalidConfig(String),
}

/// A job that an [`Executor`](crate::Executor) refused to run.
///
/// The rejected job is handed back so the caller can decide what to do with
/// it (run it inline, report a failure, drop it).
#[derive(thiserror::Error)]
pub enum ExecuteError {
    /// Every worker is busy and the queue is at capacity.
    #[error("Executor is saturated: all workers are busy and the queue is full")]
    Saturated(Job),
    /// The executor no longer accepts work.
    #[error("Executor has been shut down")]
    ShutDown(Job),
}

impl ExecuteError {
    /// Take back the rejected job.
    pub fn into_job(self) -> Job {
        match self {
            Self::Saturated(job) | Self::ShutDown(job) => job,
        }
    }

    /// Check if the rejection was caused by saturation.
    pub fn is_saturated(&self) -> bool {
        matches!(self, Self::Saturated(_))
    }
}

impl fmt::Debug for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saturated(_) => f.write_str("Saturated(..)"),
            Self::ShutDown(_) => f.write_str("ShutDown(..)"),
        }
    }
}

/// A specialized Result type for thread pool configuration.
pub type Result<T> = std::result::Result<T, ThreadPoolError>;
