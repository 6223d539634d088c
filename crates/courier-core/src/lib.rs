//! Core systems for Courier.
//!
//! This crate provides the execution machinery the networking layer runs on:
//!
//! - **Executor**: the seam through which request work and callback delivery
//!   are scheduled. Any `Fn(Job)` closure is an executor.
//! - **ThreadPool**: a bounded, elastic worker pool that rejects work
//!   instead of growing without bound.
//! - **LazyThreadPool**: a pool that is only created on first use.
//! - **Logging**: `tracing` targets used across the workspace.
//!
//! # Example
//!
//! ```no_run
//! use courier_core::{Executor, LazyThreadPool};
//!
//! let pool = LazyThreadPool::default();
//! pool.execute(Box::new(|| println!("running on a worker"))).unwrap();
//! ```

mod error;
pub mod logging;
pub mod threadpool;

pub use error::{ExecuteError, Result, ThreadPoolError};
pub use threadpool::{Executor, Job, LazyThreadPool, ThreadPool, ThreadPoolConfig};
