//! Networking module for Courier.
//!
//! This crate provides a small asynchronous HTTP client for applications
//! that want fire-and-forget requests with callbacks:
//!
//! - **Query encoding**: percent-encoded parameters appended to a URL
//! - **Worker pool**: requests run on a bounded, lazily created pool
//! - **Cancellation**: every request returns a handle that can abort it
//! - **Callback delivery**: outcomes arrive inline or through an executor
//!   of your choice
//!
//! # HTTP Client
//!
//! ```no_run
//! use courier_net::{AsyncHttpClient, Outcome};
//!
//! let client = AsyncHttpClient::new();
//! let handle = client.get("https://api.example.com/data", |outcome: Outcome| {
//!     if let Outcome::Succeeded { code, body, .. } = outcome {
//!         println!("{code}: {body}");
//!     }
//! });
//! # let _ = handle;
//! ```
//!
//! ## Configuration
//!
//! ```no_run
//! use std::time::Duration;
//! use courier_core::ThreadPoolConfig;
//! use courier_net::AsyncHttpClient;
//!
//! let client = AsyncHttpClient::builder()
//!     .connect_timeout(Duration::from_secs(1))
//!     .read_timeout(Duration::from_secs(10))
//!     .pool(ThreadPoolConfig::with_threads(2, 8))
//!     .build()?;
//! # Ok::<(), courier_net::NetworkError>(())
//! ```
//!
//! ## Callback Delivery
//!
//! By default callbacks run on the worker thread that finished the request
//! (or on the thread that canceled it). Supply a callback executor to move
//! delivery elsewhere, for example onto an application's event loop.
//!
//! # Logging
//!
//! Events are emitted with `tracing` under the `courier_net::http` and
//! `courier_net::transport` targets.

mod error;
pub mod http;

pub use error::{NetworkError, Result};

// Re-export commonly used types at the crate root
pub use http::{
    AsyncHttpClient, AsyncHttpClientBuilder, Callback, Headers, HttpClientConfig, HttpMethod,
    HttpRequest, Outcome, QueryParams, RequestHandle, RequestId, encode_query,
};
