//! Courier - fire-and-forget HTTP requests with cancellable handles.
//!
//! This is the main umbrella crate that re-exports all public APIs.
//!
//! # Example
//!
//! ```no_run
//! use courier::{AsyncHttpClient, Outcome, QueryParams};
//!
//! let client = AsyncHttpClient::new();
//! let params = QueryParams::new().with("q", "a b");
//! let handle = client.get_with("https://api.example.com/items", None, Some(&params), |outcome: Outcome| {
//!     println!("{outcome:?}");
//! });
//!
//! // Cancel at any time; the callback then receives `Outcome::Canceled`.
//! handle.cancel();
//! ```

pub use courier_core::*;

/// Networking module.
#[cfg(feature = "networking")]
pub mod net {
    pub use courier_net::*;
}

#[cfg(feature = "networking")]
pub use courier_net::{
    AsyncHttpClient, AsyncHttpClientBuilder, Callback, Headers, HttpClientConfig, HttpMethod,
    HttpRequest, NetworkError, Outcome, QueryParams, RequestHandle, RequestId, encode_query,
};
