//! Asynchronous HTTP requests for Courier.
//!
//! [`AsyncHttpClient`] runs each request on a bounded worker pool and
//! reports the result to a [`Callback`] exactly once: succeeded, failed or
//! canceled. The caller gets a [`RequestHandle`] back immediately and can
//! cancel through it at any time.
//!
//! # Example
//!
//! ```no_run
//! use courier_net::http::{AsyncHttpClient, Outcome, QueryParams};
//!
//! let client = AsyncHttpClient::new();
//!
//! // GET with query parameters
//! let params = QueryParams::new().with("q", "a b");
//! client.get_with("https://api.example.com/items", None, Some(&params), |outcome: Outcome| {
//!     match outcome {
//!         Outcome::Succeeded { code, status, body, .. } => {
//!             println!("{code} {status:?}: {body}");
//!         }
//!         Outcome::Failed { code, cause, .. } => eprintln!("failed with {code}: {cause:?}"),
//!         Outcome::Canceled => println!("canceled"),
//!     }
//! });
//!
//! // POST with a JSON body
//! let handle = client.post_json(
//!     "https://api.example.com/items",
//!     None,
//!     &serde_json::json!({"name": "John"}),
//!     |_outcome: Outcome| {},
//! );
//! handle.cancel();
//! ```
//!
//! # Status Resolution
//!
//! A [`Connection`] may be unable to report the status through its direct
//! accessors. [`TransportSession`] then falls back to parsing the raw status
//! line from the header fields, so a line such as `HTTP/2 200 OK` still
//! resolves to `200`.

mod client;
mod dispatch;
mod handle;
mod query;
mod request;
mod session;
pub mod transport;

pub use client::{AsyncHttpClient, AsyncHttpClientBuilder, HttpClientConfig};
pub use dispatch::{Callback, CallbackDispatcher, Outcome};
pub use handle::{RequestHandle, RequestId};
pub use query::{QueryParams, encode_query};
pub use request::{
    CODE_EXCEPTION, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, Headers, HttpMethod, HttpRequest,
    METHOD_GET, METHOD_POST, Timeouts,
};
pub use session::TransportSession;
pub use transport::{Connection, Disconnector, HeaderFields, HttpTransport, Transport};
