//! The connection seam driven by [`TransportSession`](super::TransportSession).
//!
//! A [`Transport`] turns a URL into a [`Connection`]; the connection exposes
//! the small set of blocking operations one request needs. [`HttpTransport`]
//! is the built-in implementation; tests and embedders can supply their own.

mod client;
mod disconnect;

use std::io::{self, Read};

pub use client::HttpTransport;
pub use disconnect::Disconnector;

use super::request::{HttpMethod, Timeouts};
use crate::error::Result;

/// Raw response header fields in arrival order.
///
/// The status line is stored under the `None` key. Every other entry carries
/// all values received for that field name.
pub type HeaderFields = Vec<(Option<String>, Vec<String>)>;

/// Opens connections for request URLs.
pub trait Transport: Send + Sync {
    /// Prepare a connection to `url`.
    ///
    /// No network I/O is required here; failures are limited to what can be
    /// decided up front (malformed URL, unsupported scheme, TLS setup).
    fn open(&self, url: &str, timeouts: Timeouts) -> Result<Box<dyn Connection>>;
}

/// One request/response exchange over a single connection.
///
/// Calls arrive in order: method and headers, optionally a body, `connect`,
/// then any mix of the response accessors.
pub trait Connection: Send {
    /// Set the request method.
    fn set_method(&mut self, method: HttpMethod);

    /// Add a request header.
    ///
    /// Fails with [`NetworkError::InvalidHeader`](crate::NetworkError::InvalidHeader)
    /// if the name or value is not valid in an HTTP header, for example a
    /// value containing a line break.
    fn add_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Send the request with `body` as its payload.
    fn write_body(&mut self, body: &[u8]) -> io::Result<()>;

    /// Establish the connection and send the request if the body path has
    /// not already done so. Fails with any earlier write error.
    fn connect(&mut self) -> io::Result<()>;

    /// Status code from a well-formed status line, or `-1` if the line
    /// cannot be parsed.
    ///
    /// Connects first if [`connect`](Self::connect) has not been called.
    fn response_code(&mut self) -> io::Result<i32>;

    /// Reason phrase from a well-formed status line.
    fn response_message(&mut self) -> io::Result<Option<String>>;

    /// Raw header fields, status line included.
    fn header_fields(&mut self) -> io::Result<HeaderFields>;

    /// The response body stream.
    fn body(&mut self) -> io::Result<Box<dyn Read + '_>>;

    /// A handle that aborts this connection from another thread.
    fn disconnector(&self) -> Disconnector;
}
