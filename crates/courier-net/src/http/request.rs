//! HTTP request types.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use super::query::{QueryParams, encode_query};

/// Status code reported when no HTTP status could be obtained.
pub const CODE_EXCEPTION: i32 = -1;

/// Method name for `GET` requests.
pub const METHOD_GET: &str = "GET";
/// Method name for `POST` requests.
pub const METHOD_POST: &str = "POST";

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(3000);
/// Default socket read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5000);

/// Request and response header map.
pub type Headers = HashMap<String, String>;

/// HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    /// GET method.
    #[default]
    Get,
    /// POST method.
    Post,
}

impl HttpMethod {
    /// Get the method name as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => METHOD_GET,
            Self::Post => METHOD_POST,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connect and read timeouts for one request.
///
/// A zero duration means no timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeouts {
    /// Upper bound for establishing the TCP connection.
    pub connect: Duration,
    /// Upper bound for each socket read or write.
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// An HTTP request ready to be executed by an
/// [`AsyncHttpClient`](super::AsyncHttpClient).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: HttpMethod,
    url: String,
    headers: Headers,
    body: Option<Bytes>,
    timeouts: Timeouts,
}

impl HttpRequest {
    /// Create a request with no headers and the default timeouts.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            timeouts: Timeouts::default(),
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Create a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add several headers.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Append query parameters to the URL.
    pub fn with_query(mut self, params: &QueryParams) -> Self {
        self.url = encode_query(&self.url, Some(params));
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the connect and read timeouts.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Get the method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Get the target URL, query included.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get the body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Get the timeouts.
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::post("http://example.com/submit")
            .with_header("Content-Type", "application/json")
            .with_query(&QueryParams::new().with("v", "2"))
            .with_body(r#"{"a":1}"#);

        assert_eq!(request.method(), HttpMethod::Post);
        assert_eq!(request.url(), "http://example.com/submit?v=2");
        assert_eq!(
            request.headers().get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.body().map(|b| b.as_ref()), Some(&br#"{"a":1}"#[..]));
        assert_eq!(request.timeouts(), Timeouts::default());
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(3));
        assert_eq!(timeouts.read, Duration::from_secs(5));
    }
}
