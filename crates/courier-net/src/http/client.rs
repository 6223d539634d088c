//! Asynchronous HTTP client.
//!
//! Requests run on a bounded worker pool and report back through a
//! [`Callback`]. Every call returns a [`RequestHandle`] immediately.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use courier_core::logging::{span_names, targets};
use courier_core::{Executor, Job, LazyThreadPool, ThreadPoolConfig};

use super::dispatch::{Callback, CallbackDispatcher, Outcome};
use super::handle::{RequestHandle, RequestState};
use super::query::{QueryParams, encode_query};
use super::request::{
    CODE_EXCEPTION, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, Headers, HttpMethod, HttpRequest,
    Timeouts,
};
use super::session::TransportSession;
use super::transport::{HttpTransport, Transport};
use crate::error::{NetworkError, Result};

/// Configuration for the HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Connect timeout, covering name resolution and the TCP and TLS
    /// handshakes. Zero disables it.
    pub connect_timeout: Duration,
    /// Upper bound for each read from the server. Zero disables it.
    pub read_timeout: Duration,
    /// Sizing of the worker pool created on first use.
    ///
    /// Ignored when an executor is supplied to the builder.
    pub pool: ThreadPoolConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            pool: ThreadPoolConfig::default(),
        }
    }
}

impl HttpClientConfig {
    fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: self.connect_timeout,
            read: self.read_timeout,
        }
    }
}

/// Builder for creating an HTTP client with custom configuration.
#[derive(Default)]
pub struct AsyncHttpClientBuilder {
    config: HttpClientConfig,
    executor: Option<Arc<dyn Executor>>,
    callback_executor: Option<Arc<dyn Executor>>,
    transport: Option<Arc<dyn Transport>>,
}

impl AsyncHttpClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the sizing of the built-in worker pool.
    pub fn pool(mut self, pool: ThreadPoolConfig) -> Self {
        self.config.pool = pool;
        self
    }

    /// Run requests on `executor` instead of the built-in pool.
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Deliver outcomes through `executor` instead of on the worker thread.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::{Arc, mpsc};
    /// use courier_core::Job;
    /// use courier_net::http::AsyncHttpClient;
    ///
    /// // Forward deliveries to a thread that owns the UI.
    /// let (tx, rx) = mpsc::channel::<Job>();
    /// let tx = std::sync::Mutex::new(tx);
    /// let client = AsyncHttpClient::builder()
    ///     .callback_executor(Arc::new(move |job: Job| {
    ///         let _ = tx.lock().unwrap().send(job);
    ///     }))
    ///     .build()
    ///     .unwrap();
    /// # drop((client, rx));
    /// ```
    pub fn callback_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.callback_executor = Some(executor);
        self
    }

    /// Use a custom transport instead of [`HttpTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the HTTP client.
    ///
    /// Fails if the pool configuration is invalid.
    pub fn build(self) -> Result<AsyncHttpClient> {
        let executor: Arc<dyn Executor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(LazyThreadPool::new(self.config.pool.clone())?),
        };
        let dispatcher = match self.callback_executor {
            Some(executor) => CallbackDispatcher::with_executor(executor),
            None => CallbackDispatcher::inline(),
        };
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));

        Ok(AsyncHttpClient {
            inner: Arc::new(ClientInner {
                config: self.config,
                executor,
                dispatcher,
                transport,
            }),
        })
    }
}

struct ClientInner {
    config: HttpClientConfig,
    executor: Arc<dyn Executor>,
    dispatcher: CallbackDispatcher,
    transport: Arc<dyn Transport>,
}

/// HTTP client that runs requests in the background.
///
/// Cheap to clone; clones share the worker pool, transport and dispatcher.
///
/// # Example
///
/// ```no_run
/// use courier_net::http::{AsyncHttpClient, Outcome, QueryParams};
///
/// let client = AsyncHttpClient::new();
/// let params = QueryParams::new().with("q", "rust");
/// let handle = client.get_with("https://api.example.com/search", None, Some(&params), |outcome: Outcome| {
///     if let Outcome::Succeeded { code, body, .. } = outcome {
///         println!("{code}: {body}");
///     }
/// });
///
/// // Changed our mind.
/// handle.cancel();
/// ```
#[derive(Clone)]
pub struct AsyncHttpClient {
    inner: Arc<ClientInner>,
}

impl Default for AsyncHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncHttpClient {
    /// Create a client with the default configuration.
    pub fn new() -> Self {
        AsyncHttpClientBuilder::new()
            .build()
            .expect("Failed to create HTTP client with default configuration")
    }

    /// Create a builder for custom configuration.
    pub fn builder() -> AsyncHttpClientBuilder {
        AsyncHttpClientBuilder::new()
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.inner.config
    }

    /// Send a GET request with the default headers.
    pub fn get(&self, url: &str, callback: impl Callback) -> RequestHandle {
        self.get_with(url, None, None, callback)
    }

    /// Send a GET request.
    ///
    /// `params` are percent-encoded into the URL's query. With `headers` set
    /// to `None` the request carries `Connection: Keep-Alive`; a map is sent
    /// as given.
    pub fn get_with(
        &self,
        url: &str,
        headers: Option<Headers>,
        params: Option<&QueryParams>,
        callback: impl Callback,
    ) -> RequestHandle {
        let request = self.request(HttpMethod::Get, encode_query(url, params), headers);
        self.execute(request, callback)
    }

    /// Send a POST request with the default headers.
    pub fn post(&self, url: &str, body: Option<Bytes>, callback: impl Callback) -> RequestHandle {
        self.post_with(url, None, body, callback)
    }

    /// Send a POST request. Headers behave as in [`get_with`](Self::get_with).
    pub fn post_with(
        &self,
        url: &str,
        headers: Option<Headers>,
        body: Option<Bytes>,
        callback: impl Callback,
    ) -> RequestHandle {
        let mut request = self.request(HttpMethod::Post, url.to_string(), headers);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.execute(request, callback)
    }

    /// Send a POST request whose body is the JSON text of `value`.
    pub fn post_json(
        &self,
        url: &str,
        headers: Option<Headers>,
        value: &serde_json::Value,
        callback: impl Callback,
    ) -> RequestHandle {
        self.post_with(url, headers, Some(Bytes::from(value.to_string())), callback)
    }

    /// Submit a prepared request.
    ///
    /// The request's own headers and timeouts are used as given.
    pub fn execute(&self, request: HttpRequest, callback: impl Callback) -> RequestHandle {
        let state = RequestState::new(Box::new(callback), self.inner.dispatcher.clone());
        let handle = RequestHandle::new(state.clone());
        tracing::debug!(
            target: targets::HTTP,
            id = %state.id(),
            method = %request.method(),
            url = request.url(),
            "Submitting request"
        );

        let transport = self.inner.transport.clone();
        let job_state = state.clone();
        let job: Job = Box::new(move || run_request(transport.as_ref(), &request, &job_state));

        if let Err(err) = self.inner.executor.execute(job) {
            tracing::warn!(target: targets::HTTP, id = %state.id(), "Request rejected: {}", err);
            state.complete(Outcome::Failed {
                code: CODE_EXCEPTION,
                status: None,
                cause: Some(NetworkError::Rejected(err.to_string())),
            });
        }
        handle
    }

    fn request(&self, method: HttpMethod, url: String, headers: Option<Headers>) -> HttpRequest {
        HttpRequest::new(method, url)
            .with_headers(headers.unwrap_or_else(default_headers))
            .with_timeouts(self.inner.config.timeouts())
    }
}

impl fmt::Debug for AsyncHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHttpClient")
            .field("config", &self.inner.config)
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

fn default_headers() -> Headers {
    Headers::from([("Connection".to_string(), "Keep-Alive".to_string())])
}

/// Worker body: one complete exchange ending in exactly one outcome.
fn run_request(transport: &dyn Transport, request: &HttpRequest, state: &RequestState) {
    let _span = tracing::debug_span!(target: targets::HTTP, span_names::REQUEST, id = %state.id()).entered();
    tracing::debug!(target: targets::HTTP, "Request started");

    if state.is_finished() {
        tracing::debug!(target: targets::HTTP, "Request canceled before start");
        state.deliver_canceled();
        return;
    }

    let mut session = TransportSession::open(transport, request.url(), request.timeouts());
    if !state.attach(session.disconnector()) {
        tracing::debug!(target: targets::HTTP, "Request canceled before start");
        session.close();
        state.deliver_canceled();
        return;
    }

    session.set_method(request.method());
    session.set_headers(request.headers());
    if let Some(body) = request.body() {
        session.write_body(body);
    }

    let outcome = if session.connect() {
        read_response(&mut session)
    } else {
        Outcome::Failed {
            code: CODE_EXCEPTION,
            status: None,
            cause: session.take_failure(),
        }
    };

    match &outcome {
        Outcome::Succeeded { code, .. } => {
            tracing::debug!(target: targets::HTTP, code, "Request succeeded");
        }
        Outcome::Failed { code, cause, .. } => {
            tracing::debug!(target: targets::HTTP, code, cause = ?cause, "Request failed");
        }
        Outcome::Canceled => {}
    }

    if !state.complete(outcome) {
        tracing::debug!(target: targets::HTTP, "Request canceled while running; result dropped");
    }
}

fn read_response(session: &mut TransportSession) -> Outcome {
    let code = session.status_code();
    let status = session.status_message();
    if code == CODE_EXCEPTION {
        return Outcome::Failed {
            code,
            status,
            cause: Some(session.take_failure().unwrap_or(NetworkError::NoStatus)),
        };
    }

    let headers = session.headers().clone();
    match session.read_body_text() {
        Ok(body) => Outcome::Succeeded {
            code,
            status,
            headers,
            body,
        },
        Err(err) => Outcome::Failed {
            code,
            status,
            cause: Some(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_millis(3000));
        assert_eq!(config.read_timeout, Duration::from_millis(5000));
        assert_eq!(config.pool, ThreadPoolConfig::default());
    }

    #[test]
    fn test_builder() {
        let client = AsyncHttpClient::builder()
            .connect_timeout(Duration::from_secs(1))
            .read_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        assert_eq!(client.config().connect_timeout, Duration::from_secs(1));
        assert_eq!(client.config().read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_builder_rejects_invalid_pool() {
        let result = AsyncHttpClient::builder()
            .pool(ThreadPoolConfig::with_threads(4, 1))
            .build();
        assert!(matches!(result, Err(NetworkError::Config(_))));
    }

    #[test]
    fn test_default_headers() {
        let client = AsyncHttpClient::new();
        let request = client.request(HttpMethod::Get, "http://h/".into(), None);
        assert_eq!(
            request.headers().get("Connection").map(String::as_str),
            Some("Keep-Alive")
        );

        let request = client.request(HttpMethod::Get, "http://h/".into(), Some(Headers::new()));
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_request_uses_configured_timeouts() {
        let client = AsyncHttpClient::builder()
            .connect_timeout(Duration::from_millis(10))
            .build()
            .unwrap();
        let request = client.request(HttpMethod::Post, "http://h/".into(), None);
        assert_eq!(request.timeouts().connect, Duration::from_millis(10));
        assert_eq!(request.timeouts().read, DEFAULT_READ_TIMEOUT);
    }
}
