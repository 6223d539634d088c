//! The default transport, backed by `reqwest`.
//!
//! Connections are driven to completion on a small shared tokio runtime
//! while the calling worker thread blocks. Every await races the
//! connection's cancel channel, so a disconnect interrupts name
//! resolution, connecting, waiting for the response head and reading the
//! body alike.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::sync::OnceLock;

use bytes::Bytes;
use courier_core::logging::targets;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use url::Url;

use super::{Connection, Disconnector, HeaderFields, Transport};
use crate::error::{NetworkError, Result};
use crate::http::request::{HttpMethod, Timeouts};

/// The runtime every [`HttpTransport`] connection runs on.
///
/// Built on first use and kept for the life of the process.
fn runtime() -> io::Result<&'static Runtime> {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    if let Some(runtime) = RUNTIME.get() {
        return Ok(runtime);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("courier-io")
        .enable_all()
        .build()?;
    Ok(RUNTIME.get_or_init(|| runtime))
}

/// The default [`Transport`] for `http` and `https` URLs.
///
/// One `reqwest::Client` is kept per distinct [`Timeouts`] value, sharing
/// its TLS setup and resolver across requests. Connections are not kept
/// idle for reuse: every request opens its own. The connect timeout bounds
/// name resolution as well as the TCP and TLS handshakes.
///
/// Connections block the calling thread on an internal runtime and must
/// not be driven from inside an async task.
#[derive(Default)]
pub struct HttpTransport {
    clients: Mutex<HashMap<Timeouts, reqwest::Client>>,
}

impl HttpTransport {
    /// Create a new transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, timeouts: Timeouts) -> Result<reqwest::Client> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&timeouts) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(0);
        if !timeouts.connect.is_zero() {
            builder = builder.connect_timeout(timeouts.connect);
        }
        if !timeouts.read.is_zero() {
            builder = builder.read_timeout(timeouts.read);
        }
        let client = builder.build()?;

        tracing::trace!(target: targets::TRANSPORT, ?timeouts, "Built HTTP client");
        clients.insert(timeouts, client.clone());
        Ok(client)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("clients", &self.clients.lock().len())
            .finish()
    }
}

impl Transport for HttpTransport {
    fn open(&self, url: &str, timeouts: Timeouts) -> Result<Box<dyn Connection>> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NetworkError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(NetworkError::InvalidUrl(format!("missing host in {}", url)));
        }

        let runtime = runtime()?;
        let client = self.client(timeouts)?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let disconnector = Disconnector::new();
        disconnector.arm(move || {
            let _ = cancel_tx.send(());
        });

        Ok(Box::new(HttpConnection {
            client,
            runtime,
            url,
            method: HttpMethod::Get,
            headers: HeaderMap::new(),
            body: None,
            response: None,
            failure: None,
            cancel: cancel_rx,
            disconnector,
        }))
    }
}

struct HttpConnection {
    client: reqwest::Client,
    runtime: &'static Runtime,
    url: Url,
    method: HttpMethod,
    headers: HeaderMap,
    body: Option<Bytes>,
    response: Option<reqwest::Response>,
    /// First failure; every later operation reports it again.
    failure: Option<(io::ErrorKind, String)>,
    /// Completes when the disconnector fires. Never polled after that.
    cancel: oneshot::Receiver<()>,
    disconnector: Disconnector,
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "connection was disconnected")
}

fn io_error(err: reqwest::Error) -> io::Error {
    let kind = if err.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, err)
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
    }
}

impl HttpConnection {
    fn check_failed(&self) -> io::Result<()> {
        match &self.failure {
            Some((kind, message)) => Err(io::Error::new(*kind, message.clone())),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: io::Error) -> io::Error {
        if self.failure.is_none() {
            self.failure = Some((err.kind(), err.to_string()));
        }
        err
    }

    fn send(&mut self) -> io::Result<()> {
        if self.disconnector.is_disconnected() {
            return Err(aborted());
        }

        let mut request = self
            .client
            .request(method(self.method), self.url.clone())
            .headers(self.headers.clone());
        if let Some(body) = self.body.clone() {
            request = request.body(body);
        }

        let pending = request.send();
        let cancel = &mut self.cancel;
        let result = self.runtime.block_on(async {
            tokio::select! {
                response = pending => Some(response),
                _ = cancel => None,
            }
        });

        match result {
            Some(Ok(response)) => {
                tracing::trace!(
                    target: targets::TRANSPORT,
                    url = %self.url,
                    status = response.status().as_u16(),
                    "Response head received"
                );
                self.response = Some(response);
                Ok(())
            }
            Some(Err(err)) => Err(io_error(err)),
            None => Err(aborted()),
        }
    }

    fn response(&mut self) -> io::Result<&reqwest::Response> {
        if self.response.is_none() {
            self.connect()?;
        }
        self.check_failed()?;
        self.response.as_ref().ok_or_else(aborted)
    }
}

impl Connection for HttpConnection {
    fn set_method(&mut self, method: HttpMethod) {
        self.method = method;
    }

    fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        // Both are derived from the URL and the body.
        if name == header::HOST || name == header::CONTENT_LENGTH {
            return Ok(());
        }
        self.headers.append(name, value);
        Ok(())
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.check_failed()?;
        self.body = Some(Bytes::copy_from_slice(body));
        Ok(())
    }

    fn connect(&mut self) -> io::Result<()> {
        self.check_failed()?;
        if self.response.is_some() {
            return Ok(());
        }
        self.send().map_err(|err| self.fail(err))
    }

    fn response_code(&mut self) -> io::Result<i32> {
        Ok(i32::from(self.response()?.status().as_u16()))
    }

    fn response_message(&mut self) -> io::Result<Option<String>> {
        Ok(self
            .response()?
            .status()
            .canonical_reason()
            .map(str::to_string))
    }

    fn header_fields(&mut self) -> io::Result<HeaderFields> {
        let response = self.response()?;
        let status = response.status();
        let status_line = match status.canonical_reason() {
            Some(reason) => format!("{:?} {} {}", response.version(), status.as_u16(), reason),
            None => format!("{:?} {}", response.version(), status.as_u16()),
        };

        let headers = response.headers();
        let mut fields = Vec::with_capacity(headers.keys_len() + 1);
        fields.push((None, vec![status_line]));
        for name in headers.keys() {
            let values = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect();
            fields.push((Some(name.as_str().to_string()), values));
        }
        Ok(fields)
    }

    fn body(&mut self) -> io::Result<Box<dyn Read + '_>> {
        self.response()?;
        if self.disconnector.is_disconnected() {
            return Err(self.fail(aborted()));
        }
        let runtime = self.runtime;
        let Some(response) = self.response.as_mut() else {
            return Err(aborted());
        };
        Ok(Box::new(BodyReader {
            runtime,
            response,
            cancel: &mut self.cancel,
            pending: Bytes::new(),
            state: BodyState::Streaming,
        }))
    }

    fn disconnector(&self) -> Disconnector {
        self.disconnector.clone()
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        // Tearing down a live response may spawn onto the runtime.
        let _guard = self.runtime.enter();
        self.response.take();
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BodyState {
    Streaming,
    Done,
    Aborted,
}

/// Blocking reader over the response body chunks.
///
/// A body that ends before its declared length surfaces as an error from
/// the underlying client rather than a short read.
struct BodyReader<'a> {
    runtime: &'static Runtime,
    response: &'a mut reqwest::Response,
    cancel: &'a mut oneshot::Receiver<()>,
    pending: Bytes,
    state: BodyState,
}

impl Read for BodyReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pending.is_empty() {
            match self.state {
                BodyState::Done => return Ok(0),
                BodyState::Aborted => return Err(aborted()),
                BodyState::Streaming => {}
            }

            let response = &mut *self.response;
            let cancel = &mut *self.cancel;
            let next = self.runtime.block_on(async {
                tokio::select! {
                    chunk = response.chunk() => Some(chunk),
                    _ = cancel => None,
                }
            });

            match next {
                Some(Ok(Some(chunk))) => self.pending = chunk,
                Some(Ok(None)) => self.state = BodyState::Done,
                Some(Err(err)) => {
                    self.state = BodyState::Done;
                    return Err(io_error(err));
                }
                None => {
                    self.state = BodyState::Aborted;
                    return Err(aborted());
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending.split_to(n));
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    /// Serve one connection: capture the request head, reply with `response`
    /// and close.
    fn serve_once(response: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                request.push_str(&line);
            }
            let mut writer = stream;
            writer.write_all(response.as_bytes()).unwrap();
            request
        });
        (url, handle)
    }

    #[test]
    fn test_open_rejects_bad_urls() {
        let transport = HttpTransport::new();
        assert!(matches!(
            transport.open("not a url", Timeouts::default()),
            Err(NetworkError::InvalidUrl(_))
        ));
        assert!(matches!(
            transport.open("ftp://example.com/file", Timeouts::default()),
            Err(NetworkError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
    }

    #[test]
    fn test_clients_are_shared_per_timeouts() {
        let transport = HttpTransport::new();
        let fast = Timeouts {
            connect: Duration::from_millis(100),
            read: Duration::from_millis(100),
        };
        transport.open("http://example.com/", Timeouts::default()).unwrap();
        transport.open("http://example.com/other", Timeouts::default()).unwrap();
        transport.open("http://example.com/", fast).unwrap();
        assert_eq!(transport.clients.lock().len(), 2);
    }

    #[test]
    fn test_header_injection_is_rejected() {
        let mut conn = HttpTransport::new()
            .open("http://example.com/", Timeouts::default())
            .unwrap();
        assert!(matches!(
            conn.add_header("X-Token", "x\r\nX-Injected: 1"),
            Err(NetworkError::InvalidHeader(_))
        ));
        assert!(matches!(
            conn.add_header("Bad Name", "1"),
            Err(NetworkError::InvalidHeader(_))
        ));
        assert!(conn.add_header("X-Token", "abc").is_ok());
    }

    #[test]
    fn test_get_round_trip() {
        let (url, server) = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nX-A: 1\r\nX-A: 2\r\n\r\nhello");
        let mut conn = HttpTransport::new()
            .open(&format!("{}/path?q=1", url), Timeouts::default())
            .unwrap();
        conn.set_method(HttpMethod::Get);
        conn.add_header("Connection", "Keep-Alive").unwrap();
        conn.connect().unwrap();

        assert_eq!(conn.response_code().unwrap(), 200);
        assert_eq!(conn.response_message().unwrap().as_deref(), Some("OK"));
        let fields = conn.header_fields().unwrap();
        assert_eq!(fields[0], (None, vec!["HTTP/1.1 200 OK".to_string()]));
        assert!(fields.contains(&(Some("x-a".to_string()), vec!["1".to_string(), "2".to_string()])));

        let mut body = String::new();
        conn.body().unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");

        let request = server.join().unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /path?q=1 http/1.1\r\n"));
        assert!(request.contains("connection: keep-alive\r\n"));
        assert!(request.contains("host: 127.0.0.1:"));
    }

    #[test]
    fn test_post_sends_content_length() {
        let (url, server) = serve_once("HTTP/1.1 204 No Content\r\n\r\n");
        let mut conn = HttpTransport::new().open(&url, Timeouts::default()).unwrap();
        conn.set_method(HttpMethod::Post);
        conn.write_body(b"abc").unwrap();
        conn.connect().unwrap();
        assert_eq!(conn.response_code().unwrap(), 204);

        let request = server.join().unwrap().to_ascii_lowercase();
        assert!(request.starts_with("post / http/1.1\r\n"));
        assert!(request.contains("content-length: 3\r\n"));
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let (url, server) = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nhello");
        let mut conn = HttpTransport::new().open(&url, Timeouts::default()).unwrap();
        conn.connect().unwrap();
        assert_eq!(conn.response_code().unwrap(), 200);
        server.join().unwrap();

        let mut body = Vec::new();
        assert!(conn.body().unwrap().read_to_end(&mut body).is_err());
    }

    #[test]
    fn test_connect_refused() {
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let mut conn = HttpTransport::new()
            .open(&format!("http://{}", addr), Timeouts::default())
            .unwrap();
        assert!(conn.connect().is_err());
        // The failure sticks.
        assert!(conn.response_code().is_err());
    }

    #[test]
    fn test_disconnect_before_connect_aborts() {
        let mut conn = HttpTransport::new()
            .open("http://127.0.0.1:9/", Timeouts::default())
            .unwrap();
        assert!(conn.disconnector().disconnect());
        let err = conn.connect().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn test_disconnect_interrupts_waiting_for_response() {
        // Accepted by the backlog but never answered.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let timeouts = Timeouts {
            connect: Duration::ZERO,
            read: Duration::ZERO,
        };
        let mut conn = HttpTransport::new()
            .open(&format!("http://{}/", listener.local_addr().unwrap()), timeouts)
            .unwrap();

        let disconnector = conn.disconnector();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            disconnector.disconnect()
        });

        let err = conn.connect().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
        assert!(canceller.join().unwrap());
        assert!(conn.body().is_err());
        drop(listener);
    }
}
