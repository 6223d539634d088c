//! One request/response exchange with fault-tolerant status resolution.

use std::fmt;
use std::io::Read;

use courier_core::logging::targets;

use super::request::{CODE_EXCEPTION, Headers, HttpMethod, Timeouts};
use super::transport::{Connection, Disconnector, HeaderFields, Transport};
use crate::error::{NetworkError, Result};

/// Wraps a [`Connection`] and absorbs its failures.
///
/// Nothing on a session returns an error except reading the body text:
/// failures are recorded (see [`failure`](Self::failure)) and the session
/// degrades to sentinel values. A session whose connection could not be
/// opened is *unusable*; every operation on it is a no-op.
///
/// The status code and reason phrase are resolved at most once. The direct
/// accessors are tried first; if they fail or cannot parse the status line,
/// the raw status line from the header fields is parsed instead.
pub struct TransportSession {
    connection: Option<Box<dyn Connection>>,
    disconnector: Disconnector,
    code: Option<i32>,
    message: Option<String>,
    headers: Headers,
    headers_resolved: bool,
    /// Set when a request header was refused; the request is never sent.
    invalid_request: bool,
    failure: Option<NetworkError>,
}

impl TransportSession {
    /// Open a session for `url`. Never fails; see [`is_usable`](Self::is_usable).
    pub fn open(transport: &dyn Transport, url: &str, timeouts: Timeouts) -> Self {
        match transport.open(url, timeouts) {
            Ok(connection) => Self::from_connection(connection),
            Err(err) => {
                tracing::warn!(target: targets::TRANSPORT, url, "Failed to open connection: {}", err);
                Self {
                    connection: None,
                    disconnector: Disconnector::new(),
                    code: None,
                    message: None,
                    headers: Headers::new(),
                    headers_resolved: false,
                    invalid_request: false,
                    failure: Some(err),
                }
            }
        }
    }

    pub(crate) fn from_connection(connection: Box<dyn Connection>) -> Self {
        Self {
            disconnector: connection.disconnector(),
            connection: Some(connection),
            code: None,
            message: None,
            headers: Headers::new(),
            headers_resolved: false,
            invalid_request: false,
            failure: None,
        }
    }

    /// Check whether a connection was opened.
    pub fn is_usable(&self) -> bool {
        self.connection.is_some()
    }

    /// A handle that closes this session from another thread.
    pub fn disconnector(&self) -> Disconnector {
        self.disconnector.clone()
    }

    /// The most recent failure, if any.
    pub fn failure(&self) -> Option<&NetworkError> {
        self.failure.as_ref()
    }

    /// Take the most recent failure.
    pub fn take_failure(&mut self) -> Option<NetworkError> {
        self.failure.take()
    }

    pub fn set_method(&mut self, method: HttpMethod) {
        if let Some(connection) = self.connection.as_mut() {
            connection.set_method(method);
        }
    }

    /// Add request headers. Entries with an empty name are skipped.
    ///
    /// A name or value the connection refuses is recorded as the failure
    /// and keeps [`connect`](Self::connect) from sending the request.
    pub fn set_headers(&mut self, headers: &Headers) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        for (name, value) in headers.iter().filter(|(name, _)| !name.is_empty()) {
            if let Err(err) = connection.add_header(name, value) {
                tracing::warn!(target: targets::TRANSPORT, header = %name, "Refused request header: {}", err);
                self.invalid_request = true;
                self.failure = Some(err);
            }
        }
    }

    /// Send the request with `body`. A failure is recorded and reported
    /// again by [`connect`](Self::connect).
    pub fn write_body(&mut self, body: &[u8]) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if let Err(err) = connection.write_body(body) {
            tracing::warn!(target: targets::TRANSPORT, "Failed to write request body: {}", err);
            self.failure = Some(NetworkError::Io(err));
        }
    }

    /// Establish the connection. Returns `false` on failure or if unusable.
    pub fn connect(&mut self) -> bool {
        let Some(connection) = self.connection.as_mut() else {
            return false;
        };
        if self.invalid_request {
            return false;
        }
        match connection.connect() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(target: targets::TRANSPORT, "Failed to connect: {}", err);
                self.failure = Some(NetworkError::Connection(err));
                false
            }
        }
    }

    /// The response status code, or [`CODE_EXCEPTION`].
    pub fn status_code(&mut self) -> i32 {
        let direct = match self.connection.as_mut().map(|c| c.response_code()) {
            Some(Ok(code)) if code != CODE_EXCEPTION => Some(code),
            Some(Ok(_)) | None => None,
            Some(Err(err)) => {
                tracing::warn!(target: targets::TRANSPORT, "Failed to read status code: {}", err);
                self.failure = Some(NetworkError::Io(err));
                None
            }
        };
        match direct {
            Some(code) => {
                self.code.get_or_insert(code);
            }
            None if self.code.is_none() => {
                self.headers();
            }
            None => {}
        }
        self.code.unwrap_or(CODE_EXCEPTION)
    }

    /// The response reason phrase.
    pub fn status_message(&mut self) -> Option<String> {
        let direct = match self.connection.as_mut().map(|c| c.response_message()) {
            Some(Ok(message)) => message,
            None => None,
            Some(Err(err)) => {
                tracing::warn!(target: targets::TRANSPORT, "Failed to read status message: {}", err);
                self.failure = Some(NetworkError::Io(err));
                None
            }
        };
        match direct {
            Some(message) => {
                self.message.get_or_insert(message);
            }
            None if self.message.is_none() => {
                self.headers();
            }
            None => {}
        }
        self.message.clone()
    }

    /// Response headers, with repeated fields joined by `"; "`.
    ///
    /// Read once from the connection. Also fills in a missing status code
    /// and reason phrase from the raw status line.
    pub fn headers(&mut self) -> &Headers {
        if !self.headers_resolved
            && let Some(connection) = self.connection.as_mut()
        {
            match connection.header_fields() {
                Ok(fields) => self.absorb_header_fields(fields),
                Err(err) => {
                    tracing::debug!(target: targets::TRANSPORT, "Header fields unavailable: {}", err);
                }
            }
        }
        &self.headers
    }

    fn absorb_header_fields(&mut self, fields: HeaderFields) {
        let mut status_line = None;
        for (name, values) in fields {
            match name {
                None => status_line = values.into_iter().next(),
                Some(name) if name.is_empty() => {}
                Some(name) => {
                    self.headers.insert(name, values.join("; "));
                }
            }
        }
        if let Some(line) = status_line {
            self.apply_status_line(&line);
        }
        self.headers_resolved = true;
    }

    /// Parse `HTTP/<version> <code> <phrase>` by its first two spaces,
    /// filling only values not already known.
    fn apply_status_line(&mut self, line: &str) {
        if !line.starts_with("HTTP/") {
            return;
        }
        let Some(code_pos) = line.find(' ') else {
            return;
        };
        let phrase_pos = line[code_pos + 1..].find(' ').map(|p| p + code_pos + 1);

        if self.message.is_none()
            && let Some(phrase_pos) = phrase_pos
        {
            self.message = Some(line[phrase_pos + 1..].to_string());
        }
        if self.code.is_none() {
            let end = phrase_pos.unwrap_or(line.len());
            if let Ok(code) = line[code_pos + 1..end].parse::<i32>() {
                self.code = Some(code);
            }
        }
    }

    /// The response body stream, or `None` if it cannot be obtained.
    pub fn body(&mut self) -> Option<Box<dyn Read + '_>> {
        match self.connection.as_mut()?.body() {
            Ok(body) => Some(body),
            Err(err) => {
                tracing::warn!(target: targets::TRANSPORT, "Failed to open response body: {}", err);
                self.failure = Some(NetworkError::Io(err));
                None
            }
        }
    }

    /// Read the whole body as text, replacing invalid UTF-8.
    ///
    /// A missing body stream reads as the empty string.
    pub fn read_body_text(&mut self) -> Result<String> {
        let Some(mut body) = self.body() else {
            return Ok(String::new());
        };
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Close the connection. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.disconnector.disconnect()
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("usable", &self.is_usable())
            .field("code", &self.code)
            .field("message", &self.message)
            .field("failure", &self.failure)
            .finish()
    }
}
