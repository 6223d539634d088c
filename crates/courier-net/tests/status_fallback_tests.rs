//! Status resolution through the client when a connection cannot report
//! the status directly.

use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use courier_net::http::{
    AsyncHttpClient, Connection, Disconnector, HeaderFields, HttpMethod, Outcome, Timeouts, Transport,
};
use courier_net::NetworkError;

/// Serves one canned response whose status line the direct accessors
/// refuse to parse.
struct RawStatusTransport {
    status_line: &'static str,
    fields: Vec<(&'static str, &'static str)>,
    body: &'static str,
}

struct RawStatusConnection {
    status_line: &'static str,
    fields: Vec<(&'static str, &'static str)>,
    body: &'static str,
    disconnector: Disconnector,
}

impl Transport for RawStatusTransport {
    fn open(&self, _url: &str, _timeouts: Timeouts) -> courier_net::Result<Box<dyn Connection>> {
        Ok(Box::new(RawStatusConnection {
            status_line: self.status_line,
            fields: self.fields.clone(),
            body: self.body,
            disconnector: Disconnector::new(),
        }))
    }
}

impl Connection for RawStatusConnection {
    fn set_method(&mut self, _method: HttpMethod) {}

    fn add_header(&mut self, _name: &str, _value: &str) -> courier_net::Result<()> {
        Ok(())
    }

    fn write_body(&mut self, _body: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn connect(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn response_code(&mut self) -> io::Result<i32> {
        Ok(-1)
    }

    fn response_message(&mut self) -> io::Result<Option<String>> {
        Ok(None)
    }

    fn header_fields(&mut self) -> io::Result<HeaderFields> {
        let mut fields = vec![(None, vec![self.status_line.to_string()])];
        fields.extend(
            self.fields
                .iter()
                .map(|(name, value)| (Some(name.to_string()), vec![value.to_string()])),
        );
        Ok(fields)
    }

    fn body(&mut self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.body.as_bytes())))
    }

    fn disconnector(&self) -> Disconnector {
        self.disconnector.clone()
    }
}

fn fetch(transport: RawStatusTransport) -> Outcome {
    let client = AsyncHttpClient::builder()
        .transport(Arc::new(transport))
        .build()
        .expect("Failed to build client");

    let (tx, rx) = mpsc::channel();
    client.get("http://example.com/raw", move |outcome: Outcome| {
        let _ = tx.send(outcome);
    });
    rx.recv_timeout(Duration::from_secs(5)).expect("No outcome delivered")
}

#[test]
fn test_non_http1_status_line_resolves_through_fallback() {
    let outcome = fetch(RawStatusTransport {
        status_line: "HTTP/2 200 OK",
        fields: vec![("X-Mode", "raw")],
        body: "hi",
    });

    match outcome {
        Outcome::Succeeded {
            code,
            status,
            headers,
            body,
        } => {
            assert_eq!(code, 200);
            assert_eq!(status.as_deref(), Some("OK"));
            assert_eq!(headers.get("X-Mode").map(String::as_str), Some("raw"));
            assert_eq!(body, "hi");
        }
        other => panic!("Expected success, got {:?}", other),
    }
}

#[test]
fn test_garbage_status_line_fails() {
    let outcome = fetch(RawStatusTransport {
        status_line: "ICY 200 OK",
        fields: Vec::new(),
        body: "",
    });

    match outcome {
        Outcome::Failed { code, cause, .. } => {
            assert_eq!(code, -1);
            assert!(matches!(cause, Some(NetworkError::NoStatus)), "{:?}", cause);
        }
        other => panic!("Expected failure, got {:?}", other),
    }
}
