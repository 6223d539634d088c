//! Request outcomes and their delivery to callbacks.

use std::fmt;
use std::sync::Arc;

use courier_core::logging::targets;
use courier_core::{Executor, Job};

use super::request::Headers;
use crate::error::NetworkError;

/// The terminal result of a request.
#[derive(Debug)]
pub enum Outcome {
    /// A status code was resolved and the body was read.
    Succeeded {
        code: i32,
        status: Option<String>,
        headers: Headers,
        body: String,
    },
    /// The request failed. `code` is `-1` when no status was resolved.
    Failed {
        code: i32,
        status: Option<String>,
        cause: Option<NetworkError>,
    },
    /// The request was canceled through its handle.
    Canceled,
}

impl Outcome {
    /// Check if this is a success.
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Check if this is a failure.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Check if this is a cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// The status code, unless canceled.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Succeeded { code, .. } | Self::Failed { code, .. } => Some(*code),
            Self::Canceled => None,
        }
    }
}

/// Receives the outcome of a request. Exactly one method is called, once.
///
/// Any `FnOnce(Outcome)` closure is a callback:
///
/// ```no_run
/// use courier_net::http::{AsyncHttpClient, Outcome};
///
/// let client = AsyncHttpClient::new();
/// client.get("http://example.com", |outcome: Outcome| match outcome {
///     Outcome::Succeeded { body, .. } => println!("{body}"),
///     Outcome::Failed { code, cause, .. } => eprintln!("failed ({code}): {cause:?}"),
///     Outcome::Canceled => {}
/// });
/// ```
pub trait Callback: Send + 'static {
    /// A status was resolved and the body was read.
    fn succeeded(self: Box<Self>, code: i32, status: Option<String>, headers: Headers, body: String);

    /// The request failed.
    fn failed(self: Box<Self>, code: i32, status: Option<String>, cause: Option<NetworkError>);

    /// The request was canceled. Does nothing by default.
    fn canceled(self: Box<Self>) {}
}

impl<F> Callback for F
where
    F: FnOnce(Outcome) + Send + 'static,
{
    fn succeeded(self: Box<Self>, code: i32, status: Option<String>, headers: Headers, body: String) {
        (*self)(Outcome::Succeeded {
            code,
            status,
            headers,
            body,
        })
    }

    fn failed(self: Box<Self>, code: i32, status: Option<String>, cause: Option<NetworkError>) {
        (*self)(Outcome::Failed { code, status, cause })
    }

    fn canceled(self: Box<Self>) {
        (*self)(Outcome::Canceled)
    }
}

fn deliver(callback: Box<dyn Callback>, outcome: Outcome) {
    match outcome {
        Outcome::Succeeded {
            code,
            status,
            headers,
            body,
        } => callback.succeeded(code, status, headers, body),
        Outcome::Failed { code, status, cause } => callback.failed(code, status, cause),
        Outcome::Canceled => callback.canceled(),
    }
}

/// Routes outcomes to callbacks, optionally through an executor.
///
/// Without an executor, callbacks run on the thread that produced the
/// outcome. If the executor rejects a delivery, it runs on the current
/// thread instead so that no outcome is lost.
#[derive(Clone, Default)]
pub struct CallbackDispatcher {
    executor: Option<Arc<dyn Executor>>,
}

impl CallbackDispatcher {
    /// Deliver on the producing thread.
    pub fn inline() -> Self {
        Self::default()
    }

    /// Deliver through `executor`.
    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor: Some(executor),
        }
    }

    /// Check if an executor is configured.
    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    /// Hand `outcome` to `callback`.
    pub fn dispatch(&self, callback: Box<dyn Callback>, outcome: Outcome) {
        let Some(executor) = &self.executor else {
            deliver(callback, outcome);
            return;
        };
        let job: Job = Box::new(move || deliver(callback, outcome));
        if let Err(err) = executor.execute(job) {
            tracing::warn!(
                target: targets::HTTP,
                "Callback executor rejected delivery ({}); delivering inline",
                err
            );
            (err.into_job())();
        }
    }
}

impl fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("has_executor", &self.has_executor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ExecuteError;
    use parking_lot::Mutex;
    use std::thread;

    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Callback for Recorder {
        fn succeeded(self: Box<Self>, code: i32, _status: Option<String>, _headers: Headers, body: String) {
            self.calls.lock().push(format!("succeeded {code} {body}"));
        }

        fn failed(self: Box<Self>, code: i32, _status: Option<String>, _cause: Option<NetworkError>) {
            self.calls.lock().push(format!("failed {code}"));
        }
    }

    #[test]
    fn test_inline_delivery() {
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        CallbackDispatcher::inline().dispatch(
            Box::new(recorder),
            Outcome::Succeeded {
                code: 200,
                status: Some("OK".into()),
                headers: Headers::new(),
                body: "hi".into(),
            },
        );
        assert_eq!(*calls.lock(), vec!["succeeded 200 hi".to_string()]);
    }

    #[test]
    fn test_canceled_defaults_to_nothing() {
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        CallbackDispatcher::inline().dispatch(Box::new(recorder), Outcome::Canceled);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_closure_callback_receives_outcome() {
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        CallbackDispatcher::inline().dispatch(
            Box::new(move |outcome: Outcome| *slot.lock() = outcome.code()),
            Outcome::Failed {
                code: -1,
                status: None,
                cause: Some(NetworkError::NoStatus),
            },
        );
        assert_eq!(*seen.lock(), Some(-1));
    }

    #[test]
    fn test_delivery_through_executor() {
        let delivered_on = Arc::new(Mutex::new(None));
        let slot = delivered_on.clone();
        let executor = |job: Job| {
            thread::Builder::new()
                .name("callback-thread".into())
                .spawn(job)
                .unwrap()
                .join()
                .unwrap();
        };
        CallbackDispatcher::with_executor(Arc::new(executor)).dispatch(
            Box::new(move |_: Outcome| {
                *slot.lock() = thread::current().name().map(str::to_string);
            }),
            Outcome::Canceled,
        );
        assert_eq!(delivered_on.lock().as_deref(), Some("callback-thread"));
    }

    struct Rejecting;

    impl Executor for Rejecting {
        fn execute(&self, job: Job) -> std::result::Result<(), ExecuteError> {
            Err(ExecuteError::Saturated(job))
        }
    }

    #[test]
    fn test_rejected_delivery_falls_back_inline() {
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        CallbackDispatcher::with_executor(Arc::new(Rejecting)).dispatch(
            Box::new(recorder),
            Outcome::Failed {
                code: 503,
                status: None,
                cause: None,
            },
        );
        assert_eq!(*calls.lock(), vec!["failed 503".to_string()]);
    }
}
