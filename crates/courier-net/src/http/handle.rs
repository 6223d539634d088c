//! Cancellable request handles.
//!
//! A request is *pending* until its worker attaches a session, *active*
//! while the exchange runs, and *finished* once either the worker completes
//! it or the handle cancels it. Whichever side flips the finished flag owns
//! delivery, so every request produces exactly one outcome.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use courier_core::logging::targets;
use parking_lot::Mutex;

use super::dispatch::{Callback, CallbackDispatcher, Outcome};
use super::transport::Disconnector;

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of this id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Delivery {
    callback: Box<dyn Callback>,
    dispatcher: CallbackDispatcher,
}

/// State shared by a request's handles and its worker job.
pub(crate) struct RequestState {
    id: RequestId,
    finished: AtomicBool,
    /// Disconnector of the attached session. Attaching checks `finished`
    /// while holding this lock.
    session: Mutex<Option<Disconnector>>,
    delivery: Mutex<Option<Delivery>>,
}

impl RequestState {
    pub(crate) fn new(callback: Box<dyn Callback>, dispatcher: CallbackDispatcher) -> Arc<Self> {
        Arc::new(Self {
            id: RequestId::new(),
            finished: AtomicBool::new(false),
            session: Mutex::new(None),
            delivery: Mutex::new(Some(Delivery {
                callback,
                dispatcher,
            })),
        })
    }

    pub(crate) fn id(&self) -> RequestId {
        self.id
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn try_finish(&self) -> bool {
        self.finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Attach the worker's session.
    ///
    /// Returns `false` if the request was canceled while pending; the worker
    /// must then deliver [`Outcome::Canceled`] via
    /// [`deliver_canceled`](Self::deliver_canceled) without touching the
    /// network.
    pub(crate) fn attach(&self, disconnector: Disconnector) -> bool {
        let mut slot = self.session.lock();
        if self.is_finished() {
            return false;
        }
        *slot = Some(disconnector);
        true
    }

    /// Worker side of a cancellation that arrived before any session existed.
    pub(crate) fn deliver_canceled(&self) {
        self.deliver(Outcome::Canceled);
    }

    /// Finish the request with `outcome` unless it was already finished.
    ///
    /// Returns `false` (dropping `outcome`) if cancellation won.
    pub(crate) fn complete(&self, outcome: Outcome) -> bool {
        if !self.try_finish() {
            return false;
        }
        let session = self.session.lock().take();
        if let Some(disconnector) = session {
            disconnector.disconnect();
        }
        self.deliver(outcome);
        true
    }

    fn cancel(&self) -> bool {
        if !self.try_finish() {
            return false;
        }
        let session = self.session.lock().take();
        match session {
            Some(disconnector) => {
                tracing::debug!(target: targets::HTTP, id = %self.id, "Canceling active request");
                disconnector.disconnect();
                self.deliver(Outcome::Canceled);
            }
            None => {
                tracing::debug!(target: targets::HTTP, id = %self.id, "Canceling pending request");
            }
        }
        true
    }

    fn deliver(&self, outcome: Outcome) {
        let delivery = self.delivery.lock().take();
        match delivery {
            Some(Delivery {
                callback,
                dispatcher,
            }) => dispatcher.dispatch(callback, outcome),
            None => {
                tracing::error!(target: targets::HTTP, id = %self.id, "Outcome already delivered");
            }
        }
    }
}

/// Handle to an in-flight request.
///
/// Cloning shares the same request. Dropping a handle does not cancel it.
#[derive(Clone)]
pub struct RequestHandle {
    state: Arc<RequestState>,
}

impl RequestHandle {
    pub(crate) fn new(state: Arc<RequestState>) -> Self {
        Self { state }
    }

    /// Get the request ID.
    pub fn id(&self) -> RequestId {
        self.state.id()
    }

    /// Cancel the request.
    ///
    /// If the request is running, its connection is closed and the callback
    /// receives [`Outcome::Canceled`]. If it has not started yet, it never
    /// touches the network. Returns `true` only for the call that canceled
    /// it; once finished, further calls do nothing.
    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    /// Same as [`cancel`](Self::cancel).
    pub fn close(&self) -> bool {
        self.cancel()
    }

    /// Check if the request has finished or been canceled.
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id())
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    type Outcomes = Arc<Mutex<Vec<Outcome>>>;

    fn request() -> (Arc<RequestState>, Outcomes) {
        let outcomes: Outcomes = Arc::default();
        let sink = outcomes.clone();
        let state = RequestState::new(
            Box::new(move |outcome: Outcome| sink.lock().push(outcome)),
            CallbackDispatcher::inline(),
        );
        (state, outcomes)
    }

    fn counting_disconnector() -> (Disconnector, Arc<AtomicUsize>) {
        let disconnects = Arc::new(AtomicUsize::new(0));
        let counter = disconnects.clone();
        let disconnector = Disconnector::new();
        disconnector.arm(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (disconnector, disconnects)
    }

    fn success() -> Outcome {
        Outcome::Succeeded {
            code: 200,
            status: Some("OK".into()),
            headers: Default::default(),
            body: String::new(),
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let (a, _) = request();
        let (b, _) = request();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_cancel_pending_defers_to_worker() {
        let (state, outcomes) = request();
        let handle = RequestHandle::new(state.clone());

        assert!(handle.cancel());
        assert!(handle.is_finished());
        assert!(outcomes.lock().is_empty());

        let (disconnector, _) = counting_disconnector();
        assert!(!state.attach(disconnector));
        state.deliver_canceled();

        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_canceled());
    }

    #[test]
    fn test_cancel_active_disconnects_and_delivers() {
        let (state, outcomes) = request();
        let handle = RequestHandle::new(state.clone());
        let (disconnector, disconnects) = counting_disconnector();
        assert!(state.attach(disconnector));

        assert!(handle.cancel());
        assert!(!handle.close());
        assert!(!state.complete(success()));

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_canceled());
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let (state, outcomes) = request();
        let handle = RequestHandle::new(state.clone());
        let (disconnector, disconnects) = counting_disconnector();
        assert!(state.attach(disconnector));

        assert!(state.complete(success()));
        assert!(!handle.cancel());

        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        let outcomes = outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_succeeded());
    }

    #[test]
    fn test_concurrent_cancel_disconnects_once() {
        let (state, outcomes) = request();
        let handle = RequestHandle::new(state.clone());
        let (disconnector, disconnects) = counting_disconnector();
        assert!(state.attach(disconnector));

        let winners: usize = (0..8)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || handle.cancel())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|t| t.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.lock().len(), 1);
    }

    #[test]
    fn test_cancel_racing_worker_yields_one_outcome() {
        for _ in 0..200 {
            let (state, outcomes) = request();
            let handle = RequestHandle::new(state.clone());
            let (disconnector, disconnects) = counting_disconnector();

            let canceller = thread::spawn(move || handle.cancel());
            if state.attach(disconnector) {
                state.complete(success());
            } else {
                state.deliver_canceled();
            }
            canceller.join().unwrap();

            assert_eq!(outcomes.lock().len(), 1);
            assert!(disconnects.load(Ordering::SeqCst) <= 1);
        }
    }
}
