use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type Action = Box<dyn FnOnce() + Send>;

#[derive(Default)]
enum State {
    #[default]
    Idle,
    Armed(Action),
    Disconnected,
}

/// Aborts a connection from any thread, at most once.
///
/// The connection arms it with the action that tears down its socket. Once
/// disconnected, the disconnector stays disconnected and refuses new actions,
/// so a connection that is still being established sees the abort as soon as
/// it tries to arm.
#[derive(Clone, Default)]
pub struct Disconnector {
    state: Arc<Mutex<State>>,
}

impl Disconnector {
    /// Create an idle disconnector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the teardown action.
    ///
    /// Returns `false` without installing anything if already disconnected.
    pub fn arm(&self, action: impl FnOnce() + Send + 'static) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, State::Disconnected) {
            return false;
        }
        *state = State::Armed(Box::new(action));
        true
    }

    /// Disconnect, running the teardown action if one is armed.
    ///
    /// Returns `true` only for the call that performed the disconnect.
    pub fn disconnect(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock(), State::Disconnected);
        match previous {
            State::Disconnected => false,
            State::Idle => true,
            State::Armed(action) => {
                action();
                true
            }
        }
    }

    /// Check whether `disconnect` has been called.
    pub fn is_disconnected(&self) -> bool {
        matches!(*self.state.lock(), State::Disconnected)
    }
}

impl fmt::Debug for Disconnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.state.lock() {
            State::Idle => "idle",
            State::Armed(_) => "armed",
            State::Disconnected => "disconnected",
        };
        f.debug_struct("Disconnector").field("state", &state).finish()
    }
}
