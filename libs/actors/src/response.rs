//! Single-writer future for an envelope's result
//!
//! A [`Response`] starts `Pending` and moves exactly once to `Completed`,
//! `Failed` or `Cancelled`. The first writer wins; later `complete`, `fail`
//! or `cancel` calls are no-ops that return `false`. Waiters block on a
//! condition variable; listeners registered with [`Response::on_complete`]
//! run on the thread that settles the response.

use crate::error::{ActorError, Result};
use crate::message::Payload;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Terminal state of a response
#[derive(Clone)]
pub enum Outcome {
    Completed(Payload),
    Failed(ActorError),
    Cancelled,
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed(_) => f.write_str("Completed"),
            Outcome::Failed(error) => write!(f, "Failed({})", error),
            Outcome::Cancelled => f.write_str("Cancelled"),
        }
    }
}

type Listener = Box<dyn FnOnce(&Outcome) + Send>;

#[derive(Default)]
struct State {
    outcome: Option<Outcome>,
    listeners: Vec<Listener>,
}

struct Shared {
    state: Mutex<State>,
    settled: Condvar,
    awaitable: bool,
}

/// Result handle shared by an envelope, its runner and every waiter
#[derive(Clone)]
pub struct Response {
    shared: Arc<Shared>,
}

impl Response {
    pub(crate) fn new(awaitable: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                settled: Condvar::new(),
                awaitable,
            }),
        }
    }

    /// Stand-alone pending response
    pub fn pending() -> Self {
        Self::new(false)
    }

    /// Whether this is the response of an await envelope
    pub fn is_awaitable(&self) -> bool {
        self.shared.awaitable
    }

    fn settle(&self, outcome: Outcome) -> bool {
        let listeners = {
            let mut state = self.shared.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.listeners)
        };
        self.shared.settled.notify_all();
        for listener in listeners {
            listener(&outcome);
        }
        true
    }

    /// Complete with a typed value
    pub fn complete<T: Any + Send + Sync>(&self, value: T) -> bool {
        self.settle(Outcome::Completed(Arc::new(value)))
    }

    pub fn complete_payload(&self, payload: Payload) -> bool {
        self.settle(Outcome::Completed(payload))
    }

    pub fn fail(&self, error: ActorError) -> bool {
        self.settle(Outcome::Failed(error))
    }

    pub fn cancel(&self) -> bool {
        self.settle(Outcome::Cancelled)
    }

    /// Copy another response's terminal state into this one
    pub fn settle_with(&self, outcome: &Outcome) -> bool {
        self.settle(outcome.clone())
    }

    /// Run `listener` once the response is terminal; immediately if it already is
    pub fn on_complete<F>(&self, listener: F)
    where
        F: FnOnce(&Outcome) + Send + 'static,
    {
        let outcome = {
            let mut state = self.shared.state.lock();
            match &state.outcome {
                Some(outcome) => outcome.clone(),
                None => {
                    state.listeners.push(Box::new(listener));
                    return;
                }
            }
        };
        listener(&outcome);
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.shared.state.lock().outcome.clone()
    }

    pub fn is_done(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome(), Some(Outcome::Completed(_)))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome(), Some(Outcome::Failed(_)))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome(), Some(Outcome::Cancelled))
    }

    /// Block until terminal
    pub fn wait(&self) -> Outcome {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            self.shared.settled.wait(&mut state);
        }
    }

    /// Block until terminal or until `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return Some(outcome.clone());
            }
            if self.shared.settled.wait_until(&mut state, deadline).timed_out() {
                return state.outcome.clone();
            }
        }
    }

    /// Wait for an await response, failing it with a timeout once `deadline` passes.
    ///
    /// `None` waits until the response is terminal. Responses of normal
    /// envelopes are left untouched.
    pub fn await_deadline(&self, deadline: Option<Duration>) {
        if !self.shared.awaitable {
            return;
        }
        match deadline {
            None => {
                self.wait();
            }
            Some(timeout) => {
                if self.wait_timeout(timeout).is_none() {
                    self.fail(ActorError::timeout("await", timeout));
                }
            }
        }
    }

    /// Block until terminal and return the completed payload
    pub fn get(&self) -> Result<Payload> {
        match self.wait() {
            Outcome::Completed(payload) => Ok(payload),
            Outcome::Failed(error) => Err(error),
            Outcome::Cancelled => Err(ActorError::Cancelled),
        }
    }

    /// Like [`get`](Self::get), giving up with a timeout error after `timeout`
    pub fn get_timeout(&self, timeout: Duration) -> Result<Payload> {
        match self.wait_timeout(timeout) {
            Some(Outcome::Completed(payload)) => Ok(payload),
            Some(Outcome::Failed(error)) => Err(error),
            Some(Outcome::Cancelled) => Err(ActorError::Cancelled),
            None => Err(ActorError::timeout("get", timeout)),
        }
    }

    /// Block until terminal and return a clone of the typed value
    pub fn get_as<T: Any + Clone>(&self) -> Result<T> {
        let payload = self.get()?;
        payload
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(ActorError::type_mismatch::<T>)
    }

    /// Completed value without blocking; `None` while pending, on failure or on type mismatch
    pub fn value<T: Any + Clone>(&self) -> Option<T> {
        match self.outcome()? {
            Outcome::Completed(payload) => payload.downcast_ref::<T>().cloned(),
            _ => None,
        }
    }

    /// Failure without blocking; cancellation reports [`ActorError::Cancelled`]
    pub fn error(&self) -> Option<ActorError> {
        match self.outcome()? {
            Outcome::Failed(error) => Some(error),
            Outcome::Cancelled => Some(ActorError::Cancelled),
            Outcome::Completed(_) => None,
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("awaitable", &self.shared.awaitable)
            .field("outcome", &self.outcome())
            .finish()
    }
}
