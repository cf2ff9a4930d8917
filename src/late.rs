//! Deferred Values
//!
//! A [`Late<T>`] is a value that becomes available later on the same
//! cooperative event loop, typically once the synthesis engine answers a
//! request. Its producer holds the matching [`Relay<T>`] and completes it
//! with either a value or a [`Failure`].
//!
//! Awaiting never blocks: attaching a continuation either runs it right away
//! (the value is already there) or stores it until the relay completes.
//! Continuations therefore run in the order operations complete, not the
//! order they were attached.
//!
//! ```rust
//! use patchcanvas::late::{join_all, Late};
//!
//! let (late, relay) = Late::<u32>::pending();
//! let doubled = late.map(|v| v * 2);
//! relay.resolve(21);
//!
//! let all = join_all(vec![doubled, Late::ready(1)]);
//! all.on_complete(|result| assert_eq!(result, Ok(vec![42, 1])));
//! ```

use crate::error::{Failure, FailureKind};
use std::cell::RefCell;
use std::rc::Rc;

type Continuation<T> = Box<dyn FnOnce(Result<T, Failure>)>;

struct Shared<T> {
    result: Option<Result<T, Failure>>,
    continuation: Option<Continuation<T>>,
}

/// A value that is not available yet
#[must_use = "a Late does nothing unless a continuation is attached"]
pub struct Late<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

/// The completing side of a [`Late`]
pub struct Relay<T> {
    shared: Option<Rc<RefCell<Shared<T>>>>,
}

impl<T: 'static> Late<T> {
    /// Create a pending value together with the relay that completes it
    pub fn pending() -> (Late<T>, Relay<T>) {
        let shared = Rc::new(RefCell::new(Shared {
            result: None,
            continuation: None,
        }));
        (
            Late {
                shared: Rc::clone(&shared),
            },
            Relay {
                shared: Some(shared),
            },
        )
    }

    /// A value that is already available
    pub fn ready(value: T) -> Self {
        Self::completed(Ok(value))
    }

    /// A value that already failed
    pub fn failed(failure: Failure) -> Self {
        Self::completed(Err(failure))
    }

    fn completed(result: Result<T, Failure>) -> Self {
        Late {
            shared: Rc::new(RefCell::new(Shared {
                result: Some(result),
                continuation: None,
            })),
        }
    }

    /// Whether the value (or its failure) has arrived and was not consumed yet
    pub fn is_ready(&self) -> bool {
        self.shared.borrow().result.is_some()
    }

    /// Run `f` with the outcome once it is available
    pub fn on_complete(self, f: impl FnOnce(Result<T, Failure>) + 'static) {
        let ready = self.shared.borrow_mut().result.take();
        match ready {
            Some(result) => f(result),
            None => self.shared.borrow_mut().continuation = Some(Box::new(f)),
        }
    }

    /// Transform the value once it arrives
    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Late<U> {
        let (late, relay) = Late::pending();
        self.on_complete(move |result| relay.complete(result.map(f)));
        late
    }

    /// Chain another deferred operation after this one
    pub fn and_then<U: 'static>(self, f: impl FnOnce(T) -> Late<U> + 'static) -> Late<U> {
        let (late, relay) = Late::pending();
        self.on_complete(move |result| match result {
            Ok(value) => f(value).on_complete(move |next| relay.complete(next)),
            Err(failure) => relay.fail(failure),
        });
        late
    }

    /// Recover from failures of one kind; other failures pass through
    pub fn catch_kind(self, kind: FailureKind, f: impl FnOnce(Failure) -> T + 'static) -> Late<T> {
        let (late, relay) = Late::pending();
        self.on_complete(move |result| match result {
            Err(failure) if failure.kind() == kind => relay.resolve(f(failure)),
            other => relay.complete(other),
        });
        late
    }

    /// Observe a failure without handling it
    pub fn inspect_err(self, f: impl FnOnce(&Failure) + 'static) -> Late<T> {
        let (late, relay) = Late::pending();
        self.on_complete(move |result| {
            if let Err(failure) = &result {
                f(failure);
            }
            relay.complete(result);
        });
        late
    }

    /// Drop the value when it arrives, logging an unhandled failure
    pub fn detach(self) {
        self.on_complete(|result| {
            if let Err(failure) = result {
                tracing::warn!("unhandled deferred failure: {failure}");
            }
        });
    }
}

impl<T: 'static> Relay<T> {
    /// Complete with a value
    pub fn resolve(self, value: T) {
        self.complete(Ok(value));
    }

    /// Complete with a failure
    pub fn fail(self, failure: Failure) {
        self.complete(Err(failure));
    }

    /// Complete with an outcome, running the waiting continuation if any
    pub fn complete(mut self, result: Result<T, Failure>) {
        if let Some(shared) = self.shared.take() {
            Self::deliver(&shared, result);
        }
    }

    fn deliver(shared: &Rc<RefCell<Shared<T>>>, result: Result<T, Failure>) {
        let continuation = shared.borrow_mut().continuation.take();
        match continuation {
            Some(f) => f(result),
            None => shared.borrow_mut().result = Some(result),
        }
    }
}

impl<T> Drop for Relay<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let continuation = shared.borrow_mut().continuation.take();
            match continuation {
                Some(f) => f(Err(Failure::Abandoned)),
                None => shared.borrow_mut().result = Some(Err(Failure::Abandoned)),
            }
        }
    }
}

struct JoinState<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    failure: Option<Failure>,
    relay: Option<Relay<Vec<T>>>,
}

/// Wait for every value, then complete once with all of them in input order.
///
/// The first failure (in completion order) fails the joined value, but only
/// after every operation has finished.
pub fn join_all<T: 'static>(lates: Vec<Late<T>>) -> Late<Vec<T>> {
    if lates.is_empty() {
        return Late::ready(Vec::new());
    }

    let (late, relay) = Late::pending();
    let state = Rc::new(RefCell::new(JoinState {
        slots: lates.iter().map(|_| None).collect(),
        remaining: lates.len(),
        failure: None,
        relay: Some(relay),
    }));

    for (index, pending) in lates.into_iter().enumerate() {
        let state = Rc::clone(&state);
        pending.on_complete(move |result| {
            let finished = {
                let mut s = state.borrow_mut();
                match result {
                    Ok(value) => s.slots[index] = Some(value),
                    Err(failure) => {
                        if s.failure.is_none() {
                            s.failure = Some(failure);
                        }
                    }
                }
                s.remaining -= 1;
                if s.remaining == 0 {
                    let outcome = match s.failure.take() {
                        Some(failure) => Err(failure),
                        None => Ok(s.slots.drain(..).flatten().collect()),
                    };
                    s.relay.take().map(|relay| (relay, outcome))
                } else {
                    None
                }
            };
            if let Some((relay, outcome)) = finished {
                relay.complete(outcome);
            }
        });
    }

    late
}
