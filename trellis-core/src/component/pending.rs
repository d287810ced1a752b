//! Single-continuation settle cells for async setup.
//!
//! A [`Pending`] is settled once through its paired [`Settle`] handle. The
//! continuation registered with [`Pending::then`] runs as a microtask after
//! settlement, never synchronously inside `resolve`/`reject`.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use crate::error::BoxError;
use crate::scheduler::queue_microtask;

type Continuation<T> = Box<dyn FnOnce(Result<T, BoxError>)>;

enum State<T> {
    Waiting,
    Listening(Continuation<T>),
    Settled(Result<T, BoxError>),
    Done,
}

/// The read side: a value that will be available later.
pub struct Pending<T> {
    state: Rc<RefCell<State<T>>>,
}

/// The write side of a [`Pending`].
pub struct Settle<T> {
    state: Rc<RefCell<State<T>>>,
}

/// Creates an unsettled pair.
pub fn pending<T: 'static>() -> (Pending<T>, Settle<T>) {
    let state = Rc::new(RefCell::new(State::Waiting));
    (
        Pending {
            state: Rc::clone(&state),
        },
        Settle { state },
    )
}

impl<T: 'static> Settle<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, err: impl Into<BoxError>) {
        self.settle(Err(err.into()));
    }

    fn settle(self, result: Result<T, BoxError>) {
        let prev = std::mem::replace(&mut *self.state.borrow_mut(), State::Done);
        match prev {
            State::Waiting => *self.state.borrow_mut() = State::Settled(result),
            State::Listening(continuation) => queue_microtask(move || continuation(result)),
            settled @ (State::Settled(_) | State::Done) => *self.state.borrow_mut() = settled,
        }
    }
}

impl<T: 'static> Pending<T> {
    pub fn resolved(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Settled(Ok(value)))),
        }
    }

    pub fn rejected(err: impl Into<BoxError>) -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Settled(Err(err.into())))),
        }
    }

    /// Drives `future` on the current tokio `LocalSet`.
    pub fn from_future<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + 'static,
        E: Into<BoxError> + 'static,
    {
        let (pending, settle) = pending();
        tokio::task::spawn_local(async move {
            settle.settle(future.await.map_err(Into::into));
        });
        pending
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.state.borrow(), State::Settled(_) | State::Done)
    }

    /// Registers the continuation.
    pub fn then(self, f: impl FnOnce(Result<T, BoxError>) + 'static) {
        let prev = std::mem::replace(&mut *self.state.borrow_mut(), State::Done);
        match prev {
            State::Waiting => *self.state.borrow_mut() = State::Listening(Box::new(f)),
            State::Settled(result) => queue_microtask(move || f(result)),
            State::Listening(existing) => {
                *self.state.borrow_mut() = State::Listening(existing);
                crate::config::warn("a pending value accepts a single continuation");
            }
            State::Done => crate::config::warn("pending value was already consumed"),
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            State::Waiting => "waiting",
            State::Listening(_) => "listening",
            State::Settled(Ok(_)) => "resolved",
            State::Settled(Err(_)) => "rejected",
            State::Done => "done",
        };
        f.debug_tuple("Pending").field(&state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::run_microtasks;
    use std::cell::Cell;

    #[test]
    fn continuation_runs_as_microtask() {
        let (p, settle) = pending::<u32>();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        p.then(move |r| s.set(r.unwrap()));
        settle.resolve(7);
        assert_eq!(seen.get(), 0);
        run_microtasks();
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn settled_before_then() {
        let p = Pending::<u32>::rejected("nope");
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        p.then(move |r| *s.borrow_mut() = Some(r.unwrap_err().to_string()));
        run_microtasks();
        assert_eq!(seen.borrow().as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn from_future_settles_on_local_set() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let p = Pending::from_future(async { Ok::<_, BoxError>(3u8) });
                let seen = Rc::new(Cell::new(0));
                let s = seen.clone();
                p.then(move |r| s.set(r.unwrap()));
                tokio::task::yield_now().await;
                run_microtasks();
                assert_eq!(seen.get(), 3);
            })
            .await;
    }
}
