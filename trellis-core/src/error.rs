//! Error Handling
//!
//! Every user-supplied callback (setup and render functions, watchers,
//! lifecycle hooks, scheduler jobs, directive and vnode hooks, template ref
//! functions, async setup) runs through one narrow boundary:
//! [`call_with_error_handling`]. A failure is tagged with the [`ErrorKind`]
//! of the site that ran it and routed through [`handle_error`]:
//!
//! 1. `on_error_captured` hooks of ancestor components, innermost first. A
//!    hook returning `false` stops propagation.
//! 2. The app-level error handler from [`crate::config`], if installed.
//! 3. Otherwise the error is logged with `tracing::error!`. Synchronous
//!    sites then "rethrow": the error is parked as *unhandled* and the
//!    top-level entry point that triggered the work (`Renderer::render`,
//!    `scheduler::flush`, `next_tick`) returns it as `Err`.
//!
//! Callbacks report failure by returning `Err`. Anything implementing
//! [`IntoCallResult`] may be returned from a callback, so infallible
//! callbacks simply return `()` (or a `VNode`, for render functions).

use std::cell::RefCell;
use std::fmt;

use crate::component::{ComponentInstance, LifecycleHook, Pending};
use crate::config;
use crate::reactive::Value;

/// Boxed error type returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Result of a user callback after normalisation.
pub type CallResult<T = ()> = Result<T, BoxError>;

/// The site a failing callback was invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SetupFunction,
    RenderFunction,
    WatchGetter,
    WatchCallback,
    WatchCleanup,
    ComponentEventHandler,
    VNodeHook,
    DirectiveHook,
    TransitionHook,
    FunctionRef,
    AsyncSetup,
    Scheduler,
    AppErrorHandler,
    Lifecycle(LifecycleHook),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::SetupFunction => f.write_str("setup function"),
            ErrorKind::RenderFunction => f.write_str("render function"),
            ErrorKind::WatchGetter => f.write_str("watcher getter"),
            ErrorKind::WatchCallback => f.write_str("watcher callback"),
            ErrorKind::WatchCleanup => f.write_str("watcher cleanup function"),
            ErrorKind::ComponentEventHandler => f.write_str("component event handler"),
            ErrorKind::VNodeHook => f.write_str("vnode hook"),
            ErrorKind::DirectiveHook => f.write_str("directive hook"),
            ErrorKind::TransitionHook => f.write_str("transition hook"),
            ErrorKind::FunctionRef => f.write_str("ref function"),
            ErrorKind::AsyncSetup => f.write_str("async setup"),
            ErrorKind::Scheduler => f.write_str("scheduler flush"),
            ErrorKind::AppErrorHandler => f.write_str("app error handler"),
            ErrorKind::Lifecycle(hook) => write!(f, "{hook} hook"),
        }
    }
}

/// Errors surfaced by the runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A user callback failed.
    #[error("unhandled error during execution of {kind}: {source}")]
    Callback {
        kind: ErrorKind,
        #[source]
        source: BoxError,
    },

    /// A scheduler job re-queued itself more often than the configured limit.
    #[error("maximum recursive updates exceeded ({limit}) in scheduler job {job}")]
    RecursionLimit { job: String, limit: u32 },

    /// A write was attempted through a readonly proxy or ref.
    #[error("set operation on key {key:?} failed: target is readonly")]
    ReadonlyMutation { key: String },

    /// A teleport target selector did not resolve.
    #[error("invalid teleport target {selector:?}")]
    InvalidTarget { selector: String },

    #[error("suspense: {0}")]
    Suspense(String),
}

impl Error {
    /// The origin site, for callback errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Callback { kind, .. } => Some(*kind),
            Error::RecursionLimit { .. } => Some(ErrorKind::Scheduler),
            _ => None,
        }
    }
}

/// Conversion of callback return values into a [`CallResult`].
pub trait IntoCallResult<T> {
    fn into_call_result(self) -> CallResult<T>;
}

impl IntoCallResult<()> for () {
    fn into_call_result(self) -> CallResult<()> {
        Ok(())
    }
}

impl IntoCallResult<Value> for Value {
    fn into_call_result(self) -> CallResult<Value> {
        Ok(self)
    }
}

impl<T, E> IntoCallResult<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    fn into_call_result(self) -> CallResult<T> {
        self.map_err(Into::into)
    }
}

thread_local! {
    static UNHANDLED: RefCell<Option<Error>> = const { RefCell::new(None) };
}

/// Takes the first unhandled error recorded since the last call.
pub fn take_unhandled() -> Result<(), Error> {
    match UNHANDLED.with(|slot| slot.borrow_mut().take()) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn park_unhandled(err: Error) {
    UNHANDLED.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
    });
}

/// Runs `f`, reporting a failure through [`handle_error`].
///
/// Returns `None` when the callback failed.
pub fn call_with_error_handling<T, F>(
    kind: ErrorKind,
    instance: Option<&ComponentInstance>,
    f: F,
) -> Option<T>
where
    F: FnOnce() -> CallResult<T>,
{
    match f() {
        Ok(value) => Some(value),
        Err(source) => {
            handle_error(Error::Callback { kind, source }, instance, true);
            None
        }
    }
}

/// Like [`call_with_error_handling`] for callbacks that may hand back a
/// [`Pending`]; a later rejection is routed through the same reporting path.
pub fn call_with_async_error_handling<T, F>(
    kind: ErrorKind,
    instance: Option<&ComponentInstance>,
    f: F,
) -> Option<T>
where
    T: 'static,
    F: FnOnce() -> CallResult<AsyncOutcome<T>>,
{
    match call_with_error_handling(kind, instance, f)? {
        AsyncOutcome::Ready(value) => Some(value),
        AsyncOutcome::Pending(pending) => {
            let owner = instance.map(ComponentInstance::downgrade);
            pending.then(move |result| {
                if let Err(source) = result {
                    let owner = owner.and_then(|weak| weak.upgrade());
                    handle_error(Error::Callback { kind, source }, owner.as_ref(), false);
                }
            });
            None
        }
    }
}

/// Return value of callbacks that may settle later.
pub enum AsyncOutcome<T> {
    Ready(T),
    Pending(Pending<T>),
}

/// Reports `err`. `throw` marks synchronous sites that must not swallow the
/// failure when nothing handles it.
pub fn handle_error(err: Error, instance: Option<&ComponentInstance>, throw: bool) {
    if let (Some(instance), Some(kind)) = (instance, err.kind()) {
        let mut current = instance.parent();
        while let Some(ancestor) = current {
            for hook in ancestor.error_captured_hooks() {
                if !hook(&err, instance, kind) {
                    return;
                }
            }
            current = ancestor.parent();
        }
    }

    if let Some(handler) = config::with_config(|cfg| cfg.error_handler.clone()) {
        let info = err.kind().map(|kind| kind.to_string()).unwrap_or_default();
        if let Err(source) = handler(&err, instance, &info) {
            log_error(
                Error::Callback {
                    kind: ErrorKind::AppErrorHandler,
                    source,
                },
                throw,
            );
        }
        return;
    }

    log_error(err, throw);
}

fn log_error(err: Error, throw: bool) {
    tracing::error!(error = %err, "unhandled error");
    if throw && config::with_config(|cfg| cfg.throw_unhandled_errors) {
        park_unhandled(err);
    }
}
