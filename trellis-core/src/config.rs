//! Runtime Configuration
//!
//! A thread-local [`AppConfig`] holds the knobs shared by the reactive
//! system, the scheduler and the renderer. The runtime is single-threaded
//! (handlers are `Rc` closures), so each thread that renders owns its own
//! configuration.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use crate::component::ComponentInstance;
use crate::error::{CallResult, Error};

/// Receives errors nothing else handled: `(error, instance, info)`.
pub type ErrorHandler = Rc<dyn Fn(&Error, Option<&ComponentInstance>, &str) -> CallResult>;

/// Receives runtime warnings instead of `tracing::warn!`.
pub type WarnHandler = Rc<dyn Fn(&str)>;

/// Default ceiling on how often one job may run within a single flush.
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// Deepest nested effect run that still uses the bitfield tracking path.
/// One bit per depth level must fit in a `u32`, with bit 0 unused.
pub const DEFAULT_MAX_MARKER_BITS: u32 = 30;

#[derive(Clone)]
pub struct AppConfig {
    pub error_handler: Option<ErrorHandler>,
    pub warn_handler: Option<WarnHandler>,
    /// When no handler is installed, surface errors from synchronous call
    /// sites to the top-level caller instead of only logging them.
    pub throw_unhandled_errors: bool,
    pub recursion_limit: u32,
    pub max_marker_bits: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            error_handler: None,
            warn_handler: None,
            throw_unhandled_errors: true,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            max_marker_bits: DEFAULT_MAX_MARKER_BITS,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("error_handler", &self.error_handler.is_some())
            .field("warn_handler", &self.warn_handler.is_some())
            .field("throw_unhandled_errors", &self.throw_unhandled_errors)
            .field("recursion_limit", &self.recursion_limit)
            .field("max_marker_bits", &self.max_marker_bits)
            .finish()
    }
}

thread_local! {
    static CONFIG: RefCell<AppConfig> = RefCell::new(AppConfig::default());
}

/// Mutates the current thread's configuration.
pub fn configure<F>(f: F)
where
    F: FnOnce(&mut AppConfig),
{
    CONFIG.with(|cfg| f(&mut cfg.borrow_mut()));
}

/// Reads from the current thread's configuration.
pub fn with_config<R>(f: impl FnOnce(&AppConfig) -> R) -> R {
    CONFIG.with(|cfg| f(&cfg.borrow()))
}

/// Restores the default configuration.
pub fn reset() {
    CONFIG.with(|cfg| *cfg.borrow_mut() = AppConfig::default());
}

/// Emits a runtime warning.
pub(crate) fn warn(message: impl Display) {
    let handler = with_config(|cfg| cfg.warn_handler.clone());
    match handler {
        Some(handler) => handler(&message.to_string()),
        None => tracing::warn!("{message}"),
    }
}
