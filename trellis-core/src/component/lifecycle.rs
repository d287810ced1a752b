//! Lifecycle hook registration and invocation.

use std::fmt;
use std::rc::Rc;

use super::instance::{get_current_instance, CurrentInstanceGuard};
use super::ComponentInstance;
use crate::builtins::suspense::{queue_effect_with_suspense, SuspenseBoundary};
use crate::error::{call_with_error_handling, CallResult, Error, ErrorKind, IntoCallResult};
use crate::reactive::{pause_tracking, reset_tracking};
use crate::scheduler::Job;

pub(crate) type Hook = Rc<dyn Fn() -> CallResult>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
    Activated,
    Deactivated,
    ErrorCaptured,
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleHook::BeforeMount => "beforeMount",
            LifecycleHook::Mounted => "mounted",
            LifecycleHook::BeforeUpdate => "beforeUpdate",
            LifecycleHook::Updated => "updated",
            LifecycleHook::BeforeUnmount => "beforeUnmount",
            LifecycleHook::Unmounted => "unmounted",
            LifecycleHook::Activated => "activated",
            LifecycleHook::Deactivated => "deactivated",
            LifecycleHook::ErrorCaptured => "errorCaptured",
        };
        f.write_str(name)
    }
}

fn inject_hook(kind: LifecycleHook, hook: Hook) {
    match get_current_instance() {
        Some(instance) => instance.add_hook(kind, hook),
        None => crate::config::warn(format_args!(
            "{kind} hook registered outside of component setup; it will never run"
        )),
    }
}

macro_rules! lifecycle_hooks {
    ($($(#[$meta:meta])* $name:ident => $kind:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name<F, R>(f: F)
            where
                F: Fn() -> R + 'static,
                R: IntoCallResult<()>,
            {
                inject_hook(LifecycleHook::$kind, Rc::new(move || f().into_call_result()));
            }
        )*
    };
}

lifecycle_hooks! {
    /// Runs right before the first render.
    on_before_mount => BeforeMount;
    /// Runs after the instance's subtree is inserted, once the flush reaches
    /// post callbacks. Inside a pending suspense boundary it waits for the
    /// boundary to resolve.
    on_mounted => Mounted;
    on_before_update => BeforeUpdate;
    on_updated => Updated;
    on_before_unmount => BeforeUnmount;
    on_unmounted => Unmounted;
    /// Runs when a kept-alive instance is (re)inserted, including the first
    /// mount.
    on_activated => Activated;
    /// Runs when a kept-alive instance is moved to storage, and on unmount.
    on_deactivated => Deactivated;
}

/// Registers a hook for errors thrown by descendants. Returning `false`
/// stops the error from propagating further.
pub fn on_error_captured<F>(f: F)
where
    F: Fn(&Error, &ComponentInstance, ErrorKind) -> bool + 'static,
{
    match get_current_instance() {
        Some(instance) => instance.add_error_captured(Rc::new(f)),
        None => crate::config::warn("errorCaptured hook registered outside of component setup"),
    }
}

/// Runs `kind` hooks of `instance` now.
pub(crate) fn invoke_hooks(instance: &ComponentInstance, kind: LifecycleHook) {
    let hooks = instance.hooks(kind);
    if hooks.is_empty() {
        return;
    }
    // Hooks do not become dependencies of whatever effect is running them.
    pause_tracking();
    let _guard = CurrentInstanceGuard::enter(instance);
    for hook in hooks {
        let _: Option<()> = call_with_error_handling(ErrorKind::Lifecycle(kind), Some(instance), || hook());
    }
    drop(_guard);
    reset_tracking();
}

/// Schedules `kind` hooks as a post-flush callback, or onto the pending
/// suspense boundary.
pub(crate) fn queue_hooks(instance: &ComponentInstance, kind: LifecycleHook, suspense: Option<&SuspenseBoundary>) {
    if instance.hooks(kind).is_empty() {
        return;
    }
    let target = instance.downgrade();
    let job = Job::new(move || {
        if let Some(instance) = target.upgrade() {
            // `unmounted` runs after the instance is flagged unmounted.
            if kind == LifecycleHook::Unmounted || !instance.is_unmounted() {
                invoke_hooks(&instance, kind);
            }
        }
    })
    .labelled(format!("{kind} hooks"));
    queue_effect_with_suspense(job, suspense);
}
