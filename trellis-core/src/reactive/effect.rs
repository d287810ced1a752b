//! Effect Implementation
//!
//! A [`ReactiveEffect`] wraps a function and re-runs it (or hands it to its
//! scheduler) whenever a dependency read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. `run()` makes the effect active, bumps the nesting depth and marks
//!    every dep from the previous run as *was tracked* at the current bit.
//!
//! 2. Reads during the function call [`track_effects`], which marks deps as
//!    *newly tracked* and subscribes the effect to deps it did not already
//!    depend on.
//!
//! 3. When the run ends, deps that were tracked before but not this time
//!    drop the effect. Beyond the configured marker depth the effect falls
//!    back to clearing all deps before the run.
//!
//! 4. A trigger runs computed-backed effects first, then the rest. The
//!    currently running effect is skipped unless it allows recursion.
//!
//! # Stopping
//!
//! A stopped effect is detached from all deps and never re-subscribes.
//! Running it still calls the function, without tracking. Stopping an
//! effect from inside its own run is deferred until the run ends.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::{self, ReactiveContext};
use super::dep::{Dep, WeakDep};
use super::scope::{record_effect_scope, EffectScope};
use super::subscriber::SubscriberId;

/// Scheduler invoked instead of `run()` when a dependency changes.
pub type EffectScheduler = Rc<dyn Fn()>;

#[derive(Clone)]
pub struct ReactiveEffect {
    inner: Rc<EffectInner>,
}

struct EffectInner {
    id: SubscriberId,
    func: Box<dyn Fn()>,
    scheduler: RefCell<Option<EffectScheduler>>,
    active: Cell<bool>,
    deps: RefCell<SmallVec<[WeakDep; 4]>>,
    allow_recurse: Cell<bool>,
    defer_stop: Cell<bool>,
    computed: Cell<bool>,
    computed_trigger: RefCell<Option<Rc<dyn Fn()>>>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
    run_count: Cell<usize>,
}

/// Non-owning handle to an effect.
#[derive(Clone)]
pub struct WeakEffect(Weak<EffectInner>);

impl WeakEffect {
    pub fn upgrade(&self) -> Option<ReactiveEffect> {
        self.0.upgrade().map(|inner| ReactiveEffect { inner })
    }
}

impl ReactiveEffect {
    /// Creates an effect without running it. The effect joins the active
    /// [`EffectScope`], if there is one.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::new_in(f, None)
    }

    /// Creates an effect recorded in `scope` instead of the active scope.
    pub fn new_in<F>(f: F, scope: Option<&EffectScope>) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                func: Box::new(f),
                scheduler: RefCell::new(None),
                active: Cell::new(true),
                deps: RefCell::new(SmallVec::new()),
                allow_recurse: Cell::new(false),
                defer_stop: Cell::new(false),
                computed: Cell::new(false),
                computed_trigger: RefCell::new(None),
                on_stop: RefCell::new(None),
                run_count: Cell::new(0),
            }),
        };
        record_effect_scope(&effect, scope);
        effect
    }

    /// Creates an effect with a scheduler.
    pub fn with_scheduler<F, S>(f: F, scheduler: S) -> Self
    where
        F: Fn() + 'static,
        S: Fn() + 'static,
    {
        let effect = Self::new(f);
        effect.set_scheduler(Some(Rc::new(scheduler)));
        effect
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Runs the function, collecting dependencies.
    ///
    /// An inactive effect runs untracked. An effect that is already on the
    /// running stack is not re-entered.
    pub fn run(&self) {
        if !self.inner.active.get() {
            (self.inner.func)();
            return;
        }
        if context::is_running(self.id()) {
            return;
        }

        let _ctx = ReactiveContext::enter(self);
        self.inner.run_count.set(self.inner.run_count.get() + 1);
        tracing::trace!(effect = self.id().as_u64(), "running effect");
        (self.inner.func)();
    }

    /// Detaches the effect from all deps and calls its `on_stop` hook.
    pub fn stop(&self) {
        if context::is_active_effect(self) {
            self.inner.defer_stop.set(true);
        } else if self.inner.active.get() {
            cleanup_effect(self);
            let on_stop = self.inner.on_stop.borrow_mut().take();
            if let Some(on_stop) = on_stop {
                on_stop();
            }
            self.inner.active.set(false);
        }
    }

    pub(crate) fn take_deferred_stop(&self) -> bool {
        self.inner.defer_stop.replace(false)
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn scheduler(&self) -> Option<EffectScheduler> {
        self.inner.scheduler.borrow().clone()
    }

    pub fn set_scheduler(&self, scheduler: Option<EffectScheduler>) {
        *self.inner.scheduler.borrow_mut() = scheduler;
    }

    pub fn allow_recurse(&self) -> bool {
        self.inner.allow_recurse.get()
    }

    pub fn set_allow_recurse(&self, allow: bool) {
        self.inner.allow_recurse.set(allow);
    }

    pub fn set_on_stop<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        *self.inner.on_stop.borrow_mut() = Some(Box::new(f));
    }

    /// Number of deps currently subscribed to.
    pub fn dep_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    pub fn is_computed(&self) -> bool {
        self.inner.computed.get()
    }

    pub(crate) fn mark_computed(&self) {
        self.inner.computed.set(true);
    }

    /// Hook run synchronously when an upstream deferred computed changes.
    pub(crate) fn set_computed_trigger(&self, hook: Rc<dyn Fn()>) {
        *self.inner.computed_trigger.borrow_mut() = Some(hook);
    }

    pub(crate) fn computed_trigger(&self) -> Option<Rc<dyn Fn()>> {
        self.inner.computed_trigger.borrow().clone()
    }

    pub fn downgrade(&self) -> WeakEffect {
        WeakEffect(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &ReactiveEffect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ReactiveEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.inner.id)
            .field("active", &self.inner.active.get())
            .field("deps", &self.dep_count())
            .finish()
    }
}

/// Removes `effect` from every dep it is subscribed to.
pub(crate) fn cleanup_effect(effect: &ReactiveEffect) {
    let deps = std::mem::take(&mut *effect.inner.deps.borrow_mut());
    for dep in deps.iter().filter_map(WeakDep::upgrade) {
        dep.remove(effect.id());
    }
}

pub(crate) fn init_dep_markers(effect: &ReactiveEffect) {
    let bit = context::track_op_bit();
    for dep in effect.inner.deps.borrow().iter().filter_map(WeakDep::upgrade) {
        dep.mark_was_tracked(bit);
    }
}

pub(crate) fn finalize_dep_markers(effect: &ReactiveEffect) {
    let bit = context::track_op_bit();
    let mut deps = effect.inner.deps.borrow_mut();
    deps.retain(|weak| match weak.upgrade() {
        Some(dep) => {
            let stale = dep.was_tracked(bit) && !dep.new_tracked(bit);
            if stale {
                dep.remove(effect.id());
            }
            dep.clear_markers(bit);
            !stale
        }
        None => false,
    });
}

/// Subscribes the active effect to `dep`, if tracking is enabled.
pub fn track_effects(dep: &Dep) {
    if !context::is_tracking() {
        return;
    }
    let Some(effect) = context::active_effect() else {
        return;
    };

    let should_track = if context::track_depth() <= context::max_marker_bits() {
        let bit = context::track_op_bit();
        if dep.new_tracked(bit) {
            false
        } else {
            dep.mark_new_tracked(bit);
            !dep.was_tracked(bit)
        }
    } else {
        !dep.contains(&effect)
    };

    if should_track {
        dep.insert(&effect);
        effect.inner.deps.borrow_mut().push(dep.downgrade());
    }
}

/// Notifies `effects`: computed-backed ones first, then the rest.
pub fn trigger_effects(effects: Vec<ReactiveEffect>) {
    let (computed, plain): (Vec<_>, Vec<_>) =
        effects.into_iter().partition(ReactiveEffect::is_computed);
    for effect in computed.iter().chain(plain.iter()) {
        trigger_effect(effect);
    }
}

fn trigger_effect(effect: &ReactiveEffect) {
    if context::is_active_effect(effect) && !effect.allow_recurse() {
        return;
    }
    match effect.scheduler() {
        Some(scheduler) => scheduler(),
        None => effect.run(),
    }
}

// ----------------------------------------------------------------------------
// effect() API
// ----------------------------------------------------------------------------

/// Options for [`effect_with`].
#[derive(Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    pub scheduler: Option<EffectScheduler>,
    /// Scope to record the effect in, instead of the active one.
    pub scope: Option<EffectScope>,
    pub allow_recurse: bool,
    pub on_stop: Option<Box<dyn FnOnce()>>,
}

/// Callable handle returned by [`effect`].
#[derive(Clone)]
pub struct EffectRunner {
    effect: ReactiveEffect,
}

impl EffectRunner {
    pub fn run(&self) {
        self.effect.run();
    }

    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.effect
    }
}

/// Creates an effect and runs it immediately.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0);
/// let c = count.clone();
/// let runner = effect(move || println!("count is {}", c.get()));
/// count.set(5); // prints "count is 5"
/// ```
pub fn effect<F>(f: F) -> EffectRunner
where
    F: Fn() + 'static,
{
    effect_with(f, EffectOptions::default())
}

pub fn effect_with<F>(f: F, options: EffectOptions) -> EffectRunner
where
    F: Fn() + 'static,
{
    let effect = ReactiveEffect::new_in(f, options.scope.as_ref());
    effect.set_scheduler(options.scheduler);
    effect.set_allow_recurse(options.allow_recurse);
    if let Some(on_stop) = options.on_stop {
        *effect.inner.on_stop.borrow_mut() = Some(on_stop);
    }
    if !options.lazy {
        effect.run();
    }
    EffectRunner { effect }
}

/// Stops the effect behind `runner`.
pub fn stop(runner: &EffectRunner) {
    runner.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
