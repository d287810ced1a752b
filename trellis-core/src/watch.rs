//! Watchers
//!
//! [`watch`] runs a callback when a source changes; [`watch_effect`] re-runs
//! a function whenever anything it read changes. Both are built on a
//! [`ReactiveEffect`] whose scheduler decides *when* the re-run happens:
//!
//! - [`WatchFlush::Pre`] (default): queued as a pre-flush callback, so it
//!   observes new state before components re-render.
//! - [`WatchFlush::Post`]: queued after the render, held back by a pending
//!   suspense boundary.
//! - [`WatchFlush::Sync`]: runs inside the trigger.
//!
//! Watchers created during component setup belong to the component's
//! effect scope and stop when it unmounts.
//!
//! # Example
//!
//! ```rust,ignore
//! let count = Ref::new(Value::from(0));
//! let handle = watch(&count, |new, old, _| {
//!     println!("{old:?} -> {new:?}");
//! }, WatchOptions::default());
//! count.set(Value::from(1));
//! scheduler::flush()?; // prints "Number(0.0) -> Number(1.0)"
//! handle.stop();
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::builtins::suspense::queue_effect_with_suspense;
use crate::component::{get_current_instance, ComponentInstance, WeakInstance};
use crate::error::{call_with_error_handling, CallResult, ErrorKind, IntoCallResult};
use crate::reactive::{has_changed, Reactive, ReactiveEffect, Ref, TargetId, TargetKind, Value};
use crate::scheduler::{queue_pre_flush_cb, Job};

/// When a triggered watcher runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchFlush {
    #[default]
    Pre,
    Post,
    Sync,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Run the callback once right away.
    pub immediate: bool,
    /// Traverse the source so nested changes trigger too.
    pub deep: bool,
    pub flush: WatchFlush,
}

/// What a [`watch`] observes.
#[derive(Clone)]
pub enum WatchSource {
    Ref(Ref<Value>),
    /// A reactive object, watched deeply.
    Reactive(Reactive),
    Getter(Rc<dyn Fn() -> CallResult<Value>>),
    /// Several sources; the callback receives arrays of their values.
    Many(Vec<WatchSource>),
}

impl WatchSource {
    pub fn getter<F, R>(f: F) -> Self
    where
        F: Fn() -> R + 'static,
        R: IntoCallResult<Value>,
    {
        WatchSource::Getter(Rc::new(move || f().into_call_result()))
    }
}

impl From<Ref<Value>> for WatchSource {
    fn from(r: Ref<Value>) -> Self {
        WatchSource::Ref(r)
    }
}

impl From<&Ref<Value>> for WatchSource {
    fn from(r: &Ref<Value>) -> Self {
        WatchSource::Ref(r.clone())
    }
}

impl From<Reactive> for WatchSource {
    fn from(object: Reactive) -> Self {
        WatchSource::Reactive(object)
    }
}

impl From<&Reactive> for WatchSource {
    fn from(object: &Reactive) -> Self {
        WatchSource::Reactive(object.clone())
    }
}

impl From<Vec<WatchSource>> for WatchSource {
    fn from(sources: Vec<WatchSource>) -> Self {
        WatchSource::Many(sources)
    }
}

type CleanupSlot = Rc<RefCell<Option<Box<dyn FnOnce() -> CallResult>>>>;

/// Registers a function to run before the watcher's next run, or when it
/// stops.
pub struct OnCleanup {
    slot: CleanupSlot,
}

impl OnCleanup {
    pub fn register<F, R>(&self, f: F)
    where
        F: FnOnce() -> R + 'static,
        R: IntoCallResult<()>,
    {
        *self.slot.borrow_mut() = Some(Box::new(move || f().into_call_result()));
    }
}

fn run_cleanup(slot: &CleanupSlot, instance: Option<&WeakInstance>) {
    let cleanup = slot.borrow_mut().take();
    if let Some(cleanup) = cleanup {
        let owner = instance.and_then(WeakInstance::upgrade);
        let _: Option<()> = call_with_error_handling(ErrorKind::WatchCleanup, owner.as_ref(), cleanup);
    }
}

/// Stops a watcher.
pub struct WatchHandle {
    effect: ReactiveEffect,
    instance: Option<WeakInstance>,
}

impl WatchHandle {
    pub fn stop(&self) {
        self.effect.stop();
        if let Some(instance) = self.instance.as_ref().and_then(WeakInstance::upgrade) {
            instance.scope().remove_effect(&self.effect);
        }
    }

    pub fn effect(&self) -> &ReactiveEffect {
        &self.effect
    }
}

/// Reads every nested property of `value` so that all of them are tracked.
pub(crate) fn traverse(value: &Value, seen: &mut HashSet<TargetId>) {
    match value {
        Value::Ref(r) => traverse(&r.get(), seen),
        Value::Proxy(object) => {
            if !seen.insert(object.raw().id()) {
                return;
            }
            for item in object.values() {
                traverse(&item, seen);
            }
        }
        Value::Object(raw) => {
            if raw.is_marked_raw() || !seen.insert(raw.id()) {
                return;
            }
            match raw.kind() {
                TargetKind::Set | TargetKind::WeakSet => {
                    for item in raw.keys() {
                        traverse(&item, seen);
                    }
                }
                _ => {
                    for key in raw.keys() {
                        traverse(&raw.get(key), seen);
                    }
                }
            }
        }
        _ => {}
    }
}

fn read_source(source: &WatchSource, instance: Option<&WeakInstance>) -> Value {
    match source {
        WatchSource::Ref(r) => r.get(),
        WatchSource::Reactive(object) => {
            let value = Value::Proxy(object.clone());
            traverse(&value, &mut HashSet::new());
            value
        }
        WatchSource::Getter(f) => {
            let owner = instance.and_then(WeakInstance::upgrade);
            call_with_error_handling(ErrorKind::WatchGetter, owner.as_ref(), || f()).unwrap_or_default()
        }
        WatchSource::Many(sources) => {
            Value::array(sources.iter().map(|s| read_source(s, instance)).collect::<Vec<_>>())
        }
    }
}

/// Values compared to decide whether the callback runs.
fn snapshot(value: &Value, multi: bool) -> Vec<Value> {
    match (multi, value) {
        (true, Value::Object(raw)) => raw.keys().into_iter().map(|k| raw.get(k)).collect(),
        _ => vec![value.clone()],
    }
}

fn any_changed(new: &[Value], old: &[Value]) -> bool {
    new.len() != old.len() || new.iter().zip(old).any(|(n, o)| has_changed(n, o))
}

fn scheduler_for(flush: WatchFlush, job: Job, instance: Option<&ComponentInstance>) -> Rc<dyn Fn()> {
    match flush {
        WatchFlush::Sync => Rc::new(move || {
            let _: CallResult = job.run();
        }),
        WatchFlush::Post => {
            let owner = instance.map(ComponentInstance::downgrade);
            Rc::new(move || {
                let owner = owner.as_ref().and_then(WeakInstance::upgrade);
                let suspense = owner.as_ref().and_then(|o| o.suspense().cloned());
                queue_effect_with_suspense(job.clone(), suspense.as_ref());
            })
        }
        WatchFlush::Pre => {
            let owner = instance.map(ComponentInstance::downgrade);
            Rc::new(move || match owner.as_ref().and_then(WeakInstance::upgrade) {
                // Not mounted yet: run inline.
                Some(owner) if !owner.is_mounted() => {
                    let _: CallResult = job.run();
                }
                _ => queue_pre_flush_cb(job.clone()),
            })
        }
    }
}

fn job_for(instance: Option<&ComponentInstance>, label: &str, f: impl Fn() + 'static) -> Job {
    match instance {
        Some(instance) => Job::with_id(instance.uid(), f).labelled(format!("{label} in {}", instance.uid())),
        None => Job::new(f).labelled(label),
    }
}

/// Calls `cb(new, old, on_cleanup)` whenever `source` changes.
///
/// The first call passes `Undefined` (or an empty array, for several
/// sources) as the old value.
pub fn watch<S, F, R>(source: S, cb: F, options: WatchOptions) -> WatchHandle
where
    S: Into<WatchSource>,
    F: Fn(&Value, &Value, &OnCleanup) -> R + 'static,
    R: IntoCallResult<()>,
{
    let source = source.into();
    let instance = get_current_instance();
    let weak_instance = instance.as_ref().map(ComponentInstance::downgrade);

    let (deep, force_trigger, multi) = match &source {
        WatchSource::Ref(r) => (options.deep, r.is_shallow(), false),
        WatchSource::Reactive(_) => (true, false, false),
        WatchSource::Getter(_) => (options.deep, false, false),
        WatchSource::Many(sources) => (
            options.deep,
            sources.iter().any(|s| matches!(s, WatchSource::Reactive(_))),
            true,
        ),
    };

    let output = Rc::new(RefCell::new(Value::Undefined));
    let effect = {
        let output = Rc::clone(&output);
        let owner = weak_instance.clone();
        ReactiveEffect::new(move || {
            let value = read_source(&source, owner.as_ref());
            if deep {
                traverse(&value, &mut HashSet::new());
            }
            *output.borrow_mut() = value;
        })
    };

    let cleanup: CleanupSlot = Rc::new(RefCell::new(None));
    {
        let slot = Rc::clone(&cleanup);
        let owner = weak_instance.clone();
        effect.set_on_stop(move || run_cleanup(&slot, owner.as_ref()));
    }

    let initial = if multi { Value::array(Vec::<Value>::new()) } else { Value::Undefined };
    let old_value = Rc::new(RefCell::new(initial));
    let cb: Rc<dyn Fn(&Value, &Value, &OnCleanup) -> CallResult> =
        Rc::new(move |new: &Value, old: &Value, on_cleanup: &OnCleanup| cb(new, old, on_cleanup).into_call_result());

    let (primed_output, primed_old) = (Rc::clone(&output), Rc::clone(&old_value));
    let job = {
        let weak_effect = effect.downgrade();
        let owner = weak_instance.clone();
        job_for(instance.as_ref(), "watch", move || {
            let Some(effect) = weak_effect.upgrade().filter(ReactiveEffect::is_active) else {
                return;
            };
            effect.run();
            let new_value = output.borrow().clone();
            let changed = {
                let old = old_value.borrow();
                deep || force_trigger || any_changed(&snapshot(&new_value, multi), &snapshot(&old, multi))
            };
            if !changed {
                return;
            }
            run_cleanup(&cleanup, owner.as_ref());
            let old = old_value.replace(new_value.clone());
            let on_cleanup = OnCleanup {
                slot: Rc::clone(&cleanup),
            };
            let instance = owner.as_ref().and_then(WeakInstance::upgrade);
            let _: Option<()> = call_with_error_handling(ErrorKind::WatchCallback, instance.as_ref(), || {
                cb(&new_value, &old, &on_cleanup)
            });
        })
    };
    job.set_allow_recurse(true);
    effect.set_scheduler(Some(scheduler_for(options.flush, job.clone(), instance.as_ref())));

    if options.immediate {
        let _: CallResult = job.run();
    } else {
        effect.run();
        let first = primed_output.borrow().clone();
        *primed_old.borrow_mut() = first;
    }

    WatchHandle {
        effect,
        instance: weak_instance,
    }
}

/// Runs `f` now and again whenever anything it read changes, before the
/// next render.
pub fn watch_effect<F, R>(f: F) -> WatchHandle
where
    F: Fn(&OnCleanup) -> R + 'static,
    R: IntoCallResult<()>,
{
    do_watch_effect(f, WatchFlush::Pre)
}

/// Like [`watch_effect`], flushed after the render.
pub fn watch_post_effect<F, R>(f: F) -> WatchHandle
where
    F: Fn(&OnCleanup) -> R + 'static,
    R: IntoCallResult<()>,
{
    do_watch_effect(f, WatchFlush::Post)
}

/// Like [`watch_effect`], re-run synchronously on every change.
pub fn watch_sync_effect<F, R>(f: F) -> WatchHandle
where
    F: Fn(&OnCleanup) -> R + 'static,
    R: IntoCallResult<()>,
{
    do_watch_effect(f, WatchFlush::Sync)
}

fn do_watch_effect<F, R>(f: F, flush: WatchFlush) -> WatchHandle
where
    F: Fn(&OnCleanup) -> R + 'static,
    R: IntoCallResult<()>,
{
    let instance = get_current_instance();
    let weak_instance = instance.as_ref().map(ComponentInstance::downgrade);
    let cleanup: CleanupSlot = Rc::new(RefCell::new(None));

    let effect = {
        let cleanup = Rc::clone(&cleanup);
        let owner = weak_instance.clone();
        ReactiveEffect::new(move || {
            let instance = owner.as_ref().and_then(WeakInstance::upgrade);
            if instance.as_ref().is_some_and(ComponentInstance::is_unmounted) {
                return;
            }
            run_cleanup(&cleanup, owner.as_ref());
            let on_cleanup = OnCleanup {
                slot: Rc::clone(&cleanup),
            };
            let _: Option<()> = call_with_error_handling(ErrorKind::WatchCallback, instance.as_ref(), || {
                f(&on_cleanup).into_call_result()
            });
        })
    };
    {
        let slot = Rc::clone(&cleanup);
        let owner = weak_instance.clone();
        effect.set_on_stop(move || run_cleanup(&slot, owner.as_ref()));
    }

    let job = {
        let weak_effect = effect.downgrade();
        job_for(instance.as_ref(), "watch effect", move || {
            if let Some(effect) = weak_effect.upgrade().filter(ReactiveEffect::is_active) {
                effect.run();
            }
        })
    };
    effect.set_scheduler(Some(scheduler_for(flush, job.clone(), instance.as_ref())));

    if flush == WatchFlush::Post {
        let suspense = instance.as_ref().and_then(|i| i.suspense().cloned());
        queue_effect_with_suspense(job, suspense.as_ref());
    } else {
        effect.run();
    }

    WatchHandle {
        effect,
        instance: weak_instance,
    }
}
