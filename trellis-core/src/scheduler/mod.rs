//! Job Scheduler
//!
//! The scheduler batches work triggered by reactive changes into a single
//! flush, so that many mutations within one tick cause one update per
//! component.
//!
//! # Queues
//!
//! - **pre-flush**: watcher callbacks that must observe state before the
//!   components re-render.
//! - **main**: component update jobs, kept sorted by job id. Ids follow
//!   component creation order, so a parent always updates before its
//!   children, and a child unmounted by its parent's update is skipped.
//! - **post-flush**: lifecycle hooks and post watchers that must observe
//!   the settled tree.
//!
//! # Flushing
//!
//! Queuing any job marks a flush as pending and wakes the flush loop
//! (see [`spawn_flush_loop`]). Without a loop, [`flush`] is the explicit
//! microtask checkpoint. A flush:
//!
//! 1. drains the pre-flush queue until it stays empty,
//! 2. sorts and runs the main queue,
//! 3. runs the post-flush queue, deduplicated and sorted by id,
//! 4. starts over if any queue gained entries meanwhile.
//!
//! Each job may run at most `recursion_limit` times within one flush; past
//! that it is reported and skipped.

mod tick;

pub use tick::{
    advance_timers, clear_timeout, next_tick, queue_microtask, run_microtasks, set_timeout, spawn_flush_loop,
    TimerId,
};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::config;
use crate::error::{call_with_error_handling, handle_error, take_unhandled, CallResult, Error, ErrorKind, IntoCallResult};

/// A schedulable unit of work.
///
/// Jobs compare by identity: queuing the same job twice before it runs
/// queues it once.
#[derive(Clone)]
pub struct Job {
    inner: Rc<JobInner>,
}

struct JobInner {
    id: Option<u64>,
    active: Cell<bool>,
    allow_recurse: Cell<bool>,
    label: String,
    func: Box<dyn Fn() -> CallResult>,
}

impl Job {
    /// A job without an ordering id; it runs after every job that has one.
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn() -> R + 'static,
        R: IntoCallResult<()>,
    {
        Self::build(None, f)
    }

    /// A job ordered by `id` within the main queue.
    pub fn with_id<F, R>(id: u64, f: F) -> Self
    where
        F: Fn() -> R + 'static,
        R: IntoCallResult<()>,
    {
        Self::build(Some(id), f)
    }

    fn build<F, R>(id: Option<u64>, f: F) -> Self
    where
        F: Fn() -> R + 'static,
        R: IntoCallResult<()>,
    {
        Self {
            inner: Rc::new(JobInner {
                id,
                active: Cell::new(true),
                allow_recurse: Cell::new(false),
                label: String::from("job"),
                func: Box::new(move || f().into_call_result()),
            }),
        }
    }

    /// Names the job in recursion-limit reports.
    pub fn labelled(self, label: impl Into<String>) -> Self {
        match Rc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.label = label.into();
                Self { inner: Rc::new(inner) }
            }
            Err(inner) => Self { inner },
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Inactive jobs stay queued but are skipped when reached.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn set_active(&self, active: bool) {
        self.inner.active.set(active);
    }

    pub fn allow_recurse(&self) -> bool {
        self.inner.allow_recurse.get()
    }

    pub fn set_allow_recurse(&self, allow: bool) {
        self.inner.allow_recurse.set(allow);
    }

    /// Runs the job directly, outside any queue.
    pub fn run(&self) -> CallResult {
        (self.inner.func)()
    }

    pub fn ptr_eq(&self, other: &Job) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    fn sort_id(&self) -> u64 {
        self.inner.id.unwrap_or(u64::MAX)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("active", &self.inner.active.get())
            .finish()
    }
}

#[derive(Default)]
struct QueueState {
    queue: Vec<Job>,
    flush_index: usize,
    pending_pre: Vec<Job>,
    active_pre: Option<Vec<Job>>,
    pending_post: Vec<Job>,
    active_post: Option<Vec<Job>>,
    is_flushing: bool,
    is_flush_pending: bool,
    current_pre_parent: Option<Job>,
}

thread_local! {
    static QUEUE: RefCell<QueueState> = RefCell::new(QueueState::default());
}

/// Per-flush run counts, keyed by job identity.
type Seen = HashMap<usize, u32>;

fn with_queue<R>(f: impl FnOnce(&mut QueueState) -> R) -> R {
    QUEUE.with(|q| f(&mut q.borrow_mut()))
}

fn contains_from(jobs: &[Job], job: &Job, start: usize) -> bool {
    jobs.iter().skip(start).any(|j| j.ptr_eq(job))
}

/// Adds `job` to the main queue, in id order.
pub fn queue_job(job: Job) {
    let queued = with_queue(|q| {
        let start = if q.is_flushing && job.allow_recurse() {
            q.flush_index + 1
        } else {
            q.flush_index
        };
        let is_parent = q.current_pre_parent.as_ref().is_some_and(|p| p.ptr_eq(&job));
        if contains_from(&q.queue, &job, start) || is_parent {
            return false;
        }
        match job.id() {
            None => q.queue.push(job),
            Some(id) => {
                let index = find_insertion_index(q, id);
                q.queue.insert(index, job);
            }
        }
        true
    });
    if queued {
        queue_flush();
    }
}

/// First position after the running job whose id is not below `id`.
fn find_insertion_index(q: &QueueState, id: u64) -> usize {
    let mut start = if q.is_flushing { q.flush_index + 1 } else { 0 };
    let mut end = q.queue.len();
    while start < end {
        let middle = (start + end) / 2;
        if q.queue[middle].sort_id() < id {
            start = middle + 1;
        } else {
            end = middle;
        }
    }
    start
}

/// Removes a queued job that has not started yet.
pub fn invalidate_job(job: &Job) {
    with_queue(|q| {
        if let Some(index) = q.queue.iter().position(|j| j.ptr_eq(job)) {
            if index > q.flush_index || (!q.is_flushing && index >= q.flush_index) {
                q.queue.remove(index);
            }
        }
    });
}

pub fn queue_pre_flush_cb(job: Job) {
    let queued = with_queue(|q| {
        let already_active = q
            .active_pre
            .as_ref()
            .is_some_and(|active| contains_from(active, &job, 0) && !job.allow_recurse());
        if already_active {
            return false;
        }
        q.pending_pre.push(job);
        true
    });
    if queued {
        queue_flush();
    }
}

pub fn queue_post_flush_cb(job: Job) {
    queue_post_flush_cbs([job]);
}

/// Queues several post-flush callbacks. Callbacks already running in the
/// current post flush are not queued again.
pub fn queue_post_flush_cbs(jobs: impl IntoIterator<Item = Job>) {
    with_queue(|q| {
        for job in jobs {
            let already_active = q
                .active_post
                .as_ref()
                .is_some_and(|active| contains_from(active, &job, 0) && !job.allow_recurse());
            if !already_active {
                q.pending_post.push(job);
            }
        }
    });
    queue_flush();
}

fn queue_flush() {
    let wake = with_queue(|q| {
        if q.is_flushing || q.is_flush_pending {
            false
        } else {
            q.is_flush_pending = true;
            true
        }
    });
    if wake {
        tick::wake_flush_loop();
    }
}

/// Whether a flush is pending or running.
pub fn has_pending_flush() -> bool {
    with_queue(|q| q.is_flush_pending || q.is_flushing)
}

pub fn is_flushing() -> bool {
    with_queue(|q| q.is_flushing)
}

fn dedup(jobs: Vec<Job>) -> Vec<Job> {
    let mut out: Vec<Job> = Vec::with_capacity(jobs.len());
    for job in jobs {
        if !out.iter().any(|j| j.ptr_eq(&job)) {
            out.push(job);
        }
    }
    out
}

fn exceeds_recursion_limit(seen: &mut Seen, job: &Job) -> bool {
    let limit = config::with_config(|cfg| cfg.recursion_limit);
    let count = seen.entry(job.key()).or_insert(0);
    if *count > limit {
        handle_error(
            Error::RecursionLimit {
                job: job.label().to_string(),
                limit,
            },
            None,
            true,
        );
        return true;
    }
    *count += 1;
    false
}

fn run_job(job: &Job) {
    let _: Option<()> = call_with_error_handling(ErrorKind::Scheduler, None, || job.run());
}

/// Runs pending pre-flush callbacks until none remain.
///
/// `parent_job` is the update job that triggered this drain; it cannot be
/// re-queued by the callbacks it runs.
pub fn flush_pre_flush_cbs(parent_job: Option<&Job>) {
    flush_pre_flush_cbs_with(&mut Seen::new(), parent_job);
}

fn flush_pre_flush_cbs_with(seen: &mut Seen, parent_job: Option<&Job>) {
    loop {
        let batch = with_queue(|q| {
            if q.pending_pre.is_empty() {
                return None;
            }
            q.current_pre_parent = parent_job.cloned();
            let batch = dedup(std::mem::take(&mut q.pending_pre));
            q.active_pre = Some(batch.clone());
            Some(batch)
        });
        let Some(batch) = batch else {
            return;
        };
        for job in &batch {
            if exceeds_recursion_limit(seen, job) {
                continue;
            }
            run_job(job);
        }
        with_queue(|q| {
            q.active_pre = None;
            q.current_pre_parent = None;
        });
    }
}

/// Runs pending post-flush callbacks in id order.
///
/// When called while a post flush is already running, the new callbacks
/// join the running batch.
pub fn flush_post_flush_cbs() {
    flush_post_flush_cbs_with(&mut Seen::new());
}

fn flush_post_flush_cbs_with(seen: &mut Seen) {
    let started = with_queue(|q| {
        if q.pending_post.is_empty() {
            return false;
        }
        let mut batch = dedup(std::mem::take(&mut q.pending_post));
        if let Some(active) = q.active_post.as_mut() {
            active.extend(batch);
            return false;
        }
        batch.sort_by_key(Job::sort_id);
        q.active_post = Some(batch);
        true
    });
    if !started {
        return;
    }

    let mut index = 0;
    loop {
        let job = with_queue(|q| q.active_post.as_ref().and_then(|active| active.get(index).cloned()));
        let Some(job) = job else {
            break;
        };
        index += 1;
        if exceeds_recursion_limit(seen, &job) {
            continue;
        }
        run_job(&job);
    }
    with_queue(|q| q.active_post = None);
}

fn flush_jobs(seen: &mut Seen) {
    let _span = tracing::debug_span!("flush_jobs").entered();
    with_queue(|q| {
        q.is_flush_pending = false;
        q.is_flushing = true;
    });

    flush_pre_flush_cbs_with(seen, None);

    with_queue(|q| {
        q.queue.sort_by_key(Job::sort_id);
        q.flush_index = 0;
    });
    loop {
        let job = with_queue(|q| q.queue.get(q.flush_index).cloned());
        let Some(job) = job else {
            break;
        };
        if job.is_active() && !exceeds_recursion_limit(seen, &job) {
            tracing::trace!(job = ?job.id(), "running job");
            run_job(&job);
        }
        with_queue(|q| q.flush_index += 1);
    }
    with_queue(|q| {
        q.flush_index = 0;
        q.queue.clear();
    });

    flush_post_flush_cbs_with(seen);

    let again = with_queue(|q| {
        q.is_flushing = false;
        !q.queue.is_empty() || !q.pending_pre.is_empty() || !q.pending_post.is_empty()
    });
    if again {
        flush_jobs(seen);
    }
}

/// The microtask checkpoint: runs queued microtasks and any pending flush
/// until no work remains.
///
/// Returns the first unhandled error raised by the work it ran. Called
/// from inside a running flush, it does nothing.
pub fn flush() -> Result<(), Error> {
    if is_flushing() {
        return Ok(());
    }
    loop {
        run_microtasks();
        let pending = with_queue(|q| std::mem::replace(&mut q.is_flush_pending, false) || !q.queue.is_empty());
        if !pending {
            break;
        }
        flush_jobs(&mut Seen::new());
    }
    take_unhandled()
}

/// Drops all queued work. Used to isolate tests.
pub fn reset() {
    with_queue(|q| *q = QueueState::default());
    tick::reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn logging_job(log: &Rc<RefCell<Vec<&'static str>>>, id: Option<u64>, name: &'static str) -> Job {
        let log = log.clone();
        let f = move || log.borrow_mut().push(name);
        match id {
            Some(id) => Job::with_id(id, f),
            None => Job::new(f),
        }
    }

    #[test]
    fn jobs_run_in_id_order() {
        reset();
        let log = recorder();
        queue_job(logging_job(&log, Some(3), "c"));
        queue_job(logging_job(&log, None, "none"));
        queue_job(logging_job(&log, Some(1), "a"));
        queue_job(logging_job(&log, Some(2), "b"));

        flush().unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b", "c", "none"]);
    }

    #[test]
    fn duplicate_jobs_run_once() {
        reset();
        let log = recorder();
        let job = logging_job(&log, Some(1), "a");
        queue_job(job.clone());
        queue_job(job);
        flush().unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn invalidated_job_is_skipped() {
        reset();
        let log = recorder();
        let parent_log = log.clone();
        let child = logging_job(&log, Some(2), "child");
        let child_clone = child.clone();
        let parent = Job::with_id(1, move || {
            parent_log.borrow_mut().push("parent");
            invalidate_job(&child_clone);
        });

        queue_job(child);
        queue_job(parent);
        flush().unwrap();
        assert_eq!(*log.borrow(), vec!["parent"]);
    }

    #[test]
    fn pre_main_post_ordering() {
        reset();
        let log = recorder();
        queue_post_flush_cb(logging_job(&log, None, "post"));
        queue_job(logging_job(&log, Some(1), "main"));
        queue_pre_flush_cb(logging_job(&log, None, "pre"));
        flush().unwrap();
        assert_eq!(*log.borrow(), vec!["pre", "main", "post"]);
    }

    #[test]
    fn jobs_queued_during_flush_run_in_same_flush() {
        reset();
        let log = recorder();
        let late = logging_job(&log, Some(5), "late");
        let inner_log = log.clone();
        let early = Job::with_id(1, move || {
            inner_log.borrow_mut().push("early");
            queue_job(late.clone());
        });
        queue_job(early);
        flush().unwrap();
        assert_eq!(*log.borrow(), vec!["early", "late"]);
        assert!(!has_pending_flush());
    }

    #[test]
    fn post_flush_cbs_sorted_and_deduped() {
        reset();
        let log = recorder();
        let b = logging_job(&log, Some(2), "b");
        queue_post_flush_cbs([b.clone(), logging_job(&log, Some(1), "a"), b]);
        flush_post_flush_cbs();
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn self_requeue_hits_recursion_limit() {
        reset();
        config::reset();
        config::configure(|cfg| cfg.recursion_limit = 5);
        let runs = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Job>>> = Rc::new(RefCell::new(None));
        let (r, s) = (runs.clone(), slot.clone());
        let job = Job::with_id(1, move || {
            r.set(r.get() + 1);
            if let Some(me) = s.borrow().clone() {
                queue_job(me);
            }
        })
        .labelled("looping");
        job.set_allow_recurse(true);
        *slot.borrow_mut() = Some(job.clone());

        queue_job(job);
        let err = flush().unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { limit: 5, .. }));
        assert_eq!(runs.get(), 6);
        slot.borrow_mut().take();
        config::reset();
    }

    #[test]
    fn failing_job_does_not_stop_flush() {
        reset();
        config::reset();
        let log = recorder();
        queue_job(Job::with_id(1, || -> CallResult { Err("boom".into()) }));
        queue_job(logging_job(&log, Some(2), "after"));
        let err = flush().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Scheduler));
        assert_eq!(*log.borrow(), vec!["after"]);
    }

    #[test]
    fn inactive_jobs_are_skipped() {
        reset();
        let log = recorder();
        let job = logging_job(&log, Some(1), "x");
        job.set_active(false);
        queue_job(job);
        flush().unwrap();
        assert!(log.borrow().is_empty());
    }
}
