//! Ticks, microtasks and timers.
//!
//! There is no ambient event loop, so the scheduler models one:
//!
//! - **microtasks** are callbacks run at the next checkpoint, before any
//!   queued job ([`queue_microtask`], [`run_microtasks`]);
//! - **timers** fire against a virtual clock that only moves when
//!   [`advance_timers`] is called;
//! - the **flush loop** ([`spawn_flush_loop`]) is a tokio task on the
//!   current `LocalSet` that flushes whenever work is queued and advances
//!   the timer clock in real time.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::Error;

struct Timer {
    id: u64,
    due: Duration,
    callback: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct TickState {
    microtasks: VecDeque<Box<dyn FnOnce()>>,
    now: Duration,
    next_timer_id: u64,
    timers: Vec<Timer>,
}

thread_local! {
    static TICK: RefCell<TickState> = RefCell::new(TickState::default());
    static WAKE: Rc<Notify> = Rc::new(Notify::new());
}

pub(super) fn wake_flush_loop() {
    WAKE.with(|wake| wake.notify_one());
}

pub(super) fn reset() {
    TICK.with(|t| *t.borrow_mut() = TickState::default());
}

/// Queues `f` to run at the next checkpoint.
pub fn queue_microtask(f: impl FnOnce() + 'static) {
    TICK.with(|t| t.borrow_mut().microtasks.push_back(Box::new(f)));
    wake_flush_loop();
}

/// Runs queued microtasks, including ones they queue, until none remain.
pub fn run_microtasks() {
    loop {
        let task = TICK.with(|t| t.borrow_mut().microtasks.pop_front());
        match task {
            Some(task) => task(),
            None => break,
        }
    }
}

/// Handle for cancelling a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Runs `f` once the timer clock has advanced by `delay`.
pub fn set_timeout(delay: Duration, f: impl FnOnce() + 'static) -> TimerId {
    let id = TICK.with(|t| {
        let mut t = t.borrow_mut();
        t.next_timer_id += 1;
        let id = t.next_timer_id;
        let due = t.now + delay;
        t.timers.push(Timer {
            id,
            due,
            callback: Box::new(f),
        });
        id
    });
    wake_flush_loop();
    TimerId(id)
}

pub fn clear_timeout(id: TimerId) {
    TICK.with(|t| t.borrow_mut().timers.retain(|timer| timer.id != id.0));
}

/// Moves the timer clock forward by `by`, firing due timers in due order.
/// Returns how many fired.
pub fn advance_timers(by: Duration) -> usize {
    let target = TICK.with(|t| t.borrow().now + by);
    let mut fired = 0;
    loop {
        let next = TICK.with(|t| {
            let mut t = t.borrow_mut();
            let index = t
                .timers
                .iter()
                .enumerate()
                .filter(|(_, timer)| timer.due <= target)
                .min_by_key(|(_, timer)| (timer.due, timer.id))
                .map(|(i, _)| i)?;
            let timer = t.timers.remove(index);
            t.now = t.now.max(timer.due);
            Some(timer)
        });
        match next {
            Some(timer) => {
                (timer.callback)();
                fired += 1;
            }
            None => break,
        }
    }
    TICK.with(|t| t.borrow_mut().now = target);
    fired
}

fn next_timer_delay() -> Option<Duration> {
    TICK.with(|t| {
        let t = t.borrow();
        t.timers.iter().map(|timer| timer.due.saturating_sub(t.now)).min()
    })
}

/// Yields once, then runs the pending flush. Resolves after the batch of
/// updates queued so far has been applied.
pub async fn next_tick() -> Result<(), Error> {
    tokio::task::yield_now().await;
    super::flush()
}

/// Spawns the flush loop on the current `LocalSet`.
///
/// The loop flushes whenever work is queued and fires timers as real time
/// passes. Errors from a flush are logged.
pub fn spawn_flush_loop() -> JoinHandle<()> {
    let wake = WAKE.with(Rc::clone);
    tokio::task::spawn_local(async move {
        loop {
            let started = tokio::time::Instant::now();
            match next_timer_delay() {
                Some(delay) => {
                    tokio::select! {
                        _ = wake.notified() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                    advance_timers(started.elapsed());
                }
                None => wake.notified().await,
            }
            if let Err(err) = super::flush() {
                tracing::error!(error = %err, "flush failed");
            }
        }
    })
}
