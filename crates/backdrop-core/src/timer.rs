//! Timer abstraction
//!
//! Polls and timeouts are owned through [`TimerHandle`]s so that the owner
//! can always cancel them on success or teardown.

use std::rc::Rc;
use std::time::Duration;

/// Identifier of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Event-loop timer source (`setInterval` / `setTimeout` in browsers)
pub trait Scheduler {
    /// Run `tick` every `period` until cleared
    fn set_interval(&self, period: Duration, tick: Box<dyn FnMut()>) -> TimerId;

    /// Run `fire` once after `delay` unless cleared first
    fn set_timeout(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> TimerId;

    /// Cancel a timer; unknown or already-fired ids are ignored
    fn clear(&self, id: TimerId);
}

/// Owning handle to a scheduled timer. Dropping it cancels the timer.
pub struct TimerHandle {
    id: TimerId,
    scheduler: Rc<dyn Scheduler>,
}

impl TimerHandle {
    pub fn interval(scheduler: &Rc<dyn Scheduler>, period: Duration, tick: impl FnMut() + 'static) -> Self {
        let id = scheduler.set_interval(period, Box::new(tick));
        Self {
            id,
            scheduler: Rc::clone(scheduler),
        }
    }

    pub fn timeout(scheduler: &Rc<dyn Scheduler>, delay: Duration, fire: impl FnOnce() + 'static) -> Self {
        let id = scheduler.set_timeout(delay, Box::new(fire));
        Self {
            id,
            scheduler: Rc::clone(scheduler),
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Cancel the timer now
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.scheduler.clear(self.id);
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TimerHandle").field(&self.id).finish()
    }
}
