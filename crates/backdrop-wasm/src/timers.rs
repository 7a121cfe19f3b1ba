//! `window.setInterval` / `window.setTimeout` scheduler

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use backdrop_core::{Scheduler, TimerId};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

enum Kind {
    Interval,
    Timeout,
}

struct BrowserTimer {
    handle: i32,
    kind: Kind,
    // Must outlive the JS timer
    _callback: Closure<dyn FnMut()>,
}

/// Timers backed by the window's event loop
pub struct BrowserScheduler {
    window: Window,
    timers: RefCell<HashMap<TimerId, BrowserTimer>>,
    next_id: Cell<u64>,
    this: Weak<BrowserScheduler>,
}

impl BrowserScheduler {
    pub fn new(window: Window) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            window,
            timers: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            this: this.clone(),
        })
    }

    fn allocate(&self) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        id
    }

    fn register(&self, id: TimerId, kind: Kind, callback: Closure<dyn FnMut()>, delay: Duration) {
        let function = callback.as_ref().unchecked_ref();
        let millis = delay.as_millis().min(i32::MAX as u128) as i32;
        let scheduled = match kind {
            Kind::Interval => self
                .window
                .set_interval_with_callback_and_timeout_and_arguments_0(function, millis),
            Kind::Timeout => self
                .window
                .set_timeout_with_callback_and_timeout_and_arguments_0(function, millis),
        };

        match scheduled {
            Ok(handle) => {
                self.timers.borrow_mut().insert(
                    id,
                    BrowserTimer {
                        handle,
                        kind,
                        _callback: callback,
                    },
                );
            }
            Err(e) => web_sys::console::warn_2(&"[Backdrop] Failed to schedule timer".into(), &e),
        }
    }

    fn release(&self, id: TimerId) {
        // Dropped after the borrow ends; the callback may be the caller
        let timer = self.timers.borrow_mut().remove(&id);
        if let Some(timer) = timer {
            match timer.kind {
                Kind::Interval => self.window.clear_interval_with_handle(timer.handle),
                Kind::Timeout => self.window.clear_timeout_with_handle(timer.handle),
            }
        }
    }

    /// Timers currently scheduled
    pub fn active(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Scheduler for BrowserScheduler {
    fn set_interval(&self, period: Duration, mut tick: Box<dyn FnMut()>) -> TimerId {
        let id = self.allocate();
        let callback = Closure::<dyn FnMut()>::new(move || tick());
        self.register(id, Kind::Interval, callback, period.max(Duration::from_millis(1)));
        id
    }

    fn set_timeout(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> TimerId {
        let id = self.allocate();
        let this = self.this.clone();
        let mut fire = Some(fire);
        let callback = Closure::<dyn FnMut()>::new(move || {
            let Some(fire) = fire.take() else { return };
            if let Some(scheduler) = this.upgrade() {
                scheduler.release(id);
            }
            fire();
        });
        self.register(id, Kind::Timeout, callback, delay);
        id
    }

    fn clear(&self, id: TimerId) {
        self.release(id);
    }
}
