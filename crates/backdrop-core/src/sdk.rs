//! External SDK loader
//!
//! YouTube and Vimeo players need a third-party script before a player can
//! be constructed. The [`SdkRegistry`] loads each backend's script at most
//! once per page and hands readiness to every waiting instance, in the
//! order they asked for it.
//!
//! ```text
//!  NotLoaded ──ensure_ready──▶ Loading ──ready hook / poll hit──▶ Ready
//!                                 │
//!                                 └──────── load timeout ───────▶ Failed
//! ```
//!
//! `Failed` is terminal for waiters: they are rejected once and later
//! requests are rejected immediately. A ready signal that still arrives
//! afterwards (the hook fires, or the symbol shows up) moves the backend
//! to `Ready` so instances created from then on can play.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::timer::{Scheduler, TimerHandle};
use crate::{Error, Result};

/// Backends that are delivered as a third-party script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SdkBackend {
    YouTube,
    Vimeo,
}

/// How a backend announces that its script finished loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadySignal {
    /// The script calls a global function once
    GlobalCallback(&'static str),
    /// Nothing is called; the global symbol has to be polled for
    Poll,
}

impl SdkBackend {
    /// Global symbol the script defines
    pub fn global_symbol(&self) -> &'static str {
        match self {
            SdkBackend::YouTube => "YT",
            SdkBackend::Vimeo => "Vimeo",
        }
    }

    pub fn ready_signal(&self) -> ReadySignal {
        match self {
            SdkBackend::YouTube => ReadySignal::GlobalCallback("onYouTubeIframeAPIReady"),
            SdkBackend::Vimeo => ReadySignal::Poll,
        }
    }

    /// Script URL. Pages opened from `file://` cannot use https-only
    /// relative schemes, so they get plain http.
    pub fn script_url(&self, page_is_file: bool) -> String {
        let scheme = if page_is_file { "http" } else { "https" };
        let path = match self {
            SdkBackend::YouTube => "www.youtube.com/iframe_api",
            SdkBackend::Vimeo => "player.vimeo.com/api/player.js",
        };
        format!("{}://{}", scheme, path)
    }
}

impl std::fmt::Display for SdkBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdkBackend::YouTube => write!(f, "YouTube"),
            SdkBackend::Vimeo => write!(f, "Vimeo"),
        }
    }
}

/// Load phase of one backend's SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdkPhase {
    NotLoaded,
    Loading,
    Ready,
    Failed,
}

/// Page-side operations the loader needs
pub trait SdkHost {
    /// Whether the backend's global symbol is usable right now
    fn sdk_present(&self, backend: SdkBackend) -> bool;

    /// Whether the page was opened from `file://`
    fn page_is_file(&self) -> bool;

    /// Append the backend's script tag to the document
    fn inject_script(&self, backend: SdkBackend, src: &str) -> Result<()>;

    /// Install the global function the backend's script calls when ready
    fn install_ready_hook(&self, backend: SdkBackend, hook: Box<dyn FnOnce()>) -> Result<()>;
}

/// Loader timing
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Interval of the global-symbol poll for backends without a ready hook
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits forever
    pub load_timeout: Option<Duration>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            load_timeout: Some(Duration::from_secs(15)),
        }
    }
}

/// Handle to a queued readiness callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterId(u64);

type Waiter = Box<dyn FnOnce(Result<()>)>;

struct SdkSlot {
    phase: SdkPhase,
    waiters: VecDeque<(WaiterId, Waiter)>,
    injections: u32,
    poll: Option<TimerHandle>,
    deadline: Option<TimerHandle>,
}

impl SdkSlot {
    fn new() -> Self {
        Self {
            phase: SdkPhase::NotLoaded,
            waiters: VecDeque::new(),
            injections: 0,
            poll: None,
            deadline: None,
        }
    }
}

/// Per-page registry of SDK load state, keyed by backend
pub struct SdkRegistry {
    host: Rc<dyn SdkHost>,
    scheduler: Rc<dyn Scheduler>,
    config: SdkConfig,
    slots: RefCell<HashMap<SdkBackend, SdkSlot>>,
    next_waiter: Cell<u64>,
    this: Weak<SdkRegistry>,
}

impl SdkRegistry {
    pub fn new(host: Rc<dyn SdkHost>, scheduler: Rc<dyn Scheduler>, config: SdkConfig) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            host,
            scheduler,
            config,
            slots: RefCell::new(HashMap::new()),
            next_waiter: Cell::new(0),
            this: this.clone(),
        })
    }

    /// Current phase of a backend
    pub fn phase(&self, backend: SdkBackend) -> SdkPhase {
        self.slots
            .borrow()
            .get(&backend)
            .map(|slot| slot.phase)
            .unwrap_or(SdkPhase::NotLoaded)
    }

    /// Number of callbacks waiting on a backend
    pub fn pending(&self, backend: SdkBackend) -> usize {
        self.slots
            .borrow()
            .get(&backend)
            .map(|slot| slot.waiters.len())
            .unwrap_or(0)
    }

    /// How many times the backend's script has been injected
    pub fn injections(&self, backend: SdkBackend) -> u32 {
        self.slots
            .borrow()
            .get(&backend)
            .map(|slot| slot.injections)
            .unwrap_or(0)
    }

    /// Run `on_ready` once the backend's SDK is usable.
    ///
    /// Runs synchronously when the SDK is already present (or the loader
    /// already failed) and returns `None`. Otherwise the callback is queued
    /// and a [`WaiterId`] is returned for [`SdkRegistry::cancel`].
    pub fn ensure_ready(
        &self,
        backend: SdkBackend,
        on_ready: impl FnOnce(Result<()>) + 'static,
    ) -> Option<WaiterId> {
        if self.phase(backend) == SdkPhase::Ready || self.host.sdk_present(backend) {
            self.mark_ready(backend);
            on_ready(Ok(()));
            return None;
        }

        if self.phase(backend) == SdkPhase::Failed {
            on_ready(Err(self.stall_error(backend)));
            return None;
        }

        let id = WaiterId(self.next_waiter.get());
        self.next_waiter.set(id.0 + 1);

        let phase = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.entry(backend).or_insert_with(SdkSlot::new);
            slot.waiters.push_back((id, Box::new(on_ready)));
            slot.phase
        };

        match phase {
            SdkPhase::NotLoaded => self.start_loading(backend),
            SdkPhase::Loading => self.arm_timers(backend),
            _ => {}
        }

        Some(id)
    }

    /// Withdraw a queued callback. Once no callback is left the presence
    /// poll and load timeout are suspended until the next request.
    pub fn cancel(&self, backend: SdkBackend, waiter: WaiterId) {
        let suspended = {
            let mut slots = self.slots.borrow_mut();
            let Some(slot) = slots.get_mut(&backend) else { return };
            slot.waiters.retain(|(id, _)| *id != waiter);
            if slot.waiters.is_empty() && slot.phase == SdkPhase::Loading {
                (slot.poll.take(), slot.deadline.take())
            } else {
                (None, None)
            }
        };
        if suspended.0.is_some() || suspended.1.is_some() {
            debug!(%backend, "No waiters left, suspending SDK timers");
        }
        drop(suspended);
    }

    fn start_loading(&self, backend: SdkBackend) {
        if let Some(slot) = self.slots.borrow_mut().get_mut(&backend) {
            slot.phase = SdkPhase::Loading;
        }
        info!(%backend, "Loading SDK");

        if let ReadySignal::GlobalCallback(name) = backend.ready_signal() {
            let this = self.this.clone();
            let hook = Box::new(move || {
                if let Some(registry) = this.upgrade() {
                    registry.mark_ready(backend);
                }
            });
            if let Err(e) = self.host.install_ready_hook(backend, hook) {
                self.fail(backend, e);
                return;
            }
            debug!(%backend, hook = name, "Ready hook installed");
        }

        let src = backend.script_url(self.host.page_is_file());
        if let Err(e) = self.host.inject_script(backend, &src) {
            self.fail(backend, e);
            return;
        }
        if let Some(slot) = self.slots.borrow_mut().get_mut(&backend) {
            slot.injections += 1;
        }
        debug!(%backend, src = %src, "SDK script injected");

        self.arm_timers(backend);
    }

    fn arm_timers(&self, backend: SdkBackend) {
        let (needs_poll, needs_deadline) = match self.slots.borrow().get(&backend) {
            Some(slot) if slot.phase == SdkPhase::Loading => (
                backend.ready_signal() == ReadySignal::Poll && slot.poll.is_none(),
                self.config.load_timeout.is_some() && slot.deadline.is_none(),
            ),
            _ => return,
        };

        if needs_poll {
            let this = self.this.clone();
            let poll = TimerHandle::interval(&self.scheduler, self.config.poll_interval, move || {
                if let Some(registry) = this.upgrade() {
                    if registry.host.sdk_present(backend) {
                        registry.mark_ready(backend);
                    }
                }
            });
            if let Some(slot) = self.slots.borrow_mut().get_mut(&backend) {
                slot.poll = Some(poll);
            }
        }

        if let (true, Some(timeout)) = (needs_deadline, self.config.load_timeout) {
            let this = self.this.clone();
            let deadline = TimerHandle::timeout(&self.scheduler, timeout, move || {
                if let Some(registry) = this.upgrade() {
                    registry.expire(backend);
                }
            });
            if let Some(slot) = self.slots.borrow_mut().get_mut(&backend) {
                slot.deadline = Some(deadline);
            }
        }
    }

    fn mark_ready(&self, backend: SdkBackend) {
        let (waiters, timers) = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.entry(backend).or_insert_with(SdkSlot::new);
            if slot.phase == SdkPhase::Ready {
                return;
            }
            slot.phase = SdkPhase::Ready;
            (
                std::mem::take(&mut slot.waiters),
                (slot.poll.take(), slot.deadline.take()),
            )
        };
        drop(timers);

        info!(%backend, waiters = waiters.len(), "SDK ready");
        for (_, waiter) in waiters {
            waiter(Ok(()));
        }
    }

    fn expire(&self, backend: SdkBackend) {
        let (waiters, timers) = {
            let mut slots = self.slots.borrow_mut();
            let Some(slot) = slots.get_mut(&backend) else { return };
            if slot.phase != SdkPhase::Loading {
                return;
            }
            slot.phase = SdkPhase::Failed;
            (
                std::mem::take(&mut slot.waiters),
                (slot.poll.take(), slot.deadline.take()),
            )
        };
        drop(timers);

        let error = self.stall_error(backend);
        warn!(%backend, waiters = waiters.len(), "SDK load timed out");
        for (_, waiter) in waiters {
            waiter(Err(error.clone()));
        }
    }

    fn fail(&self, backend: SdkBackend, error: Error) {
        let (waiters, timers) = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.entry(backend).or_insert_with(SdkSlot::new);
            slot.phase = SdkPhase::Failed;
            (
                std::mem::take(&mut slot.waiters),
                (slot.poll.take(), slot.deadline.take()),
            )
        };
        drop(timers);

        warn!(%backend, error = %error, "SDK acquisition failed");
        for (_, waiter) in waiters {
            waiter(Err(error.clone()));
        }
    }

    fn stall_error(&self, backend: SdkBackend) -> Error {
        Error::SdkLoadStall {
            backend,
            waited_ms: self
                .config
                .load_timeout
                .map(|t| t.as_millis() as u64)
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualScheduler, ScriptedSdkHost};

    fn registry(config: SdkConfig) -> (Rc<SdkRegistry>, Rc<ScriptedSdkHost>, Rc<ManualScheduler>) {
        let host = Rc::new(ScriptedSdkHost::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let registry = SdkRegistry::new(host.clone(), scheduler.clone(), config);
        (registry, host, scheduler)
    }

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Box<dyn FnOnce(Result<()>)>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let make = move |name: &'static str| -> Box<dyn FnOnce(Result<()>)> {
            let sink = Rc::clone(&sink);
            Box::new(move |r: Result<()>| {
                sink.borrow_mut().push(format!("{}:{}", name, if r.is_ok() { "ok" } else { "err" }))
            })
        };
        (log, make)
    }

    #[test]
    fn test_script_urls() {
        assert_eq!(SdkBackend::YouTube.script_url(false), "https://www.youtube.com/iframe_api");
        assert_eq!(SdkBackend::YouTube.script_url(true), "http://www.youtube.com/iframe_api");
        assert_eq!(SdkBackend::Vimeo.script_url(false), "https://player.vimeo.com/api/player.js");
    }

    #[test]
    fn test_present_sdk_runs_synchronously() {
        let (registry, host, _) = registry(SdkConfig::default());
        host.set_present(SdkBackend::Vimeo, true);
        let (log, make) = recorder();

        assert!(registry.ensure_ready(SdkBackend::Vimeo, make("a")).is_none());
        assert_eq!(*log.borrow(), vec!["a:ok"]);
        assert_eq!(host.injected(SdkBackend::Vimeo), 0);
        assert_eq!(registry.phase(SdkBackend::Vimeo), SdkPhase::Ready);
    }

    #[test]
    fn test_youtube_hook_flushes_in_order() {
        let (registry, host, _) = registry(SdkConfig::default());
        let (log, make) = recorder();

        registry.ensure_ready(SdkBackend::YouTube, make("first"));
        registry.ensure_ready(SdkBackend::YouTube, make("second"));
        registry.ensure_ready(SdkBackend::YouTube, make("third"));

        assert_eq!(registry.phase(SdkBackend::YouTube), SdkPhase::Loading);
        assert_eq!(host.injected(SdkBackend::YouTube), 1);
        assert_eq!(registry.injections(SdkBackend::YouTube), 1);
        assert!(log.borrow().is_empty());

        host.fire_ready_hook(SdkBackend::YouTube);
        assert_eq!(*log.borrow(), vec!["first:ok", "second:ok", "third:ok"]);
        assert_eq!(registry.phase(SdkBackend::YouTube), SdkPhase::Ready);

        // A second hook call is a no-op
        host.fire_ready_hook(SdkBackend::YouTube);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_vimeo_poll_starts_once_and_stops() {
        let (registry, host, scheduler) = registry(SdkConfig::default());
        let (log, make) = recorder();

        registry.ensure_ready(SdkBackend::Vimeo, make("a"));
        registry.ensure_ready(SdkBackend::Vimeo, make("b"));
        assert_eq!(scheduler.intervals_created(), 1);
        assert_eq!(host.injected(SdkBackend::Vimeo), 1);

        scheduler.advance(Duration::from_millis(200));
        assert!(log.borrow().is_empty());

        host.set_present(SdkBackend::Vimeo, true);
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(*log.borrow(), vec!["a:ok", "b:ok"]);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn test_timeout_fails_waiters_and_later_requests() {
        let config = SdkConfig {
            load_timeout: Some(Duration::from_millis(500)),
            ..SdkConfig::default()
        };
        let (registry, _host, scheduler) = registry(config);
        let (log, make) = recorder();

        registry.ensure_ready(SdkBackend::Vimeo, make("a"));
        scheduler.advance(Duration::from_millis(500));
        assert_eq!(*log.borrow(), vec!["a:err"]);
        assert_eq!(registry.phase(SdkBackend::Vimeo), SdkPhase::Failed);
        assert_eq!(scheduler.active_timers(), 0);

        assert!(registry.ensure_ready(SdkBackend::Vimeo, make("b")).is_none());
        assert_eq!(*log.borrow(), vec!["a:err", "b:err"]);
    }

    #[test]
    fn test_cancel_last_waiter_suspends_poll() {
        let (registry, host, scheduler) = registry(SdkConfig::default());
        let (log, make) = recorder();

        let id = registry.ensure_ready(SdkBackend::Vimeo, make("gone")).unwrap();
        registry.cancel(SdkBackend::Vimeo, id);
        assert_eq!(registry.pending(SdkBackend::Vimeo), 0);
        assert_eq!(scheduler.active_timers(), 0);

        registry.ensure_ready(SdkBackend::Vimeo, make("later"));
        assert_eq!(host.injected(SdkBackend::Vimeo), 1);
        assert_eq!(scheduler.active_timers(), 2);

        host.set_present(SdkBackend::Vimeo, true);
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(*log.borrow(), vec!["later:ok"]);
    }

    #[test]
    fn test_injection_failure_reports_backend_error() {
        let (registry, host, _) = registry(SdkConfig::default());
        host.fail_injection(true);
        let result = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&result);

        registry.ensure_ready(SdkBackend::YouTube, move |r| *slot.borrow_mut() = Some(r));
        assert!(matches!(&*result.borrow(), Some(Err(Error::Backend(_)))));
        assert_eq!(registry.phase(SdkBackend::YouTube), SdkPhase::Failed);
    }

    #[test]
    fn test_late_ready_hook_recovers_failed_backend() {
        let config = SdkConfig {
            load_timeout: Some(Duration::from_millis(500)),
            ..SdkConfig::default()
        };
        let (registry, host, scheduler) = registry(config);
        let (log, make) = recorder();

        registry.ensure_ready(SdkBackend::YouTube, make("early"));
        scheduler.advance(Duration::from_millis(500));
        assert_eq!(registry.phase(SdkBackend::YouTube), SdkPhase::Failed);

        host.fire_ready_hook(SdkBackend::YouTube);
        assert_eq!(registry.phase(SdkBackend::YouTube), SdkPhase::Ready);
        // Rejected waiters are not called a second time
        assert_eq!(*log.borrow(), vec!["early:err"]);

        assert!(registry.ensure_ready(SdkBackend::YouTube, make("late")).is_none());
        assert_eq!(*log.borrow(), vec!["early:err", "late:ok"]);
        assert_eq!(host.injected(SdkBackend::YouTube), 1);
    }
}
