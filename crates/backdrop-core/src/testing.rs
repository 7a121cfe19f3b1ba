//! In-memory host for driving players without a browser.
//!
//! Every seam is scripted: time only moves on [`ManualScheduler::advance`],
//! SDKs appear when told to, and backend players emit exactly the signals a
//! test feeds them. Control calls are recorded in a shared [`CallLog`].

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use url::Url;

use crate::adapter::{
    MediaSignal, NativeMedia, NativeMediaFactory, NativeMediaSpec, VimeoApi, VimeoPlayer, VimeoSignal,
    YouTubeApi, YouTubePlayer, YouTubePlayerSpec, YouTubeSignal,
};
use crate::events::EventBus;
use crate::host::{Platform, ResizeSource, Stage};
use crate::layout::Geometry;
use crate::sdk::{SdkBackend, SdkConfig, SdkHost, SdkRegistry};
use crate::timer::{Scheduler, TimerId};
use crate::{Error, Result};

/// Ordered record of backend control calls
pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Collect the names of every event published on `bus`
pub fn record_events(bus: &EventBus) -> Rc<RefCell<Vec<&'static str>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    bus.on(move |event| sink.borrow_mut().push(event.name()));
    log
}

// =============================================================================
// Scheduler
// =============================================================================

enum Task {
    Interval { period: Duration, tick: Option<Box<dyn FnMut()>> },
    Timeout(Option<Box<dyn FnOnce()>>),
}

struct Entry {
    due: Duration,
    task: Task,
}

impl Entry {
    // An interval whose tick is running further up the stack cannot fire
    fn runnable(&self) -> bool {
        match &self.task {
            Task::Interval { tick, .. } => tick.is_some(),
            Task::Timeout(fire) => fire.is_some(),
        }
    }
}

enum Firing {
    Tick(Box<dyn FnMut()>, Duration),
    Once(Box<dyn FnOnce()>),
}

/// Scheduler whose clock only moves when told to
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    timers: RefCell<BTreeMap<TimerId, Entry>>,
    intervals_created: Cell<usize>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Timers scheduled and not yet cleared or fired
    pub fn active_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn intervals_created(&self) -> usize {
        self.intervals_created.get()
    }

    /// Move the clock forward, firing due timers in time order
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;

        loop {
            let next = self
                .timers
                .borrow()
                .iter()
                .filter(|(_, e)| e.due <= target && e.runnable())
                .min_by_key(|(id, e)| (e.due, **id))
                .map(|(id, e)| (*id, e.due));
            let Some((id, due)) = next else { break };
            self.now.set(due);

            let firing = {
                let mut timers = self.timers.borrow_mut();
                let Some(entry) = timers.get_mut(&id) else { continue };
                match &mut entry.task {
                    Task::Interval { period, tick } => {
                        let period = *period;
                        match tick.take() {
                            Some(tick) => Some(Firing::Tick(tick, period)),
                            None => None,
                        }
                    }
                    Task::Timeout(fire) => {
                        let fire = fire.take();
                        timers.remove(&id);
                        fire.map(Firing::Once)
                    }
                }
            };

            match firing {
                Some(Firing::Tick(mut tick, period)) => {
                    tick();
                    if let Some(entry) = self.timers.borrow_mut().get_mut(&id) {
                        if let Task::Interval { tick: slot, .. } = &mut entry.task {
                            *slot = Some(tick);
                        }
                        entry.due = due + period;
                    }
                }
                Some(Firing::Once(fire)) => fire(),
                None => continue,
            }
        }

        self.now.set(target);
    }

    fn insert(&self, due: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.timers.borrow_mut().insert(id, Entry { due, task });
        id
    }
}

impl Scheduler for ManualScheduler {
    fn set_interval(&self, period: Duration, tick: Box<dyn FnMut()>) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.intervals_created.set(self.intervals_created.get() + 1);
        self.insert(self.now.get() + period, Task::Interval { period, tick: Some(tick) })
    }

    fn set_timeout(&self, delay: Duration, fire: Box<dyn FnOnce()>) -> TimerId {
        self.insert(self.now.get() + delay, Task::Timeout(Some(fire)))
    }

    fn clear(&self, id: TimerId) {
        self.timers.borrow_mut().remove(&id);
    }
}

// =============================================================================
// SDK host
// =============================================================================

/// SDK host where scripts "load" when the test says so
#[derive(Default)]
pub struct ScriptedSdkHost {
    present: RefCell<HashSet<SdkBackend>>,
    scripts: RefCell<Vec<(SdkBackend, String)>>,
    hooks: RefCell<HashMap<SdkBackend, Box<dyn FnOnce()>>>,
    fail_injection: Cell<bool>,
    file_page: Cell<bool>,
}

impl ScriptedSdkHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_present(&self, backend: SdkBackend, present: bool) {
        if present {
            self.present.borrow_mut().insert(backend);
        } else {
            self.present.borrow_mut().remove(&backend);
        }
    }

    pub fn fail_injection(&self, fail: bool) {
        self.fail_injection.set(fail);
    }

    pub fn set_file_page(&self, file: bool) {
        self.file_page.set(file);
    }

    /// Number of script tags injected for a backend
    pub fn injected(&self, backend: SdkBackend) -> usize {
        self.scripts.borrow().iter().filter(|(b, _)| *b == backend).count()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.borrow().iter().map(|(_, src)| src.clone()).collect()
    }

    pub fn has_ready_hook(&self, backend: SdkBackend) -> bool {
        self.hooks.borrow().contains_key(&backend)
    }

    /// Simulate the backend script finishing: the symbol appears and the
    /// ready hook, if any, is called. Returns whether a hook ran.
    pub fn fire_ready_hook(&self, backend: SdkBackend) -> bool {
        self.set_present(backend, true);
        let hook = self.hooks.borrow_mut().remove(&backend);
        match hook {
            Some(hook) => {
                hook();
                true
            }
            None => false,
        }
    }
}

impl SdkHost for ScriptedSdkHost {
    fn sdk_present(&self, backend: SdkBackend) -> bool {
        self.present.borrow().contains(&backend)
    }

    fn page_is_file(&self) -> bool {
        self.file_page.get()
    }

    fn inject_script(&self, backend: SdkBackend, src: &str) -> Result<()> {
        if self.fail_injection.get() {
            return Err(Error::backend(format!("script {} blocked", src)));
        }
        self.scripts.borrow_mut().push((backend, src.to_string()));
        Ok(())
    }

    fn install_ready_hook(&self, backend: SdkBackend, hook: Box<dyn FnOnce()>) -> Result<()> {
        self.hooks.borrow_mut().insert(backend, hook);
        Ok(())
    }
}

// =============================================================================
// Stage and resize
// =============================================================================

/// Container that records what the controller did to it
pub struct RecordingStage {
    size: Cell<(f64, f64)>,
    placed: Cell<Option<Geometry>>,
    forced_height: Cell<Option<f64>>,
    holder: RefCell<Option<String>>,
    interactive: Cell<Option<bool>>,
    poster: RefCell<Option<String>>,
    reveals: RefCell<Vec<bool>>,
    unmounts: Cell<u32>,
}

impl RecordingStage {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: Cell::new((width, height)),
            placed: Cell::new(None),
            forced_height: Cell::new(None),
            holder: RefCell::new(None),
            interactive: Cell::new(None),
            poster: RefCell::new(None),
            reveals: RefCell::new(Vec::new()),
            unmounts: Cell::new(0),
        }
    }

    pub fn set_size(&self, width: f64, height: f64) {
        self.size.set((width, height));
    }

    pub fn placed(&self) -> Option<Geometry> {
        self.placed.get()
    }

    pub fn forced_height(&self) -> Option<f64> {
        self.forced_height.get()
    }

    pub fn holder(&self) -> Option<String> {
        self.holder.borrow().clone()
    }

    /// Whether the holder was mounted for user interaction
    pub fn interactive(&self) -> Option<bool> {
        self.interactive.get()
    }

    pub fn poster(&self) -> Option<String> {
        self.poster.borrow().clone()
    }

    pub fn reveals(&self) -> Vec<bool> {
        self.reveals.borrow().clone()
    }

    pub fn unmount_count(&self) -> u32 {
        self.unmounts.get()
    }
}

impl Stage for RecordingStage {
    fn mount(&self, holder_id: &str, interactive: bool) -> Result<()> {
        *self.holder.borrow_mut() = Some(holder_id.to_string());
        self.interactive.set(Some(interactive));
        Ok(())
    }

    fn unmount(&self) {
        self.holder.borrow_mut().take();
        self.unmounts.set(self.unmounts.get() + 1);
    }

    fn container_size(&self) -> (f64, f64) {
        self.size.get()
    }

    fn set_container_height(&self, height: f64) {
        let (width, _) = self.size.get();
        self.size.set((width, height));
        self.forced_height.set(Some(height));
    }

    fn place_player(&self, geometry: &Geometry) {
        self.placed.set(Some(*geometry));
    }

    fn show_poster(&self, url: &str) {
        *self.poster.borrow_mut() = Some(url.to_string());
    }

    fn reveal_player(&self, transition_in: bool) {
        self.reveals.borrow_mut().push(transition_in);
    }
}

/// Resize source fired by hand
#[derive(Default)]
pub struct ManualResize {
    subscribers: RefCell<BTreeMap<String, Box<dyn FnMut()>>>,
    dropped: RefCell<Vec<String>>,
    firing: Cell<bool>,
}

impl ManualResize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_subscribed(&self, key: &str) -> bool {
        self.subscribers.borrow().contains_key(key)
    }

    /// Deliver one resize signal to every subscriber
    pub fn trigger(&self) {
        let mut active = std::mem::take(&mut *self.subscribers.borrow_mut());
        self.firing.set(true);
        for (key, on_resize) in active.iter_mut() {
            if !self.dropped.borrow().contains(key) {
                on_resize();
            }
        }
        self.firing.set(false);

        let mut subscribers = self.subscribers.borrow_mut();
        let added = std::mem::take(&mut *subscribers);
        let dropped = std::mem::take(&mut *self.dropped.borrow_mut());
        active.retain(|key, _| !dropped.contains(key));
        active.extend(added);
        *subscribers = active;
    }
}

impl ResizeSource for ManualResize {
    fn subscribe(&self, key: &str, on_resize: Box<dyn FnMut()>) {
        self.subscribers.borrow_mut().insert(key.to_string(), on_resize);
    }

    fn unsubscribe(&self, key: &str) {
        self.subscribers.borrow_mut().remove(key);
        if self.firing.get() {
            self.dropped.borrow_mut().push(key.to_string());
        }
    }
}

// =============================================================================
// Backends
// =============================================================================

type Handlers<S> = RefCell<Vec<Option<Box<dyn FnMut(S)>>>>;

fn emit_to<S>(handlers: &Handlers<S>, index: usize, signal: S) {
    let handler = handlers.borrow_mut().get_mut(index).and_then(Option::take);
    if let Some(mut handler) = handler {
        handler(signal);
        if let Some(slot) = handlers.borrow_mut().get_mut(index) {
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
    }
}

fn last_index<S>(handlers: &Handlers<S>) -> usize {
    handlers.borrow().len().saturating_sub(1)
}

/// `<video>` factory with scripted media events
pub struct FakeNativeFactory {
    log: CallLog,
    specs: RefCell<Vec<NativeMediaSpec>>,
    handlers: Handlers<MediaSignal>,
    fail: Cell<bool>,
}

impl FakeNativeFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            specs: RefCell::new(Vec::new()),
            handlers: RefCell::new(Vec::new()),
            fail: Cell::new(false),
        }
    }

    pub fn fail_creation(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn specs(&self) -> Vec<NativeMediaSpec> {
        self.specs.borrow().clone()
    }

    /// Deliver a signal to the most recently created element
    pub fn emit(&self, signal: MediaSignal) {
        emit_to(&self.handlers, last_index(&self.handlers), signal);
    }
}

impl NativeMediaFactory for FakeNativeFactory {
    fn create(
        &self,
        spec: &NativeMediaSpec,
        on_signal: Box<dyn FnMut(MediaSignal)>,
    ) -> Result<Rc<dyn NativeMedia>> {
        if self.fail.get() {
            return Err(Error::backend("video element could not be created"));
        }
        self.specs.borrow_mut().push(spec.clone());
        self.handlers.borrow_mut().push(Some(on_signal));
        Ok(Rc::new(FakeNativeMedia { log: Rc::clone(&self.log) }))
    }
}

struct FakeNativeMedia {
    log: CallLog,
}

impl NativeMedia for FakeNativeMedia {
    fn play(&self) {
        self.log.borrow_mut().push("html5:play".into());
    }

    fn pause(&self) {
        self.log.borrow_mut().push("html5:pause".into());
    }

    fn set_current_time(&self, seconds: f64) {
        self.log.borrow_mut().push(format!("html5:seek:{}", seconds));
    }

    fn set_volume(&self, volume: f64) {
        self.log.borrow_mut().push(format!("html5:volume:{}", volume));
    }

    fn set_muted(&self, muted: bool) {
        self.log.borrow_mut().push(format!("html5:muted:{}", muted));
    }

    fn remove(&self) {
        self.log.borrow_mut().push("html5:remove".into());
    }
}

/// `YT.Player` stand-in
pub struct FakeYouTubeApi {
    log: CallLog,
    specs: RefCell<Vec<YouTubePlayerSpec>>,
    handlers: Handlers<YouTubeSignal>,
    players: RefCell<Vec<Rc<FakeYouTubePlayer>>>,
}

impl FakeYouTubeApi {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            specs: RefCell::new(Vec::new()),
            handlers: RefCell::new(Vec::new()),
            players: RefCell::new(Vec::new()),
        }
    }

    pub fn players_created(&self) -> usize {
        self.players.borrow().len()
    }

    pub fn specs(&self) -> Vec<YouTubePlayerSpec> {
        self.specs.borrow().clone()
    }

    pub fn player(&self, index: usize) -> Option<Rc<FakeYouTubePlayer>> {
        self.players.borrow().get(index).cloned()
    }

    /// Deliver a signal to the most recently created player
    pub fn emit(&self, signal: YouTubeSignal) {
        emit_to(&self.handlers, last_index(&self.handlers), signal);
    }

    pub fn emit_to(&self, index: usize, signal: YouTubeSignal) {
        emit_to(&self.handlers, index, signal);
    }

    /// Set the reported playback time of the most recent player
    pub fn set_current_time(&self, seconds: f64) {
        if let Some(player) = self.players.borrow().last() {
            player.time.set(seconds);
        }
    }
}

impl YouTubeApi for FakeYouTubeApi {
    fn create_player(
        &self,
        spec: &YouTubePlayerSpec,
        on_signal: Box<dyn FnMut(YouTubeSignal)>,
    ) -> Result<Rc<dyn YouTubePlayer>> {
        self.specs.borrow_mut().push(spec.clone());
        self.handlers.borrow_mut().push(Some(on_signal));
        let player = Rc::new(FakeYouTubePlayer {
            log: Rc::clone(&self.log),
            time: Cell::new(0.0),
            destroyed: Cell::new(false),
        });
        self.players.borrow_mut().push(Rc::clone(&player));
        Ok(player)
    }
}

pub struct FakeYouTubePlayer {
    log: CallLog,
    time: Cell<f64>,
    destroyed: Cell<bool>,
}

impl FakeYouTubePlayer {
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

impl YouTubePlayer for FakeYouTubePlayer {
    fn play_video(&self) {
        self.log.borrow_mut().push("yt:play".into());
    }

    fn pause_video(&self) {
        self.log.borrow_mut().push("yt:pause".into());
    }

    fn seek_to(&self, seconds: f64, _allow_seek_ahead: bool) {
        self.time.set(seconds);
        self.log.borrow_mut().push(format!("yt:seek:{}", seconds));
    }

    fn set_volume(&self, percent: f64) {
        self.log.borrow_mut().push(format!("yt:volume:{}", percent));
    }

    fn mute(&self) {
        self.log.borrow_mut().push("yt:mute".into());
    }

    fn un_mute(&self) {
        self.log.borrow_mut().push("yt:unmute".into());
    }

    fn current_time(&self) -> f64 {
        self.time.get()
    }

    fn destroy(&self) {
        self.destroyed.set(true);
        self.log.borrow_mut().push("yt:destroy".into());
    }
}

/// `Vimeo.Player` stand-in
pub struct FakeVimeoApi {
    log: CallLog,
    sources: RefCell<Vec<String>>,
    handlers: Handlers<VimeoSignal>,
}

impl FakeVimeoApi {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            sources: RefCell::new(Vec::new()),
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// `src` of every mounted iframe
    pub fn sources(&self) -> Vec<String> {
        self.sources.borrow().clone()
    }

    pub fn players_attached(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Deliver a signal to the most recently attached player
    pub fn emit(&self, signal: VimeoSignal) {
        emit_to(&self.handlers, last_index(&self.handlers), signal);
    }
}

impl VimeoApi for FakeVimeoApi {
    fn mount_iframe(&self, holder_id: &str, src: &Url, interactive: bool) -> Result<String> {
        self.sources.borrow_mut().push(src.to_string());
        let entry = if interactive { "vimeo:mount:interactive" } else { "vimeo:mount" };
        self.log.borrow_mut().push(entry.into());
        Ok(format!("{}-iframe", holder_id))
    }

    fn attach(&self, iframe_id: &str, on_signal: Box<dyn FnMut(VimeoSignal)>) -> Result<Rc<dyn VimeoPlayer>> {
        self.handlers.borrow_mut().push(Some(on_signal));
        self.log.borrow_mut().push(format!("vimeo:attach:{}", iframe_id));
        Ok(Rc::new(FakeVimeoPlayer { log: Rc::clone(&self.log) }))
    }

    fn unmount_iframe(&self, iframe_id: &str) {
        self.log.borrow_mut().push(format!("vimeo:unmount:{}", iframe_id));
    }
}

struct FakeVimeoPlayer {
    log: CallLog,
}

impl VimeoPlayer for FakeVimeoPlayer {
    fn play(&self) {
        self.log.borrow_mut().push("vimeo:play".into());
    }

    fn pause(&self) {
        self.log.borrow_mut().push("vimeo:pause".into());
    }

    fn set_current_time(&self, seconds: f64) {
        self.log.borrow_mut().push(format!("vimeo:seek:{}", seconds));
    }

    fn set_volume(&self, volume: f64) {
        self.log.borrow_mut().push(format!("vimeo:volume:{}", volume));
    }

    fn set_muted(&self, muted: bool) {
        self.log.borrow_mut().push(format!("vimeo:muted:{}", muted));
    }

    fn destroy(&self) {
        self.log.borrow_mut().push("vimeo:destroy".into());
    }
}

// =============================================================================
// Platform
// =============================================================================

/// A complete in-memory [`Platform`] with handles to every fake
pub struct FakePlatform {
    pub log: CallLog,
    pub scheduler: Rc<ManualScheduler>,
    pub sdk_host: Rc<ScriptedSdkHost>,
    pub sdk: Rc<SdkRegistry>,
    pub resize: Rc<ManualResize>,
    pub native: Rc<FakeNativeFactory>,
    pub youtube: Rc<FakeYouTubeApi>,
    pub vimeo: Rc<FakeVimeoApi>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::with_sdk_config(SdkConfig::default())
    }

    pub fn with_sdk_config(config: SdkConfig) -> Self {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let scheduler = Rc::new(ManualScheduler::new());
        let sdk_host = Rc::new(ScriptedSdkHost::new());
        let sdk = SdkRegistry::new(sdk_host.clone(), scheduler.clone(), config);
        Self {
            scheduler,
            sdk_host,
            sdk,
            resize: Rc::new(ManualResize::new()),
            native: Rc::new(FakeNativeFactory::new(Rc::clone(&log))),
            youtube: Rc::new(FakeYouTubeApi::new(Rc::clone(&log))),
            vimeo: Rc::new(FakeVimeoApi::new(Rc::clone(&log))),
            log,
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            scheduler: self.scheduler.clone(),
            sdk: Rc::clone(&self.sdk),
            resize: self.resize.clone(),
            native: self.native.clone(),
            youtube: self.youtube.clone(),
            vimeo: self.vimeo.clone(),
        }
    }

    /// Recorded backend calls
    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_fires_in_due_order() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (name, ms) in [("late", 30u64), ("early", 10)] {
            let log = Rc::clone(&log);
            scheduler.set_timeout(Duration::from_millis(ms), Box::new(move || log.borrow_mut().push(name)));
        }

        scheduler.advance(Duration::from_millis(20));
        assert_eq!(*log.borrow(), vec!["early"]);
        scheduler.advance(Duration::from_millis(10));
        assert_eq!(*log.borrow(), vec!["early", "late"]);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn test_nested_advance_skips_running_interval() {
        let scheduler = Rc::new(ManualScheduler::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let weak = Rc::downgrade(&scheduler);
            let log = Rc::clone(&log);
            let nested = Cell::new(false);
            scheduler.set_interval(
                Duration::from_millis(10),
                Box::new(move || {
                    if !nested.replace(true) {
                        if let Some(scheduler) = weak.upgrade() {
                            scheduler.advance(Duration::ZERO);
                        }
                    }
                    log.borrow_mut().push("tick");
                }),
            );
        }
        {
            let log = Rc::clone(&log);
            scheduler.set_timeout(Duration::from_millis(10), Box::new(move || log.borrow_mut().push("timeout")));
        }

        scheduler.advance(Duration::from_millis(10));
        assert_eq!(*log.borrow(), vec!["timeout", "tick"]);
        assert_eq!(scheduler.active_timers(), 1);

        scheduler.advance(Duration::from_millis(10));
        assert_eq!(*log.borrow(), vec!["timeout", "tick", "tick"]);
    }
}
