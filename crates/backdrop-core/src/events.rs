//! Lifecycle notifications
//!
//! Adapters translate backend signals into calls on [`Lifecycle`], which
//! owns the instance state machine and publishes [`PlayerEvent`]s on the
//! instance's [`EventBus`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::layout::Layout;
use crate::types::{PlayerId, PlayerState};

/// Notification emitted to the host page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    #[serde(rename = "player.initialised")]
    Initialised { player_id: PlayerId },
    #[serde(rename = "player.resized")]
    Resized { layout: Layout },
    #[serde(rename = "player.destroyed")]
    Destroyed { player_id: PlayerId },
    #[serde(rename = "player.error")]
    Error { code: String, message: String },
    #[serde(rename = "video.loaded")]
    VideoLoaded,
    #[serde(rename = "video.playing")]
    VideoPlaying,
    #[serde(rename = "video.paused")]
    VideoPaused,
    #[serde(rename = "video.ended")]
    VideoEnded,
}

impl PlayerEvent {
    /// Event name as seen by the host page
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Initialised { .. } => "player.initialised",
            PlayerEvent::Resized { .. } => "player.resized",
            PlayerEvent::Destroyed { .. } => "player.destroyed",
            PlayerEvent::Error { .. } => "player.error",
            PlayerEvent::VideoLoaded => "video.loaded",
            PlayerEvent::VideoPlaying => "video.playing",
            PlayerEvent::VideoPaused => "video.paused",
            PlayerEvent::VideoEnded => "video.ended",
        }
    }
}

/// Identifier returned by [`EventBus::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&PlayerEvent)>;

/// Ordered, re-entrant event dispatcher.
///
/// Events emitted while a listener runs are queued and delivered after
/// the current event, so every listener sees events in emission order.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    // Ids of the listeners taken out for the event being dispatched
    dispatching_ids: RefCell<Vec<ListenerId>>,
    removed: RefCell<Vec<ListenerId>>,
    queue: RefCell<VecDeque<PlayerEvent>>,
    dispatching: Cell<bool>,
    closed: Cell<bool>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn on(&self, listener: impl FnMut(&PlayerEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn off(&self, id: ListenerId) -> bool {
        if self.dispatching.get() {
            let registered = self.dispatching_ids.borrow().contains(&id)
                || self.listeners.borrow().iter().any(|(lid, _)| *lid == id);
            let mut removed = self.removed.borrow_mut();
            if !registered || removed.contains(&id) {
                return false;
            }
            removed.push(id);
            return true;
        }
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Publish an event. Ignored once the bus is closed.
    pub fn emit(&self, event: PlayerEvent) {
        if self.closed.get() {
            debug!(event = event.name(), "Dropping event on closed bus");
            return;
        }
        self.queue.borrow_mut().push_back(event);
        self.drain();
    }

    /// Drop anything still queued, deliver `last` and refuse further events
    pub fn close_with(&self, last: PlayerEvent) {
        if self.closed.get() {
            return;
        }
        self.closed.set(true);
        {
            let mut queue = self.queue.borrow_mut();
            queue.clear();
            queue.push_back(last);
        }
        self.drain();
    }

    fn drain(&self) {
        if self.dispatching.get() {
            return;
        }
        self.dispatching.set(true);

        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };

            let mut active = std::mem::take(&mut *self.listeners.borrow_mut());
            *self.dispatching_ids.borrow_mut() = active.iter().map(|(id, _)| *id).collect();
            for (id, listener) in active.iter_mut() {
                if !self.removed.borrow().contains(id) {
                    listener(&event);
                }
            }

            let mut listeners = self.listeners.borrow_mut();
            let added = std::mem::take(&mut *listeners);
            let removed = std::mem::take(&mut *self.removed.borrow_mut());
            active.extend(added);
            active.retain(|(id, _)| !removed.contains(id));
            *listeners = active;
        }

        self.dispatching_ids.borrow_mut().clear();
        self.dispatching.set(false);
    }
}

/// Per-instance state machine fed by the bound adapter
pub struct Lifecycle {
    player_id: PlayerId,
    state: Cell<PlayerState>,
    bus: Rc<EventBus>,
}

impl Lifecycle {
    pub fn new(player_id: PlayerId, bus: Rc<EventBus>) -> Self {
        Self {
            player_id,
            state: Cell::new(PlayerState::Constructed),
            bus,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn state(&self) -> PlayerState {
        self.state.get()
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.get() == PlayerState::Destroyed
    }

    /// Move to `target` if the state machine allows it
    pub fn transition(&self, target: PlayerState) -> bool {
        let current = self.state.get();
        if current == target {
            return false;
        }
        if !current.can_transition_to(target) {
            warn!(player_id = %self.player_id, from = %current, to = %target, "Ignoring invalid state transition");
            return false;
        }
        self.state.set(target);
        debug!(player_id = %self.player_id, from = %current, to = %target, "State transition");
        true
    }

    /// Backend finished loading the video
    pub fn loaded(&self) {
        if self.state.get() == PlayerState::AdapterBound && self.transition(PlayerState::Ready) {
            self.bus.emit(PlayerEvent::VideoLoaded);
        }
    }

    pub fn playing(&self) {
        self.ensure_loaded();
        if self.transition(PlayerState::Playing) {
            self.bus.emit(PlayerEvent::VideoPlaying);
        }
    }

    pub fn paused(&self) {
        self.ensure_loaded();
        if self.transition(PlayerState::Paused) {
            self.bus.emit(PlayerEvent::VideoPaused);
        }
    }

    pub fn ended(&self) {
        self.ensure_loaded();
        if self.transition(PlayerState::Ended) {
            self.bus.emit(PlayerEvent::VideoEnded);
        }
    }

    /// Backend could not be brought up
    pub fn failed(&self, error: &crate::Error) {
        if self.transition(PlayerState::Failed) {
            self.bus.emit(PlayerEvent::Error {
                code: error.error_code().to_string(),
                message: error.to_string(),
            });
        }
    }

    /// Enter the terminal state; returns false if already destroyed
    pub fn destroy(&self) -> bool {
        self.transition(PlayerState::Destroyed)
    }

    // A playback signal that beats the loaded signal implies the video loaded
    fn ensure_loaded(&self) {
        if self.state.get() == PlayerState::AdapterBound {
            self.loaded();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_bus() -> (Rc<EventBus>, Rc<RefCell<Vec<&'static str>>>) {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        bus.on(move |e| sink.borrow_mut().push(e.name()));
        (bus, log)
    }

    #[test]
    fn test_event_names() {
        assert_eq!(PlayerEvent::VideoLoaded.name(), "video.loaded");
        assert_eq!(
            PlayerEvent::Initialised { player_id: PlayerId::new() }.name(),
            "player.initialised"
        );
    }

    #[test]
    fn test_reentrant_emit_is_queued_in_order() {
        let bus = Rc::new(EventBus::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_bus = Rc::clone(&bus);
        bus.on(move |e| {
            if *e == PlayerEvent::VideoLoaded {
                inner_bus.emit(PlayerEvent::VideoPlaying);
            }
        });
        let sink = Rc::clone(&log);
        bus.on(move |e| sink.borrow_mut().push(e.name()));

        bus.emit(PlayerEvent::VideoLoaded);
        assert_eq!(*log.borrow(), vec!["video.loaded", "video.playing"]);
    }

    #[test]
    fn test_off_inside_listener() {
        let bus = Rc::new(EventBus::new());
        let count = Rc::new(Cell::new(0));
        let id_slot: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let (b, c, slot) = (Rc::clone(&bus), Rc::clone(&count), Rc::clone(&id_slot));
        let id = bus.on(move |_| {
            c.set(c.get() + 1);
            if let Some(id) = slot.get() {
                b.off(id);
            }
        });
        id_slot.set(Some(id));

        bus.emit(PlayerEvent::VideoPaused);
        bus.emit(PlayerEvent::VideoPaused);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_off_during_dispatch_reports_membership() {
        let bus = Rc::new(EventBus::new());
        let results = Rc::new(RefCell::new(Vec::new()));
        let other = bus.on(|_| {});
        let late: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let (b, r, l) = (Rc::clone(&bus), Rc::clone(&results), Rc::clone(&late));
        bus.on(move |_| {
            let added = b.on(|_| {});
            l.set(Some(added));
            let mut r = r.borrow_mut();
            r.push(b.off(ListenerId(999)));
            r.push(b.off(other));
            r.push(b.off(other));
            r.push(b.off(added));
        });

        bus.emit(PlayerEvent::VideoLoaded);
        assert_eq!(*results.borrow(), vec![false, true, false, true]);

        // Both removals took effect once dispatch finished
        assert!(!bus.off(other));
        assert!(!bus.off(late.get().unwrap()));
    }

    #[test]
    fn test_close_with_delivers_last_event_only() {
        let (bus, log) = recording_bus();
        bus.emit(PlayerEvent::VideoLoaded);
        bus.close_with(PlayerEvent::Destroyed { player_id: PlayerId::new() });
        bus.emit(PlayerEvent::VideoPlaying);
        bus.close_with(PlayerEvent::Destroyed { player_id: PlayerId::new() });
        assert_eq!(*log.borrow(), vec!["video.loaded", "player.destroyed"]);
    }

    #[test]
    fn test_lifecycle_synthesizes_loaded() {
        let (bus, log) = recording_bus();
        let lifecycle = Lifecycle::new(PlayerId::new(), bus);
        lifecycle.transition(PlayerState::AdapterBound);

        lifecycle.playing();
        lifecycle.playing();
        lifecycle.paused();

        assert_eq!(*log.borrow(), vec!["video.loaded", "video.playing", "video.paused"]);
        assert_eq!(lifecycle.state(), PlayerState::Paused);
    }

    #[test]
    fn test_lifecycle_silent_after_destroy() {
        let (bus, log) = recording_bus();
        let lifecycle = Lifecycle::new(PlayerId::new(), bus);
        lifecycle.transition(PlayerState::AdapterBound);
        assert!(lifecycle.destroy());
        assert!(!lifecycle.destroy());

        lifecycle.loaded();
        lifecycle.playing();
        assert!(log.borrow().is_empty());
    }
}
