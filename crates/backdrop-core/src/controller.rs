//! Player Controller - one widget instance
//!
//! Coordinates:
//! - Configuration validation and adapter selection
//! - Adapter lifecycle
//! - Layout passes on every resize signal
//! - Playback controls and lifecycle notifications for the host page

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info, instrument};

use crate::adapter::{Adapter, AdapterContext, BoundAdapter};
use crate::config::{BackendOptions, PlayerOptions};
use crate::events::{EventBus, Lifecycle, ListenerId, PlayerEvent};
use crate::host::{Platform, ResizeSource, Stage};
use crate::layout::{compute_geometry, Geometry, Layout};
use crate::types::{BackendKind, PlayerId, PlayerState};
use crate::{Error, Result};

/// A background video bound to one container
pub struct PlayerController {
    /// Unique instance ID
    id: PlayerId,
    /// Validated options
    options: Rc<PlayerOptions>,
    /// Selected backend
    backend: BackendKind,
    /// State machine shared with the adapter
    lifecycle: Rc<Lifecycle>,
    /// Notifications to the host
    bus: Rc<EventBus>,
    /// Bound adapter, cleared on destroy
    adapter: RefCell<Option<BoundAdapter>>,
    /// Container boundary, cleared on destroy
    stage: RefCell<Option<Rc<dyn Stage>>>,
    /// Resize signal source, cleared on destroy
    resize: RefCell<Option<Rc<dyn ResizeSource>>>,
    /// Last layout pass
    layout: Rc<Cell<Option<Layout>>>,
}

impl PlayerController {
    /// Create a player with its own event bus
    pub fn new(options: PlayerOptions, stage: Rc<dyn Stage>, platform: &Platform) -> Result<Self> {
        Self::with_bus(options, stage, platform, Rc::new(EventBus::new()))
    }

    /// Create a player publishing on `bus`. Listeners registered on the bus
    /// beforehand also see the events emitted during construction.
    #[instrument(skip_all)]
    pub fn with_bus(
        options: PlayerOptions,
        stage: Rc<dyn Stage>,
        platform: &Platform,
        bus: Rc<EventBus>,
    ) -> Result<Self> {
        let backend_options = options.backend()?;
        let backend = backend_options.kind();
        let id = PlayerId::new();
        let options = Rc::new(options);
        let lifecycle = Rc::new(Lifecycle::new(id, Rc::clone(&bus)));

        info!(player_id = %id, %backend, "Creating player");

        stage.mount(&id.holder_id(), options.controls)?;
        if backend != BackendKind::Html5 {
            if let Some(poster) = backend_options.poster() {
                stage.show_poster(poster);
            }
        }
        Self::reveal_on_first_play(&bus, &stage, &backend_options);

        let adapter = BoundAdapter::select(&backend_options, platform);
        lifecycle.transition(PlayerState::AdapterBound);
        let ctx = AdapterContext {
            lifecycle: Rc::clone(&lifecycle),
            holder_id: id.holder_id(),
            options: Rc::clone(&options),
        };
        if let Err(e) = adapter.init(ctx) {
            lifecycle.destroy();
            adapter.destroy();
            stage.unmount();
            return Err(e);
        }

        let layout = Rc::new(Cell::new(None));
        {
            let stage = Rc::clone(&stage);
            let options = Rc::clone(&options);
            let lifecycle = Rc::clone(&lifecycle);
            let layout = Rc::clone(&layout);
            platform.resize.subscribe(
                &id.resize_key(),
                Box::new(move || {
                    if !lifecycle.is_destroyed() {
                        apply_layout(stage.as_ref(), &options, lifecycle.bus(), &layout);
                    }
                }),
            );
        }
        apply_layout(stage.as_ref(), &options, &bus, &layout);

        bus.emit(PlayerEvent::Initialised { player_id: id });

        Ok(Self {
            id,
            options,
            backend,
            lifecycle,
            bus,
            adapter: RefCell::new(Some(adapter)),
            stage: RefCell::new(Some(stage)),
            resize: RefCell::new(Some(Rc::clone(&platform.resize))),
            layout,
        })
    }

    fn reveal_on_first_play(bus: &EventBus, stage: &Rc<dyn Stage>, backend: &BackendOptions) {
        let stage = Rc::clone(stage);
        let transition_in = backend.transition_in();
        let mut revealed = false;
        bus.on(move |event| {
            if !revealed && *event == PlayerEvent::VideoPlaying {
                revealed = true;
                stage.reveal_player(transition_in);
            }
        });
    }

    /// Get instance ID
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Get the selected backend
    pub fn backend_kind(&self) -> BackendKind {
        self.backend
    }

    /// Get current state
    pub fn state(&self) -> PlayerState {
        self.lifecycle.state()
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    /// Player placement from the last layout pass
    pub fn geometry(&self) -> Option<Geometry> {
        self.layout.get().map(|l| l.player)
    }

    /// Full result of the last layout pass
    pub fn layout(&self) -> Option<Layout> {
        self.layout.get()
    }

    /// Subscribe to lifecycle notifications
    pub fn on(&self, listener: impl FnMut(&PlayerEvent) + 'static) -> ListenerId {
        self.bus.on(listener)
    }

    /// Unsubscribe a listener
    pub fn off(&self, id: ListenerId) -> bool {
        self.bus.off(id)
    }

    /// Run a layout pass now
    pub fn resize(&self) -> Result<Layout> {
        let stage = self
            .stage
            .borrow()
            .clone()
            .ok_or_else(|| Error::contract("resize called on a destroyed player"))?;
        Ok(apply_layout(stage.as_ref(), &self.options, &self.bus, &self.layout))
    }

    /// Start playback
    pub fn play(&self) -> Result<()> {
        self.ready_adapter("play")?.play()
    }

    /// Pause playback
    pub fn pause(&self) -> Result<()> {
        self.ready_adapter("pause")?.pause()
    }

    /// Seek to an absolute position in seconds
    pub fn go_to(&self, seconds: f64) -> Result<()> {
        self.ready_adapter("goTo")?.go_to(seconds)
    }

    /// Set the volume, 0 to 100
    pub fn volume(&self, percent: f64) -> Result<()> {
        self.ready_adapter("volume")?.volume(percent)
    }

    pub fn mute(&self) -> Result<()> {
        self.ready_adapter("mute")?.mute()
    }

    pub fn un_mute(&self) -> Result<()> {
        self.ready_adapter("unMute")?.un_mute()
    }

    /// Tear the instance down. Safe to call repeatedly; only the first call
    /// has an effect.
    #[instrument(skip(self), fields(player_id = %self.id))]
    pub fn destroy(&self) {
        if !self.lifecycle.destroy() {
            debug!("Player already destroyed");
            return;
        }

        let adapter = self.adapter.borrow_mut().take();
        if let Some(adapter) = adapter {
            adapter.destroy();
        }

        let resize = self.resize.borrow_mut().take();
        if let Some(resize) = resize {
            resize.unsubscribe(&self.id.resize_key());
        }

        let stage = self.stage.borrow_mut().take();
        if let Some(stage) = stage {
            stage.unmount();
        }

        self.bus.close_with(PlayerEvent::Destroyed { player_id: self.id });
        info!("Player destroyed");
    }

    fn ready_adapter(&self, operation: &str) -> Result<BoundAdapter> {
        let state = self.lifecycle.state();
        if state == PlayerState::Destroyed {
            return Err(Error::contract(format!("{} called on a destroyed player", operation)));
        }
        if !state.is_ready() {
            return Err(Error::contract(format!(
                "{} called before the player is ready (state: {})",
                operation, state
            )));
        }
        self.adapter
            .borrow()
            .clone()
            .ok_or_else(|| Error::contract(format!("{} called without a bound adapter", operation)))
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn apply_layout(
    stage: &dyn Stage,
    options: &PlayerOptions,
    bus: &EventBus,
    current: &Cell<Option<Layout>>,
) -> Layout {
    let (width, height) = stage.container_size();
    let layout = compute_geometry(
        width,
        height,
        options.ratio,
        options.force_aspect,
        options.fit_container,
    );

    if let Some(container_height) = layout.container_height {
        stage.set_container_height(container_height);
    }
    stage.place_player(&layout.player);
    current.set(Some(layout));

    debug!(
        width = layout.player.width,
        height = layout.player.height,
        left = layout.player.offset_left,
        top = layout.player.offset_top,
        "Layout applied"
    );
    bus.emit(PlayerEvent::Resized { layout });
    layout
}
