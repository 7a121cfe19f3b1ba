//! Vimeo player adapter
//!
//! Vimeo only offers an iframe player. The adapter mounts the iframe with
//! the player variables in its query string, then wraps it with the
//! `Vimeo.Player` client once the SDK is present. Mobile Safari does not
//! always deliver `play`, so the first `timeupdate` past zero also counts
//! as playing, at most once per play cycle.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, info};
use url::Url;

use super::{check_seek, check_volume, not_ready, Adapter, AdapterContext};
use crate::config::VimeoOptions;
use crate::sdk::{SdkBackend, SdkRegistry, WaiterId};
use crate::types::BackendKind;
use crate::{Error, Result};

/// Events of `Vimeo.Player`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VimeoSignal {
    Loaded,
    Play,
    Pause,
    Ended,
    /// `timeupdate`, with the elapsed playback time
    Progress { seconds: f64 },
}

/// Iframe mounting and `Vimeo.Player` construction
pub trait VimeoApi {
    /// Create the embed iframe inside the holder; returns the iframe's id.
    /// A non-`interactive` iframe ignores pointer input.
    fn mount_iframe(&self, holder_id: &str, src: &Url, interactive: bool) -> Result<String>;

    /// Wrap a mounted iframe with the client library. Only called once the SDK is ready.
    fn attach(&self, iframe_id: &str, on_signal: Box<dyn FnMut(VimeoSignal)>) -> Result<Rc<dyn VimeoPlayer>>;

    fn unmount_iframe(&self, iframe_id: &str);
}

/// Control surface of `Vimeo.Player`
pub trait VimeoPlayer {
    fn play(&self);
    fn pause(&self);
    fn set_current_time(&self, seconds: f64);
    /// Volume in 0.0..=1.0
    fn set_volume(&self, volume: f64);
    fn set_muted(&self, muted: bool);
    fn destroy(&self);
}

struct VimeoInner {
    options: VimeoOptions,
    ctx: Option<AdapterContext>,
    iframe_id: Option<String>,
    player: Option<Rc<dyn VimeoPlayer>>,
    waiter: Option<WaiterId>,
    // Set once `video.playing` went out for the current play cycle
    playing_reported: bool,
    // Whether a progress tick may stand in for a missing `play`
    progress_armed: bool,
    destroyed: bool,
}

/// Adapter over the Vimeo embedded player
#[derive(Clone)]
pub struct VimeoAdapter {
    inner: Rc<RefCell<VimeoInner>>,
    api: Rc<dyn VimeoApi>,
    sdk: Rc<SdkRegistry>,
}

impl VimeoAdapter {
    pub fn new(options: VimeoOptions, api: Rc<dyn VimeoApi>, sdk: Rc<SdkRegistry>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(VimeoInner {
                options,
                ctx: None,
                iframe_id: None,
                player: None,
                waiter: None,
                playing_reported: false,
                progress_armed: false,
                destroyed: false,
            })),
            api,
            sdk,
        }
    }

    fn player(&self) -> Result<Rc<dyn VimeoPlayer>> {
        let inner = self.inner.borrow();
        match (&inner.ctx, &inner.player) {
            (Some(ctx), Some(player)) if !inner.destroyed && ctx.lifecycle.state().is_ready() => {
                Ok(Rc::clone(player))
            }
            _ => Err(not_ready(BackendKind::Vimeo)),
        }
    }

    fn on_sdk_ready(inner: &Weak<RefCell<VimeoInner>>, api: &Rc<dyn VimeoApi>, result: Result<()>) {
        let Some(inner) = inner.upgrade() else { return };
        let (ctx, iframe_id) = {
            let mut state = inner.borrow_mut();
            state.waiter = None;
            if state.destroyed {
                return;
            }
            match (&state.ctx, &state.iframe_id) {
                (Some(ctx), Some(id)) => (ctx.clone(), id.clone()),
                _ => return,
            }
        };

        if let Err(e) = result {
            ctx.lifecycle.failed(&e);
            return;
        }

        let weak = Rc::downgrade(&inner);
        match api.attach(&iframe_id, Box::new(move |signal| Self::on_signal(&weak, signal))) {
            Ok(player) => {
                inner.borrow_mut().player = Some(player);
                info!(player_id = %ctx.lifecycle.player_id(), iframe = %iframe_id, "Vimeo player attached");
            }
            Err(e) => ctx.lifecycle.failed(&e),
        }
    }

    fn on_signal(inner: &Weak<RefCell<VimeoInner>>, signal: VimeoSignal) {
        let Some(inner) = inner.upgrade() else { return };
        let (ctx, player) = {
            let state = inner.borrow();
            if state.destroyed {
                return;
            }
            match (&state.ctx, &state.player) {
                (Some(ctx), Some(player)) => (ctx.clone(), Rc::clone(player)),
                _ => return,
            }
        };

        match signal {
            VimeoSignal::Loaded => ctx.lifecycle.loaded(),
            VimeoSignal::Play => Self::report_playing(&inner, &ctx),
            VimeoSignal::Progress { seconds } if seconds > 0.0 => {
                let armed = {
                    let state = inner.borrow();
                    state.progress_armed && !state.playing_reported
                };
                if armed {
                    debug!(player_id = %ctx.lifecycle.player_id(), seconds, "Playing inferred from progress");
                    Self::report_playing(&inner, &ctx);
                }
            }
            VimeoSignal::Progress { .. } => {}
            VimeoSignal::Pause => {
                {
                    let mut state = inner.borrow_mut();
                    state.playing_reported = false;
                    state.progress_armed = false;
                }
                ctx.lifecycle.paused();
            }
            VimeoSignal::Ended => {
                {
                    let mut state = inner.borrow_mut();
                    state.playing_reported = false;
                    state.progress_armed = ctx.options.r#loop;
                }
                ctx.lifecycle.ended();
                if ctx.options.r#loop && !ctx.lifecycle.is_destroyed() {
                    player.set_current_time(0.0);
                    player.play();
                }
            }
        }
    }

    fn report_playing(inner: &Rc<RefCell<VimeoInner>>, ctx: &AdapterContext) {
        {
            let mut state = inner.borrow_mut();
            if state.playing_reported {
                return;
            }
            state.playing_reported = true;
        }
        ctx.lifecycle.playing();
    }
}

impl Adapter for VimeoAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Vimeo
    }

    fn init(&self, ctx: AdapterContext) -> Result<()> {
        let (holder_id, src) = {
            let inner = self.inner.borrow();
            if inner.destroyed || inner.ctx.is_some() {
                return Err(Error::contract("vimeo adapter initialised twice"));
            }
            (ctx.holder_id.clone(), inner.options.embed_url(&ctx.options)?)
        };

        let iframe_id = self.api.mount_iframe(&holder_id, &src, ctx.options.controls)?;
        debug!(holder = %holder_id, src = %src, "Vimeo iframe mounted");
        {
            let mut inner = self.inner.borrow_mut();
            // Without autoplay the first progress tick can only come from a seek
            inner.progress_armed = ctx.options.autoplay;
            inner.ctx = Some(ctx);
            inner.iframe_id = Some(iframe_id);
        }

        let weak = Rc::downgrade(&self.inner);
        let api = Rc::clone(&self.api);
        let waiter = self.sdk.ensure_ready(SdkBackend::Vimeo, move |result| {
            Self::on_sdk_ready(&weak, &api, result)
        });

        let mut inner = self.inner.borrow_mut();
        if inner.player.is_none() && !inner.destroyed {
            inner.waiter = waiter;
        }
        Ok(())
    }

    fn destroy(&self) {
        let (player, waiter, iframe_id) = {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;
            (inner.player.take(), inner.waiter.take(), inner.iframe_id.take())
        };
        if let Some(waiter) = waiter {
            self.sdk.cancel(SdkBackend::Vimeo, waiter);
        }
        if let Some(player) = player {
            player.destroy();
        }
        if let Some(iframe_id) = iframe_id {
            self.api.unmount_iframe(&iframe_id);
        }
    }

    fn play(&self) -> Result<()> {
        let player = self.player()?;
        self.inner.borrow_mut().progress_armed = true;
        player.play();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.player()?.pause();
        Ok(())
    }

    fn go_to(&self, seconds: f64) -> Result<()> {
        check_seek(seconds)?;
        self.player()?.set_current_time(seconds);
        Ok(())
    }

    fn volume(&self, percent: f64) -> Result<()> {
        check_volume(percent)?;
        self.player()?.set_volume(percent / 100.0);
        Ok(())
    }

    fn mute(&self) -> Result<()> {
        self.player()?.set_muted(true);
        Ok(())
    }

    fn un_mute(&self) -> Result<()> {
        self.player()?.set_muted(false);
        Ok(())
    }
}
