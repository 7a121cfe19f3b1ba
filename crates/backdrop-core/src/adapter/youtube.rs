//! YouTube IFrame API adapter
//!
//! YouTube reports `PLAYING` before the first frame is painted, which shows
//! up as a flash of black or of the thumbnail. The adapter only emits
//! `video.playing` once the reported playback time has moved past
//! [`FRAME_VISIBLE_AFTER_SECS`], checked every [`FRAME_POLL_INTERVAL`].
//! Looping is done by hand because the player's `loop` variable does not
//! work reliably with controls hidden.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{check_seek, check_volume, not_ready, Adapter, AdapterContext};
use crate::config::YouTubeOptions;
use crate::sdk::{SdkBackend, SdkRegistry, WaiterId};
use crate::timer::{Scheduler, TimerHandle};
use crate::types::BackendKind;
use crate::{Error, Result};

/// How often the playback time is sampled while waiting for a frame
pub const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Playback time after which a frame is assumed to be on screen
pub const FRAME_VISIBLE_AFTER_SECS: f64 = 0.26;

/// `YT.PlayerState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl YouTubeState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(YouTubeState::Unstarted),
            0 => Some(YouTubeState::Ended),
            1 => Some(YouTubeState::Playing),
            2 => Some(YouTubeState::Paused),
            3 => Some(YouTubeState::Buffering),
            5 => Some(YouTubeState::Cued),
            _ => None,
        }
    }
}

/// Events of `YT.Player`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeSignal {
    Ready,
    StateChange(YouTubeState),
}

/// Arguments of `new YT.Player(holder, { videoId, playerVars, events })`
#[derive(Debug, Clone, PartialEq)]
pub struct YouTubePlayerSpec {
    pub holder_id: String,
    pub video_id: String,
    pub player_vars: Map<String, Value>,
}

/// Constructs `YT.Player` instances. Only called once the SDK is ready.
pub trait YouTubeApi {
    fn create_player(
        &self,
        spec: &YouTubePlayerSpec,
        on_signal: Box<dyn FnMut(YouTubeSignal)>,
    ) -> Result<Rc<dyn YouTubePlayer>>;
}

/// Control surface of `YT.Player`
pub trait YouTubePlayer {
    fn play_video(&self);
    fn pause_video(&self);
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool);
    /// Volume in 0..=100
    fn set_volume(&self, percent: f64);
    fn mute(&self);
    fn un_mute(&self);
    fn current_time(&self) -> f64;
    fn destroy(&self);
}

struct YouTubeInner {
    options: YouTubeOptions,
    ctx: Option<AdapterContext>,
    player: Option<Rc<dyn YouTubePlayer>>,
    waiter: Option<WaiterId>,
    frame_poll: Option<TimerHandle>,
    destroyed: bool,
}

/// Adapter over the YouTube embedded player
#[derive(Clone)]
pub struct YouTubeAdapter {
    inner: Rc<RefCell<YouTubeInner>>,
    api: Rc<dyn YouTubeApi>,
    sdk: Rc<SdkRegistry>,
    scheduler: Rc<dyn Scheduler>,
}

impl YouTubeAdapter {
    pub fn new(
        options: YouTubeOptions,
        api: Rc<dyn YouTubeApi>,
        sdk: Rc<SdkRegistry>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(YouTubeInner {
                options,
                ctx: None,
                player: None,
                waiter: None,
                frame_poll: None,
                destroyed: false,
            })),
            api,
            sdk,
            scheduler,
        }
    }

    /// Whether the anti-flicker poll is currently running
    pub fn is_waiting_for_frame(&self) -> bool {
        self.inner.borrow().frame_poll.is_some()
    }

    fn player(&self) -> Result<Rc<dyn YouTubePlayer>> {
        let inner = self.inner.borrow();
        match (&inner.ctx, &inner.player) {
            (Some(ctx), Some(player)) if !inner.destroyed && ctx.lifecycle.state().is_ready() => {
                Ok(Rc::clone(player))
            }
            _ => Err(not_ready(BackendKind::YouTube)),
        }
    }

    fn on_sdk_ready(&self, result: Result<()>) {
        let (ctx, spec) = {
            let mut inner = self.inner.borrow_mut();
            inner.waiter = None;
            if inner.destroyed {
                return;
            }
            let Some(ctx) = inner.ctx.clone() else { return };
            let spec = YouTubePlayerSpec {
                holder_id: ctx.holder_id.clone(),
                video_id: inner.options.video_id.clone(),
                player_vars: inner.options.resolved_player_vars(&ctx.options),
            };
            (ctx, spec)
        };

        if let Err(e) = result {
            ctx.lifecycle.failed(&e);
            return;
        }

        let this = self.downgrade();
        match self.api.create_player(
            &spec,
            Box::new(move |signal| {
                if let Some(adapter) = this.upgrade() {
                    adapter.on_signal(signal);
                }
            }),
        ) {
            Ok(player) => {
                self.inner.borrow_mut().player = Some(player);
                info!(player_id = %ctx.lifecycle.player_id(), video_id = %spec.video_id, "YouTube player created");
            }
            Err(e) => ctx.lifecycle.failed(&e),
        }
    }

    fn on_signal(&self, signal: YouTubeSignal) {
        let (ctx, player) = {
            let inner = self.inner.borrow();
            if inner.destroyed {
                return;
            }
            match (&inner.ctx, &inner.player) {
                (Some(ctx), Some(player)) => (ctx.clone(), Rc::clone(player)),
                _ => return,
            }
        };
        debug!(player_id = %ctx.lifecycle.player_id(), ?signal, "YouTube signal");

        match signal {
            YouTubeSignal::Ready => {
                ctx.lifecycle.loaded();
                if ctx.options.muted {
                    player.mute();
                }
                if ctx.options.autoplay {
                    player.play_video();
                }
            }
            YouTubeSignal::StateChange(YouTubeState::Playing) => self.wait_for_frame(&ctx, &player),
            YouTubeSignal::StateChange(YouTubeState::Paused) => {
                self.stop_frame_poll();
                ctx.lifecycle.paused();
            }
            YouTubeSignal::StateChange(YouTubeState::Ended) => {
                self.stop_frame_poll();
                ctx.lifecycle.ended();
                if ctx.options.r#loop && !ctx.lifecycle.is_destroyed() {
                    player.seek_to(0.0, true);
                    player.play_video();
                }
            }
            YouTubeSignal::StateChange(_) => {}
        }
    }

    fn wait_for_frame(&self, ctx: &AdapterContext, player: &Rc<dyn YouTubePlayer>) {
        if ctx.lifecycle.state() == crate::PlayerState::Playing || self.is_waiting_for_frame() {
            return;
        }

        let this = self.downgrade();
        let lifecycle = Rc::clone(&ctx.lifecycle);
        let player = Rc::downgrade(player);
        let poll = TimerHandle::interval(&self.scheduler, FRAME_POLL_INTERVAL, move || {
            let (Some(adapter), Some(player)) = (this.upgrade(), player.upgrade()) else {
                return;
            };
            if player.current_time() > FRAME_VISIBLE_AFTER_SECS {
                adapter.stop_frame_poll();
                lifecycle.playing();
            }
        });
        self.inner.borrow_mut().frame_poll = Some(poll);
    }

    fn stop_frame_poll(&self) {
        let poll = self.inner.borrow_mut().frame_poll.take();
        drop(poll);
    }

    fn downgrade(&self) -> WeakYouTubeAdapter {
        WeakYouTubeAdapter {
            inner: Rc::downgrade(&self.inner),
            api: Rc::clone(&self.api),
            sdk: Rc::clone(&self.sdk),
            scheduler: Rc::clone(&self.scheduler),
        }
    }
}

/// Callback-side reference that does not keep the adapter state alive
struct WeakYouTubeAdapter {
    inner: Weak<RefCell<YouTubeInner>>,
    api: Rc<dyn YouTubeApi>,
    sdk: Rc<SdkRegistry>,
    scheduler: Rc<dyn Scheduler>,
}

impl WeakYouTubeAdapter {
    fn upgrade(&self) -> Option<YouTubeAdapter> {
        Some(YouTubeAdapter {
            inner: self.inner.upgrade()?,
            api: Rc::clone(&self.api),
            sdk: Rc::clone(&self.sdk),
            scheduler: Rc::clone(&self.scheduler),
        })
    }
}

impl Adapter for YouTubeAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::YouTube
    }

    fn init(&self, ctx: AdapterContext) -> Result<()> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed || inner.ctx.is_some() {
                return Err(Error::contract("youTube adapter initialised twice"));
            }
            inner.ctx = Some(ctx);
        }

        let this = self.downgrade();
        let waiter = self.sdk.ensure_ready(SdkBackend::YouTube, move |result| {
            if let Some(adapter) = this.upgrade() {
                adapter.on_sdk_ready(result);
            }
        });

        // Only still pending if the SDK callback has not run yet
        let mut inner = self.inner.borrow_mut();
        if inner.player.is_none() && !inner.destroyed {
            inner.waiter = waiter;
        }
        Ok(())
    }

    fn destroy(&self) {
        let (player, waiter, poll) = {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;
            (inner.player.take(), inner.waiter.take(), inner.frame_poll.take())
        };
        drop(poll);
        if let Some(waiter) = waiter {
            self.sdk.cancel(SdkBackend::YouTube, waiter);
        }
        if let Some(player) = player {
            player.destroy();
        }
    }

    fn play(&self) -> Result<()> {
        self.player()?.play_video();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.player()?.pause_video();
        Ok(())
    }

    fn go_to(&self, seconds: f64) -> Result<()> {
        check_seek(seconds)?;
        self.player()?.seek_to(seconds, true);
        Ok(())
    }

    fn volume(&self, percent: f64) -> Result<()> {
        check_volume(percent)?;
        self.player()?.set_volume(percent);
        Ok(())
    }

    fn mute(&self) -> Result<()> {
        self.player()?.mute();
        Ok(())
    }

    fn un_mute(&self) -> Result<()> {
        self.player()?.un_mute();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        assert_eq!(YouTubeState::from_code(1), Some(YouTubeState::Playing));
        assert_eq!(YouTubeState::from_code(0), Some(YouTubeState::Ended));
        assert_eq!(YouTubeState::from_code(-1), Some(YouTubeState::Unstarted));
        assert_eq!(YouTubeState::from_code(4), None);
    }
}
