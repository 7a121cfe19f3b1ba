//! Backend adapters
//!
//! Each backend (native `<video>`, YouTube, Vimeo) has its own control
//! surface and event vocabulary. Adapters translate both into the
//! [`Adapter`] contract and the shared [`Lifecycle`] state machine.
//! [`BoundAdapter`] is the closed set of variants a controller can hold.

mod native;
mod vimeo;
mod youtube;

pub use native::{MediaSignal, NativeMedia, NativeMediaFactory, NativeMediaSpec, NativeVideoAdapter};
pub use vimeo::{VimeoAdapter, VimeoApi, VimeoPlayer, VimeoSignal};
pub use youtube::{
    YouTubeAdapter, YouTubeApi, YouTubePlayer, YouTubePlayerSpec, YouTubeSignal, YouTubeState,
    FRAME_POLL_INTERVAL, FRAME_VISIBLE_AFTER_SECS,
};

use std::rc::Rc;

use crate::config::{BackendOptions, PlayerOptions};
use crate::events::Lifecycle;
use crate::host::Platform;
use crate::types::BackendKind;
use crate::{Error, Result};

/// What an adapter needs from its controller
#[derive(Clone)]
pub struct AdapterContext {
    pub lifecycle: Rc<Lifecycle>,
    pub holder_id: String,
    pub options: Rc<PlayerOptions>,
}

/// Unified playback contract
pub trait Adapter {
    fn kind(&self) -> BackendKind;

    /// Bind to the backend. Readiness may arrive later through the lifecycle.
    fn init(&self, ctx: AdapterContext) -> Result<()>;

    /// Release the backend player and every timer or subscription owned by
    /// the adapter. Safe to call more than once.
    fn destroy(&self);

    fn play(&self) -> Result<()>;
    fn pause(&self) -> Result<()>;

    /// Seek to an absolute position in seconds
    fn go_to(&self, seconds: f64) -> Result<()>;

    /// Set the volume, 0 to 100
    fn volume(&self, percent: f64) -> Result<()>;

    fn mute(&self) -> Result<()>;
    fn un_mute(&self) -> Result<()>;
}

/// The adapter variant bound to a controller
#[derive(Clone)]
pub enum BoundAdapter {
    Native(NativeVideoAdapter),
    YouTube(YouTubeAdapter),
    Vimeo(VimeoAdapter),
}

impl BoundAdapter {
    /// Build the variant matching the configured backend
    pub fn select(backend: &BackendOptions, platform: &Platform) -> Self {
        match backend {
            BackendOptions::Html5(o) => {
                BoundAdapter::Native(NativeVideoAdapter::new(o.clone(), Rc::clone(&platform.native)))
            }
            BackendOptions::YouTube(o) => BoundAdapter::YouTube(YouTubeAdapter::new(
                o.clone(),
                Rc::clone(&platform.youtube),
                Rc::clone(&platform.sdk),
                Rc::clone(&platform.scheduler),
            )),
            BackendOptions::Vimeo(o) => BoundAdapter::Vimeo(VimeoAdapter::new(
                o.clone(),
                Rc::clone(&platform.vimeo),
                Rc::clone(&platform.sdk),
            )),
        }
    }

    fn inner(&self) -> &dyn Adapter {
        match self {
            BoundAdapter::Native(a) => a,
            BoundAdapter::YouTube(a) => a,
            BoundAdapter::Vimeo(a) => a,
        }
    }
}

impl Adapter for BoundAdapter {
    fn kind(&self) -> BackendKind {
        self.inner().kind()
    }

    fn init(&self, ctx: AdapterContext) -> Result<()> {
        self.inner().init(ctx)
    }

    fn destroy(&self) {
        self.inner().destroy()
    }

    fn play(&self) -> Result<()> {
        self.inner().play()
    }

    fn pause(&self) -> Result<()> {
        self.inner().pause()
    }

    fn go_to(&self, seconds: f64) -> Result<()> {
        self.inner().go_to(seconds)
    }

    fn volume(&self, percent: f64) -> Result<()> {
        self.inner().volume(percent)
    }

    fn mute(&self) -> Result<()> {
        self.inner().mute()
    }

    fn un_mute(&self) -> Result<()> {
        self.inner().un_mute()
    }
}

pub(crate) fn check_volume(percent: f64) -> Result<()> {
    if (0.0..=100.0).contains(&percent) {
        Ok(())
    } else {
        Err(Error::contract(format!("volume must be within 0..=100, got {}", percent)))
    }
}

pub(crate) fn check_seek(seconds: f64) -> Result<()> {
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(())
    } else {
        Err(Error::contract(format!("cannot seek to {} seconds", seconds)))
    }
}

pub(crate) fn not_ready(backend: BackendKind) -> Error {
    Error::contract(format!("{} player is not ready", backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_bounds() {
        assert!(check_volume(0.0).is_ok());
        assert!(check_volume(100.0).is_ok());
        assert!(check_volume(-1.0).is_err());
        assert!(check_volume(100.5).is_err());
        assert!(check_volume(f64::NAN).is_err());
    }

    #[test]
    fn test_seek_bounds() {
        assert!(check_seek(0.0).is_ok());
        assert!(check_seek(12.5).is_ok());
        assert!(check_seek(-0.1).is_err());
        assert!(check_seek(f64::INFINITY).is_err());
    }
}
