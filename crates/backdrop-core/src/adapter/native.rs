//! Native `<video>` adapter

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};
use tracing::debug;

use super::{check_seek, check_volume, not_ready, Adapter, AdapterContext};
use crate::config::Html5Options;
use crate::types::BackendKind;
use crate::{Error, Result};

/// Media element events the adapter listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSignal {
    LoadedData,
    Playing,
    Pause,
    Ended,
}

/// Everything needed to build the `<video>` element
#[derive(Debug, Clone, PartialEq)]
pub struct NativeMediaSpec {
    pub holder_id: String,
    pub sources: Vec<(String, String)>,
    pub props: Map<String, Value>,
    pub poster: Option<String>,
}

/// Creates media elements inside the player holder
pub trait NativeMediaFactory {
    fn create(
        &self,
        spec: &NativeMediaSpec,
        on_signal: Box<dyn FnMut(MediaSignal)>,
    ) -> Result<Rc<dyn NativeMedia>>;
}

/// Control surface of a media element
pub trait NativeMedia {
    fn play(&self);
    fn pause(&self);
    fn set_current_time(&self, seconds: f64);
    /// Volume in 0.0..=1.0
    fn set_volume(&self, volume: f64);
    fn set_muted(&self, muted: bool);
    /// Detach listeners and remove the element
    fn remove(&self);
}

struct NativeInner {
    options: Html5Options,
    ctx: Option<AdapterContext>,
    media: Option<Rc<dyn NativeMedia>>,
    destroyed: bool,
}

/// Adapter over the page's own media element
#[derive(Clone)]
pub struct NativeVideoAdapter {
    inner: Rc<RefCell<NativeInner>>,
    factory: Rc<dyn NativeMediaFactory>,
}

impl NativeVideoAdapter {
    pub fn new(options: Html5Options, factory: Rc<dyn NativeMediaFactory>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NativeInner {
                options,
                ctx: None,
                media: None,
                destroyed: false,
            })),
            factory,
        }
    }

    fn media(&self) -> Result<Rc<dyn NativeMedia>> {
        let inner = self.inner.borrow();
        match (&inner.ctx, &inner.media) {
            (Some(ctx), Some(media)) if !inner.destroyed && ctx.lifecycle.state().is_ready() => {
                Ok(Rc::clone(media))
            }
            _ => Err(not_ready(BackendKind::Html5)),
        }
    }

    fn on_signal(inner: &Weak<RefCell<NativeInner>>, signal: MediaSignal) {
        let Some(inner) = inner.upgrade() else { return };
        let (ctx, media) = {
            let inner = inner.borrow();
            if inner.destroyed {
                return;
            }
            match &inner.ctx {
                Some(ctx) => (ctx.clone(), inner.media.clone()),
                None => return,
            }
        };
        debug!(player_id = %ctx.lifecycle.player_id(), ?signal, "Media signal");

        match signal {
            MediaSignal::LoadedData => {
                ctx.lifecycle.loaded();
                if ctx.options.autoplay {
                    if let Some(media) = media {
                        media.play();
                    }
                }
            }
            MediaSignal::Playing => ctx.lifecycle.playing(),
            MediaSignal::Pause => ctx.lifecycle.paused(),
            MediaSignal::Ended => {
                ctx.lifecycle.ended();
                if ctx.options.r#loop && !ctx.lifecycle.is_destroyed() {
                    if let Some(media) = media {
                        media.set_current_time(0.0);
                        media.play();
                    }
                }
            }
        }
    }
}

impl Adapter for NativeVideoAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Html5
    }

    fn init(&self, ctx: AdapterContext) -> Result<()> {
        let spec = {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed || inner.ctx.is_some() {
                return Err(Error::contract("html5 adapter initialised twice"));
            }
            let spec = NativeMediaSpec {
                holder_id: ctx.holder_id.clone(),
                sources: inner.options.sources.clone(),
                props: inner.options.resolved_props(&ctx.options),
                poster: inner.options.poster.clone(),
            };
            inner.ctx = Some(ctx);
            spec
        };

        let weak = Rc::downgrade(&self.inner);
        let media = self
            .factory
            .create(&spec, Box::new(move |signal| Self::on_signal(&weak, signal)))?;
        self.inner.borrow_mut().media = Some(media);
        debug!(holder = %spec.holder_id, sources = spec.sources.len(), "Video element created");
        Ok(())
    }

    fn destroy(&self) {
        let media = {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;
            inner.media.take()
        };
        if let Some(media) = media {
            media.pause();
            media.remove();
        }
    }

    fn play(&self) -> Result<()> {
        self.media()?.play();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.media()?.pause();
        Ok(())
    }

    fn go_to(&self, seconds: f64) -> Result<()> {
        check_seek(seconds)?;
        self.media()?.set_current_time(seconds);
        Ok(())
    }

    fn volume(&self, percent: f64) -> Result<()> {
        check_volume(percent)?;
        self.media()?.set_volume(percent / 100.0);
        Ok(())
    }

    fn mute(&self) -> Result<()> {
        self.media()?.set_muted(true);
        Ok(())
    }

    fn un_mute(&self) -> Result<()> {
        self.media()?.set_muted(false);
        Ok(())
    }
}
