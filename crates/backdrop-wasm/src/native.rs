//! `<video>` element backend

use std::cell::RefCell;
use std::rc::Rc;

use backdrop_core::adapter::{MediaSignal, NativeMedia, NativeMediaFactory, NativeMediaSpec};
use backdrop_core::{Error, Result};
use js_sys::Reflect;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlSourceElement, HtmlVideoElement};

const EVENTS: [(&str, MediaSignal); 4] = [
    ("loadeddata", MediaSignal::LoadedData),
    ("playing", MediaSignal::Playing),
    ("pause", MediaSignal::Pause),
    ("ended", MediaSignal::Ended),
];

/// Creates `<video>` elements inside the player holder
pub struct BrowserVideoFactory {
    document: Document,
}

impl BrowserVideoFactory {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn create_video(&self) -> Result<HtmlVideoElement> {
        self.document
            .create_element("video")
            .map_err(|e| Error::backend(format!("Failed to create video element: {:?}", e)))?
            .dyn_into()
            .map_err(|_| Error::backend("Element is not a video"))
    }

    fn append_source(&self, video: &HtmlVideoElement, mime: &str, src: &str) -> Result<()> {
        let source: HtmlSourceElement = self
            .document
            .create_element("source")
            .map_err(|e| Error::backend(format!("Failed to create source element: {:?}", e)))?
            .dyn_into()
            .map_err(|_| Error::backend("Element is not a source"))?;
        source.set_type(mime);
        source.set_src(src);
        video
            .append_child(&source)
            .map_err(|e| Error::backend(format!("Failed to append source: {:?}", e)))?;
        Ok(())
    }
}

fn apply_prop(video: &HtmlVideoElement, name: &str, value: &Value) -> Result<()> {
    match (name, value) {
        // iOS only honours the attribute
        ("playsinline", Value::Bool(on)) => {
            if *on {
                let _ = video.set_attribute("playsinline", "");
            } else {
                let _ = video.remove_attribute("playsinline");
            }
        }
        ("muted", Value::Bool(on)) => {
            video.set_muted(*on);
            video.set_default_muted(*on);
        }
        _ => {
            let js = value
                .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
                .map_err(|e| Error::backend(format!("Invalid video prop {}: {}", name, e)))?;
            Reflect::set(video, &JsValue::from_str(name), &js)
                .map_err(|e| Error::backend(format!("Failed to set video prop {}: {:?}", name, e)))?;
        }
    }
    Ok(())
}

impl NativeMediaFactory for BrowserVideoFactory {
    fn create(
        &self,
        spec: &NativeMediaSpec,
        on_signal: Box<dyn FnMut(MediaSignal)>,
    ) -> Result<Rc<dyn NativeMedia>> {
        let holder = self
            .document
            .get_element_by_id(&spec.holder_id)
            .ok_or_else(|| Error::backend(format!("No player holder with id {}", spec.holder_id)))?;

        let video = self.create_video()?;
        for (name, value) in &spec.props {
            apply_prop(&video, name, value)?;
        }
        if let Some(poster) = &spec.poster {
            video.set_poster(poster);
        }
        let style = video.style();
        let _ = style.set_property("width", "100%");
        let _ = style.set_property("height", "100%");
        let _ = style.set_property("object-fit", "cover");

        for (mime, src) in &spec.sources {
            self.append_source(&video, mime, src)?;
        }

        let on_signal = Rc::new(RefCell::new(on_signal));
        let mut listeners = Vec::with_capacity(EVENTS.len());
        for (event, signal) in EVENTS {
            let on_signal = Rc::clone(&on_signal);
            let listener = Closure::<dyn FnMut()>::new(move || {
                if let Ok(mut on_signal) = on_signal.try_borrow_mut() {
                    on_signal(signal);
                }
            });
            video
                .add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
                .map_err(|e| Error::backend(format!("Failed to listen for {}: {:?}", event, e)))?;
            listeners.push((event, listener));
        }

        holder
            .append_child(&video)
            .map_err(|e| Error::backend(format!("Failed to append video: {:?}", e)))?;

        Ok(Rc::new(BrowserVideo {
            video,
            listeners: RefCell::new(listeners),
        }))
    }
}

struct BrowserVideo {
    video: HtmlVideoElement,
    listeners: RefCell<Vec<(&'static str, Closure<dyn FnMut()>)>>,
}

impl NativeMedia for BrowserVideo {
    fn play(&self) {
        // Autoplay policies reject the promise rather than throwing
        match self.video.play() {
            Ok(promise) => wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = JsFuture::from(promise).await {
                    web_sys::console::warn_2(&"[Backdrop] Video play() was rejected".into(), &e);
                }
            }),
            Err(e) => web_sys::console::warn_2(&"[Backdrop] Video play() failed".into(), &e),
        }
    }

    fn pause(&self) {
        let _ = self.video.pause();
    }

    fn set_current_time(&self, seconds: f64) {
        self.video.set_current_time(seconds);
    }

    fn set_volume(&self, volume: f64) {
        self.video.set_volume(volume);
    }

    fn set_muted(&self, muted: bool) {
        self.video.set_muted(muted);
    }

    fn remove(&self) {
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for (event, listener) in &listeners {
            let _ = self
                .video
                .remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref());
        }
        self.video.remove();
    }
}
