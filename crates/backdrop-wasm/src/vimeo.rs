//! Vimeo iframe and `Vimeo.Player` bindings

use std::cell::RefCell;
use std::rc::Rc;

use backdrop_core::adapter::{VimeoApi, VimeoPlayer, VimeoSignal};
use backdrop_core::{Error, Result};
use js_sys::{Promise, Reflect};
use url::Url;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlIFrameElement};

#[wasm_bindgen(js_namespace = Vimeo)]
extern "C" {
    #[wasm_bindgen(js_name = Player)]
    type JsVimeoPlayer;

    /// `new Vimeo.Player(iframe)`
    #[wasm_bindgen(constructor, js_class = "Player", catch)]
    fn new(iframe: &HtmlIFrameElement) -> std::result::Result<JsVimeoPlayer, JsValue>;

    #[wasm_bindgen(method)]
    fn on(this: &JsVimeoPlayer, event: &str, callback: &js_sys::Function);

    #[wasm_bindgen(method)]
    fn off(this: &JsVimeoPlayer, event: &str);

    #[wasm_bindgen(method)]
    fn play(this: &JsVimeoPlayer) -> Promise;

    #[wasm_bindgen(method)]
    fn pause(this: &JsVimeoPlayer) -> Promise;

    #[wasm_bindgen(method, js_name = setCurrentTime)]
    fn set_current_time(this: &JsVimeoPlayer, seconds: f64) -> Promise;

    #[wasm_bindgen(method, js_name = setVolume)]
    fn set_volume(this: &JsVimeoPlayer, volume: f64) -> Promise;

    #[wasm_bindgen(method, js_name = setMuted)]
    fn set_muted(this: &JsVimeoPlayer, muted: bool) -> Promise;

    #[wasm_bindgen(method)]
    fn destroy(this: &JsVimeoPlayer) -> Promise;
}

const EVENTS: [&str; 5] = ["loaded", "play", "pause", "ended", "timeupdate"];

/// Report rejected player promises instead of leaving them unhandled
fn settle(promise: Promise, operation: &'static str) {
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(e) = JsFuture::from(promise).await {
            web_sys::console::warn_2(&format!("[Backdrop] Vimeo {} failed", operation).into(), &e);
        }
    });
}

/// Mounts embed iframes and wraps them with the global `Vimeo` client
pub struct BrowserVimeoApi {
    document: Document,
}

impl BrowserVimeoApi {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn iframe(&self, iframe_id: &str) -> Result<HtmlIFrameElement> {
        self.document
            .get_element_by_id(iframe_id)
            .ok_or_else(|| Error::backend(format!("No iframe with id {}", iframe_id)))?
            .dyn_into()
            .map_err(|_| Error::backend(format!("#{} is not an iframe", iframe_id)))
    }
}

impl VimeoApi for BrowserVimeoApi {
    fn mount_iframe(&self, holder_id: &str, src: &Url, interactive: bool) -> Result<String> {
        let holder = self
            .document
            .get_element_by_id(holder_id)
            .ok_or_else(|| Error::backend(format!("No player holder with id {}", holder_id)))?;
        let iframe: HtmlIFrameElement = self
            .document
            .create_element("iframe")
            .map_err(|e| Error::backend(format!("Failed to create iframe: {:?}", e)))?
            .dyn_into()
            .map_err(|_| Error::backend("Element is not an iframe"))?;

        let iframe_id = format!("{}-vimeo", holder_id);
        iframe.set_id(&iframe_id);
        iframe.set_src(src.as_str());
        iframe.set_width("100%");
        iframe.set_height("100%");
        iframe.set_frame_border("0");
        let _ = iframe.set_attribute("allow", "autoplay; fullscreen; picture-in-picture");
        if !interactive {
            let _ = iframe.style().set_property("pointer-events", "none");
        }

        holder
            .append_child(&iframe)
            .map_err(|e| Error::backend(format!("Failed to append iframe: {:?}", e)))?;
        Ok(iframe_id)
    }

    fn attach(&self, iframe_id: &str, on_signal: Box<dyn FnMut(VimeoSignal)>) -> Result<Rc<dyn VimeoPlayer>> {
        let iframe = self.iframe(iframe_id)?;
        let player = JsVimeoPlayer::new(&iframe)
            .map_err(|e| Error::backend(format!("Vimeo.Player construction failed: {:?}", e)))?;

        let on_signal = Rc::new(RefCell::new(on_signal));
        let mut listeners = Vec::with_capacity(EVENTS.len());
        for event in EVENTS {
            let on_signal = Rc::clone(&on_signal);
            let listener = Closure::<dyn FnMut(JsValue)>::new(move |data: JsValue| {
                let signal = match event {
                    "loaded" => VimeoSignal::Loaded,
                    "play" => VimeoSignal::Play,
                    "pause" => VimeoSignal::Pause,
                    "ended" => VimeoSignal::Ended,
                    _ => VimeoSignal::Progress {
                        seconds: Reflect::get(&data, &JsValue::from_str("seconds"))
                            .ok()
                            .and_then(|s| s.as_f64())
                            .unwrap_or(0.0),
                    },
                };
                if let Ok(mut on_signal) = on_signal.try_borrow_mut() {
                    on_signal(signal);
                }
            });
            player.on(event, listener.as_ref().unchecked_ref());
            listeners.push(listener);
        }

        Ok(Rc::new(BrowserVimeoPlayer {
            player,
            _listeners: listeners,
        }))
    }

    fn unmount_iframe(&self, iframe_id: &str) {
        if let Ok(iframe) = self.iframe(iframe_id) {
            iframe.remove();
        }
    }
}

struct BrowserVimeoPlayer {
    player: JsVimeoPlayer,
    _listeners: Vec<Closure<dyn FnMut(JsValue)>>,
}

impl VimeoPlayer for BrowserVimeoPlayer {
    fn play(&self) {
        settle(self.player.play(), "play");
    }

    fn pause(&self) {
        settle(self.player.pause(), "pause");
    }

    fn set_current_time(&self, seconds: f64) {
        settle(self.player.set_current_time(seconds), "setCurrentTime");
    }

    fn set_volume(&self, volume: f64) {
        settle(self.player.set_volume(volume), "setVolume");
    }

    fn set_muted(&self, muted: bool) {
        settle(self.player.set_muted(muted), "setMuted");
    }

    fn destroy(&self) {
        for event in EVENTS {
            self.player.off(event);
        }
        settle(self.player.destroy(), "destroy");
    }
}
