//! Backdrop WASM - browser binding for the background video widget
//!
//! Implements the core's host seams with `web-sys` and exposes one
//! `ContainerPlayer` class per container element:
//! - `<video>` elements for native sources
//! - `YT.Player` and `Vimeo.Player`, with their scripts injected on demand
//! - Window timers and `resize` events
//!
//! ## Usage
//!
//! ```javascript
//! import init, { ContainerPlayer } from '@backdrop/wasm';
//!
//! await init();
//! const el = document.querySelector('#hero');
//! el.addEventListener('video.playing', () => el.classList.add('live'));
//! const player = new ContainerPlayer(el, { youTube: { videoId: 'M7lc1UVf-VE' } });
//! ```
//!
//! Lifecycle notifications are dispatched on the container as
//! `CustomEvent`s named after the event (`player.resized`, `video.loaded`,
//! ...) with the serialized event as `detail`, and handed to callbacks
//! registered with `ContainerPlayer.on`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use backdrop_core::{
    Error, EventBus, Platform, PlayerController, PlayerEvent, PlayerOptions, SdkConfig, SdkRegistry,
};
use js_sys::Function;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::{CustomEvent, CustomEventInit, HtmlElement};

mod native;
mod sdk_host;
mod stage;
mod timers;
mod vimeo;
mod youtube;

use native::BrowserVideoFactory;
use sdk_host::BrowserSdkHost;
use stage::{DomStage, WindowResize};
use timers::BrowserScheduler;
use vimeo::BrowserVimeoApi;
use youtube::BrowserYouTubeApi;

thread_local! {
    // One SDK registry per page, shared by every instance
    static PLATFORM: RefCell<Option<Platform>> = const { RefCell::new(None) };
}

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    web_sys::console::log_1(&format!("[Backdrop WASM] Initialized v{}", backdrop_core::VERSION).into());
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js(error: Error) -> JsValue {
    let js = js_sys::Error::new(&error.to_string());
    js.set_name(error.error_code());
    js.into()
}

fn build_platform() -> Result<Platform, JsValue> {
    let window = web_sys::window().ok_or_else(|| to_js(Error::backend("No window object available")))?;
    let document = window
        .document()
        .ok_or_else(|| to_js(Error::backend("No document available")))?;

    let scheduler = BrowserScheduler::new(window.clone());
    let sdk_host = Rc::new(BrowserSdkHost::new(window.clone(), document.clone()));
    let sdk = SdkRegistry::new(sdk_host, scheduler.clone(), SdkConfig::default());

    Ok(Platform {
        scheduler,
        sdk,
        resize: Rc::new(WindowResize::new(window)),
        native: Rc::new(BrowserVideoFactory::new(document.clone())),
        youtube: Rc::new(BrowserYouTubeApi),
        vimeo: Rc::new(BrowserVimeoApi::new(document)),
    })
}

fn platform() -> Result<Platform, JsValue> {
    PLATFORM.with(|slot| {
        if let Some(platform) = slot.borrow().as_ref() {
            return Ok(platform.clone());
        }
        let platform = build_platform()?;
        *slot.borrow_mut() = Some(platform.clone());
        Ok(platform)
    })
}

type Callbacks = Rc<RefCell<Vec<(u32, String, Function)>>>;

fn deliver(target: &HtmlElement, callbacks: &Callbacks, event: &PlayerEvent) {
    let detail = match event.serialize(&serde_wasm_bindgen::Serializer::json_compatible()) {
        Ok(detail) => detail,
        Err(e) => {
            web_sys::console::warn_1(&format!("[Backdrop] Failed to serialize {}: {}", event.name(), e).into());
            JsValue::NULL
        }
    };

    let init = CustomEventInit::new();
    init.set_detail(&detail);
    match CustomEvent::new_with_event_init_dict(event.name(), &init) {
        Ok(custom) => {
            let _ = target.dispatch_event(&custom);
        }
        Err(e) => web_sys::console::warn_2(&"[Backdrop] Failed to create event".into(), &e),
    }

    // Snapshot so a callback may register or remove callbacks
    let matching: Vec<Function> = callbacks
        .borrow()
        .iter()
        .filter(|(_, name, _)| name == event.name() || name == "*")
        .map(|(_, _, callback)| callback.clone())
        .collect();
    for callback in matching {
        if let Err(e) = callback.call2(&JsValue::NULL, &JsValue::from_str(event.name()), &detail) {
            web_sys::console::error_2(&format!("[Backdrop] {} listener threw", event.name()).into(), &e);
        }
    }
}

/// A background video bound to one container element
#[wasm_bindgen]
pub struct ContainerPlayer {
    controller: PlayerController,
    callbacks: Callbacks,
    next_callback: Cell<u32>,
}

#[wasm_bindgen]
impl ContainerPlayer {
    /// Create a player inside `container`. Throws on invalid options.
    #[wasm_bindgen(constructor)]
    pub fn new(container: HtmlElement, options: JsValue) -> Result<ContainerPlayer, JsValue> {
        let options: PlayerOptions = if options.is_undefined() || options.is_null() {
            PlayerOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(|e| to_js(Error::config(e.to_string())))?
        };
        let platform = platform()?;
        let document = container
            .owner_document()
            .ok_or_else(|| to_js(Error::backend("Container is not attached to a document")))?;

        let stage = Rc::new(DomStage::new(document, container, options.overlay.clone()));
        let callbacks: Callbacks = Rc::new(RefCell::new(Vec::new()));
        let bus = Rc::new(EventBus::new());
        {
            let target = stage.container().clone();
            let callbacks = Rc::clone(&callbacks);
            bus.on(move |event| deliver(&target, &callbacks, event));
        }

        let controller = PlayerController::with_bus(options, stage, &platform, bus).map_err(to_js)?;
        Ok(Self {
            controller,
            callbacks,
            next_callback: Cell::new(0),
        })
    }

    /// Instance id
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.controller.id().to_string()
    }

    /// Selected backend: `html5`, `youTube` or `vimeo`
    #[wasm_bindgen(getter)]
    pub fn backend(&self) -> String {
        self.controller.backend_kind().to_string()
    }

    /// Lifecycle state
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.controller.state().to_string()
    }

    /// Player placement from the last layout pass
    #[wasm_bindgen(getter)]
    pub fn geometry(&self) -> JsValue {
        self.controller
            .geometry()
            .and_then(|g| g.serialize(&serde_wasm_bindgen::Serializer::json_compatible()).ok())
            .unwrap_or(JsValue::NULL)
    }

    /// Call `callback(name, detail)` for every `event`; `"*"` matches all
    pub fn on(&self, event: String, callback: Function) -> u32 {
        let id = self.next_callback.get();
        self.next_callback.set(id.wrapping_add(1));
        self.callbacks.borrow_mut().push((id, event, callback));
        id
    }

    /// Remove a callback registered with `on`
    pub fn off(&self, id: u32) -> bool {
        let mut callbacks = self.callbacks.borrow_mut();
        let before = callbacks.len();
        callbacks.retain(|(cid, _, _)| *cid != id);
        callbacks.len() != before
    }

    /// Re-run the layout pass, e.g. after the container changed size
    pub fn resize(&self) -> Result<(), JsValue> {
        self.controller.resize().map(|_| ()).map_err(to_js)
    }

    pub fn play(&self) -> Result<(), JsValue> {
        self.controller.play().map_err(to_js)
    }

    pub fn pause(&self) -> Result<(), JsValue> {
        self.controller.pause().map_err(to_js)
    }

    /// Seek to `seconds`
    #[wasm_bindgen(js_name = goTo)]
    pub fn go_to(&self, seconds: f64) -> Result<(), JsValue> {
        self.controller.go_to(seconds).map_err(to_js)
    }

    /// Set the volume, 0 to 100
    pub fn volume(&self, percent: f64) -> Result<(), JsValue> {
        self.controller.volume(percent).map_err(to_js)
    }

    pub fn mute(&self) -> Result<(), JsValue> {
        self.controller.mute().map_err(to_js)
    }

    #[wasm_bindgen(js_name = unMute)]
    pub fn un_mute(&self) -> Result<(), JsValue> {
        self.controller.un_mute().map_err(to_js)
    }

    /// Tear down the player. Further calls are no-ops.
    pub fn destroy(&self) {
        self.controller.destroy();
        self.callbacks.borrow_mut().clear();
    }
}
