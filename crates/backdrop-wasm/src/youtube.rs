//! `YT.Player` bindings

use std::rc::Rc;

use backdrop_core::adapter::{YouTubeApi, YouTubePlayer, YouTubePlayerSpec, YouTubeSignal, YouTubeState};
use backdrop_core::{Error, Result};
use js_sys::{Object, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(js_namespace = YT)]
extern "C" {
    #[wasm_bindgen(js_name = Player)]
    type JsYouTubePlayer;

    /// `new YT.Player(elementId, options)`
    #[wasm_bindgen(constructor, js_class = "Player", catch)]
    fn new(element_id: &str, options: &JsValue) -> std::result::Result<JsYouTubePlayer, JsValue>;

    #[wasm_bindgen(method, js_name = playVideo)]
    fn play_video(this: &JsYouTubePlayer);

    #[wasm_bindgen(method, js_name = pauseVideo)]
    fn pause_video(this: &JsYouTubePlayer);

    #[wasm_bindgen(method, js_name = seekTo)]
    fn seek_to(this: &JsYouTubePlayer, seconds: f64, allow_seek_ahead: bool);

    #[wasm_bindgen(method, js_name = setVolume)]
    fn set_volume(this: &JsYouTubePlayer, volume: f64);

    #[wasm_bindgen(method)]
    fn mute(this: &JsYouTubePlayer);

    #[wasm_bindgen(method, js_name = unMute)]
    fn un_mute(this: &JsYouTubePlayer);

    #[wasm_bindgen(method, js_name = getCurrentTime)]
    fn get_current_time(this: &JsYouTubePlayer) -> f64;

    #[wasm_bindgen(method)]
    fn destroy(this: &JsYouTubePlayer);
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<()> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(|e| Error::backend(format!("Failed to set {}: {:?}", key, e)))
}

/// Constructs players through the global `YT` namespace
pub struct BrowserYouTubeApi;

impl YouTubeApi for BrowserYouTubeApi {
    fn create_player(
        &self,
        spec: &YouTubePlayerSpec,
        on_signal: Box<dyn FnMut(YouTubeSignal)>,
    ) -> Result<Rc<dyn YouTubePlayer>> {
        let on_signal = Rc::new(std::cell::RefCell::new(on_signal));

        let on_ready = {
            let on_signal = Rc::clone(&on_signal);
            Closure::<dyn FnMut(JsValue)>::new(move |_event: JsValue| {
                if let Ok(mut on_signal) = on_signal.try_borrow_mut() {
                    on_signal(YouTubeSignal::Ready);
                }
            })
        };
        let on_state_change = {
            let on_signal = Rc::clone(&on_signal);
            Closure::<dyn FnMut(JsValue)>::new(move |event: JsValue| {
                let state = Reflect::get(&event, &JsValue::from_str("data"))
                    .ok()
                    .and_then(|data| data.as_f64())
                    .and_then(|code| YouTubeState::from_code(code as i32));
                if let (Some(state), Ok(mut on_signal)) = (state, on_signal.try_borrow_mut()) {
                    on_signal(YouTubeSignal::StateChange(state));
                }
            })
        };

        let player_vars = spec
            .player_vars
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| Error::backend(format!("Invalid playerVars: {}", e)))?;

        let events = Object::new();
        set(&events, "onReady", on_ready.as_ref())?;
        set(&events, "onStateChange", on_state_change.as_ref())?;

        let options = Object::new();
        set(&options, "videoId", &JsValue::from_str(&spec.video_id))?;
        set(&options, "playerVars", &player_vars)?;
        set(&options, "events", &events)?;

        let player = JsYouTubePlayer::new(&spec.holder_id, &options)
            .map_err(|e| Error::backend(format!("YT.Player construction failed: {:?}", e)))?;

        Ok(Rc::new(BrowserYouTubePlayer {
            player,
            _on_ready: on_ready,
            _on_state_change: on_state_change,
        }))
    }
}

struct BrowserYouTubePlayer {
    player: JsYouTubePlayer,
    _on_ready: Closure<dyn FnMut(JsValue)>,
    _on_state_change: Closure<dyn FnMut(JsValue)>,
}

impl YouTubePlayer for BrowserYouTubePlayer {
    fn play_video(&self) {
        self.player.play_video();
    }

    fn pause_video(&self) {
        self.player.pause_video();
    }

    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) {
        self.player.seek_to(seconds, allow_seek_ahead);
    }

    fn set_volume(&self, percent: f64) {
        self.player.set_volume(percent);
    }

    fn mute(&self) {
        self.player.mute();
    }

    fn un_mute(&self) {
        self.player.un_mute();
    }

    fn current_time(&self) -> f64 {
        self.player.get_current_time()
    }

    fn destroy(&self) {
        self.player.destroy();
    }
}
