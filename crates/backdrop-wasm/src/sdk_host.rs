//! Script injection and SDK presence checks against `window`

use backdrop_core::sdk::ReadySignal;
use backdrop_core::{Error, Result, SdkBackend, SdkHost};
use js_sys::{Function, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlScriptElement, Window};

/// [`SdkHost`] for a browser page
pub struct BrowserSdkHost {
    window: Window,
    document: Document,
}

impl BrowserSdkHost {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }

    fn global(&self, name: &str) -> Option<JsValue> {
        Reflect::get(&self.window, &JsValue::from_str(name))
            .ok()
            .filter(|value| !value.is_undefined() && !value.is_null())
    }
}

impl SdkHost for BrowserSdkHost {
    fn sdk_present(&self, backend: SdkBackend) -> bool {
        // `YT` exists while the API is still loading; `Player` only once it is usable
        self.global(backend.global_symbol())
            .and_then(|sdk| Reflect::get(&sdk, &JsValue::from_str("Player")).ok())
            .map(|player| player.is_function())
            .unwrap_or(false)
    }

    fn page_is_file(&self) -> bool {
        self.window
            .location()
            .protocol()
            .map(|protocol| protocol == "file:")
            .unwrap_or(false)
    }

    fn inject_script(&self, backend: SdkBackend, src: &str) -> Result<()> {
        let script: HtmlScriptElement = self
            .document
            .create_element("script")
            .map_err(|e| Error::backend(format!("Failed to create script element: {:?}", e)))?
            .dyn_into()
            .map_err(|_| Error::backend("Element is not a script"))?;
        script.set_src(src);
        script.set_async(true);

        let parent = self
            .document
            .head()
            .map(|head| head.unchecked_into::<web_sys::Node>())
            .or_else(|| self.document.body().map(|body| body.unchecked_into()))
            .ok_or_else(|| Error::backend("Document has neither head nor body"))?;
        parent
            .append_child(&script)
            .map_err(|e| Error::backend(format!("Failed to inject {} SDK: {:?}", backend, e)))?;
        Ok(())
    }

    fn install_ready_hook(&self, backend: SdkBackend, hook: Box<dyn FnOnce()>) -> Result<()> {
        let ReadySignal::GlobalCallback(name) = backend.ready_signal() else {
            return Err(Error::backend(format!("{} SDK has no ready callback", backend)));
        };

        // Keep a hook the page installed itself
        let previous = self.global(name).and_then(|value| value.dyn_into::<Function>().ok());
        let callback = Closure::once_into_js(move || {
            hook();
            if let Some(previous) = previous {
                let _ = previous.call0(&JsValue::NULL);
            }
        });

        Reflect::set(&self.window, &JsValue::from_str(name), &callback)
            .map_err(|e| Error::backend(format!("Failed to install {}: {:?}", name, e)))?;
        Ok(())
    }
}
