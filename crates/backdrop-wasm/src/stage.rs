//! Container element and window resize signal

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use backdrop_core::{Error, Geometry, OverlayOptions, ResizeSource, Result, Stage};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, Window};

const FADE_IN: &str = "opacity 1s ease-in";

fn px(value: f64) -> String {
    format!("{}px", value)
}

fn set_styles(element: &HtmlElement, styles: &[(&str, &str)]) {
    let style = element.style();
    for (name, value) in styles {
        let _ = style.set_property(name, value);
    }
}

fn create_div(document: &Document) -> Result<HtmlElement> {
    document
        .create_element("div")
        .map_err(|e| Error::backend(format!("Failed to create element: {:?}", e)))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| Error::backend("Element is not an HtmlElement"))
}

fn remove(element: Option<HtmlElement>) {
    if let Some(element) = element {
        element.remove();
    }
}

/// The host's container element
pub struct DomStage {
    document: Document,
    container: HtmlElement,
    overlay_options: Option<OverlayOptions>,
    holder: RefCell<Option<HtmlElement>>,
    poster: RefCell<Option<HtmlElement>>,
    overlay: RefCell<Option<HtmlElement>>,
    // Backend controls are shown, so the player must stay reachable
    interactive: Cell<bool>,
}

impl DomStage {
    pub fn new(document: Document, container: HtmlElement, overlay: Option<OverlayOptions>) -> Self {
        Self {
            document,
            container,
            overlay_options: overlay,
            holder: RefCell::new(None),
            poster: RefCell::new(None),
            overlay: RefCell::new(None),
            interactive: Cell::new(false),
        }
    }

    pub fn container(&self) -> &HtmlElement {
        &self.container
    }

    fn mount_overlay(&self, options: &OverlayOptions) -> Result<()> {
        let overlay = create_div(&self.document)?;
        set_styles(
            &overlay,
            &[("position", "absolute"), ("inset", "0"), ("z-index", "2"), ("pointer-events", "none")],
        );
        if let Some(class) = &options.class {
            overlay.set_class_name(class);
        }
        let style = overlay.style();
        if let Some(opacity) = options.opacity {
            let _ = style.set_property("opacity", &opacity.to_string());
        }
        if let Some(color) = &options.color {
            let _ = style.set_property("background-color", color);
        }
        if let Some(image) = &options.image {
            let _ = style.set_property("background-image", &format!("url(\"{}\")", image));
        }
        if let Some(size) = &options.background_size {
            let _ = style.set_property("background-size", size);
        }
        if let Some(repeat) = &options.background_repeat {
            let _ = style.set_property("background-repeat", repeat);
        }

        self.container
            .append_child(&overlay)
            .map_err(|e| Error::backend(format!("Failed to append overlay: {:?}", e)))?;
        *self.overlay.borrow_mut() = Some(overlay);
        Ok(())
    }
}

impl Stage for DomStage {
    fn mount(&self, holder_id: &str, interactive: bool) -> Result<()> {
        set_styles(&self.container, &[("position", "relative"), ("overflow", "hidden")]);
        self.interactive.set(interactive);

        let holder = create_div(&self.document)?;
        holder.set_id(holder_id);
        set_styles(&holder, &[("position", "absolute"), ("z-index", "0")]);
        if !interactive {
            // Hidden until the first frame is up
            set_styles(&holder, &[("opacity", "0"), ("pointer-events", "none")]);
        }
        self.container
            .append_child(&holder)
            .map_err(|e| Error::backend(format!("Failed to append player holder: {:?}", e)))?;
        *self.holder.borrow_mut() = Some(holder);

        if let Some(options) = &self.overlay_options {
            self.mount_overlay(options)?;
        }
        Ok(())
    }

    fn unmount(&self) {
        remove(self.holder.borrow_mut().take());
        remove(self.poster.borrow_mut().take());
        remove(self.overlay.borrow_mut().take());
    }

    fn container_size(&self) -> (f64, f64) {
        let rect = self.container.get_bounding_client_rect();
        (rect.width(), rect.height())
    }

    fn set_container_height(&self, height: f64) {
        let _ = self.container.style().set_property("height", &px(height));
    }

    fn place_player(&self, geometry: &Geometry) {
        if let Some(holder) = self.holder.borrow().as_ref() {
            set_styles(
                holder,
                &[
                    ("width", px(geometry.width).as_str()),
                    ("height", px(geometry.height).as_str()),
                    ("left", px(geometry.offset_left).as_str()),
                    ("top", px(geometry.offset_top).as_str()),
                ],
            );
        }
    }

    fn show_poster(&self, url: &str) {
        // The poster would sit on top of the backend's controls
        if self.interactive.get() {
            return;
        }
        let Ok(poster) = create_div(&self.document) else { return };
        set_styles(
            &poster,
            &[
                ("position", "absolute"),
                ("inset", "0"),
                ("z-index", "1"),
                ("background-position", "center"),
                ("background-size", "cover"),
                ("background-repeat", "no-repeat"),
            ],
        );
        let _ = poster.style().set_property("background-image", &format!("url(\"{}\")", url));
        if self.container.append_child(&poster).is_ok() {
            remove(self.poster.borrow_mut().replace(poster));
        }
    }

    fn reveal_player(&self, transition_in: bool) {
        if let Some(holder) = self.holder.borrow().as_ref() {
            if transition_in {
                let _ = holder.style().set_property("transition", FADE_IN);
            }
            let _ = holder.style().set_property("opacity", "1");
        }
        remove(self.poster.borrow_mut().take());
    }
}

/// `resize` events of the window, one listener per subscription key
pub struct WindowResize {
    window: Window,
    listeners: RefCell<HashMap<String, Closure<dyn FnMut()>>>,
}

impl WindowResize {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            listeners: RefCell::new(HashMap::new()),
        }
    }

    fn detach(&self, listener: &Closure<dyn FnMut()>) {
        let _ = self
            .window
            .remove_event_listener_with_callback("resize", listener.as_ref().unchecked_ref());
    }
}

impl ResizeSource for WindowResize {
    fn subscribe(&self, key: &str, mut on_resize: Box<dyn FnMut()>) {
        let listener = Closure::<dyn FnMut()>::new(move || on_resize());
        if let Err(e) = self
            .window
            .add_event_listener_with_callback("resize", listener.as_ref().unchecked_ref())
        {
            web_sys::console::warn_2(&"[Backdrop] Failed to listen for resize".into(), &e);
            return;
        }
        let previous = self.listeners.borrow_mut().insert(key.to_string(), listener);
        if let Some(previous) = previous {
            self.detach(&previous);
        }
    }

    fn unsubscribe(&self, key: &str) {
        let listener = self.listeners.borrow_mut().remove(key);
        if let Some(listener) = listener {
            self.detach(&listener);
        }
    }
}
