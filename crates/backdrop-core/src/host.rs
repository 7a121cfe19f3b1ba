//! Host page seams
//!
//! The core never touches the DOM directly. A browser binding implements
//! these traits; tests use the in-memory versions in `testing`.

use std::rc::Rc;

use crate::adapter::{NativeMediaFactory, VimeoApi, YouTubeApi};
use crate::layout::Geometry;
use crate::sdk::SdkRegistry;
use crate::timer::Scheduler;
use crate::Result;

/// The container element a widget instance lives in
pub trait Stage {
    /// Create the holder element the backend player mounts into.
    ///
    /// An `interactive` holder shows the backend's own controls, so it is
    /// visible and takes pointer input from the start instead of waiting
    /// for the first frame.
    fn mount(&self, holder_id: &str, interactive: bool) -> Result<()>;

    /// Remove everything `mount` and the backends added
    fn unmount(&self);

    /// Current container width and height in CSS pixels
    fn container_size(&self) -> (f64, f64);

    /// Force the container height (force-aspect mode)
    fn set_container_height(&self, height: f64);

    /// Size and position the holder element
    fn place_player(&self, geometry: &Geometry);

    /// Cover the holder with a still image until playback starts
    fn show_poster(&self, url: &str);

    /// Make the player visible, fading in if `transition_in`
    fn reveal_player(&self, transition_in: bool);
}

/// Window-level resize notifications
pub trait ResizeSource {
    /// Register `on_resize` under `key`, replacing any previous one
    fn subscribe(&self, key: &str, on_resize: Box<dyn FnMut()>);

    /// Drop the subscription registered under `key`
    fn unsubscribe(&self, key: &str);
}

/// Page-wide services shared by every widget instance
#[derive(Clone)]
pub struct Platform {
    pub scheduler: Rc<dyn Scheduler>,
    pub sdk: Rc<SdkRegistry>,
    pub resize: Rc<dyn ResizeSource>,
    pub native: Rc<dyn NativeMediaFactory>,
    pub youtube: Rc<dyn YouTubeApi>,
    pub vimeo: Rc<dyn VimeoApi>,
}
