//! Player configuration
//!
//! Options arrive from the host page as JSON. Exactly one backend block
//! (`html5`, `youTube` or `vimeo`) must be present; it selects the adapter
//! for the lifetime of the instance.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;

use crate::types::BackendKind;
use crate::{Error, Result};

/// Base URL of Vimeo's embeddable player
pub const VIMEO_PLAYER_BASE: &str = "https://player.vimeo.com/video/";

/// Widget options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerOptions {
    /// Start playback as soon as the video is loaded
    pub autoplay: bool,
    /// Restart from the beginning when the video ends
    pub r#loop: bool,
    /// Start muted
    pub muted: bool,
    /// Show the backend's own controls
    pub controls: bool,
    /// Video aspect ratio (width / height)
    pub ratio: f64,
    /// Cover the container, cropping the overflowing axis
    pub fit_container: bool,
    /// Derive the container height from its width and `ratio`
    pub force_aspect: bool,
    pub overlay: Option<OverlayOptions>,
    pub html5: Option<Html5Options>,
    #[serde(rename = "youTube")]
    pub youtube: Option<YouTubeOptions>,
    pub vimeo: Option<VimeoOptions>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            r#loop: true,
            muted: true,
            controls: false,
            ratio: 16.0 / 9.0,
            fit_container: true,
            force_aspect: false,
            overlay: None,
            html5: None,
            youtube: None,
            vimeo: None,
        }
    }
}

/// Decoration layered over the video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayOptions {
    pub class: Option<String>,
    pub opacity: Option<f64>,
    pub color: Option<String>,
    pub image: Option<String>,
    pub background_size: Option<String>,
    pub background_repeat: Option<String>,
}

/// Native `<video>` backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Html5Options {
    /// `[mime type, url]` pairs, in preference order
    pub sources: Vec<(String, String)>,
    /// Extra element properties
    pub props: Map<String, Value>,
    pub poster: Option<String>,
}

/// YouTube embedded player backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct YouTubeOptions {
    pub video_id: String,
    pub player_vars: Map<String, Value>,
    pub poster: Option<String>,
    pub transition_in: bool,
}

/// Vimeo embedded player backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VimeoOptions {
    pub video_id: String,
    pub player_vars: Map<String, Value>,
    pub poster: Option<String>,
    pub transition_in: bool,
}

/// The single backend block of a validated configuration
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOptions {
    Html5(Html5Options),
    YouTube(YouTubeOptions),
    Vimeo(VimeoOptions),
}

impl BackendOptions {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendOptions::Html5(_) => BackendKind::Html5,
            BackendOptions::YouTube(_) => BackendKind::YouTube,
            BackendOptions::Vimeo(_) => BackendKind::Vimeo,
        }
    }

    pub fn poster(&self) -> Option<&str> {
        match self {
            BackendOptions::Html5(o) => o.poster.as_deref(),
            BackendOptions::YouTube(o) => o.poster.as_deref(),
            BackendOptions::Vimeo(o) => o.poster.as_deref(),
        }
    }

    pub fn transition_in(&self) -> bool {
        match self {
            BackendOptions::Html5(_) => false,
            BackendOptions::YouTube(o) => o.transition_in,
            BackendOptions::Vimeo(o) => o.transition_in,
        }
    }
}

impl PlayerOptions {
    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))
    }

    /// Validate the options and return the selected backend block
    pub fn backend(&self) -> Result<BackendOptions> {
        if !(self.ratio.is_finite() && self.ratio > 0.0) {
            return Err(Error::config(format!(
                "ratio must be a positive number, got {}",
                self.ratio
            )));
        }

        let present: Vec<BackendKind> = [
            self.html5.as_ref().map(|_| BackendKind::Html5),
            self.youtube.as_ref().map(|_| BackendKind::YouTube),
            self.vimeo.as_ref().map(|_| BackendKind::Vimeo),
        ]
        .into_iter()
        .flatten()
        .collect();

        match present.as_slice() {
            [] => Err(Error::config(
                "exactly one of html5, youTube or vimeo must be set, none given",
            )),
            [_] => self.single_backend(),
            many => {
                let names: Vec<String> = many.iter().map(|k| k.to_string()).collect();
                Err(Error::config(format!(
                    "exactly one of html5, youTube or vimeo must be set, got {}",
                    names.join(", ")
                )))
            }
        }
    }

    fn single_backend(&self) -> Result<BackendOptions> {
        if let Some(html5) = &self.html5 {
            if html5.sources.is_empty() {
                return Err(Error::config("html5.sources must list at least one source"));
            }
            if let Some((mime, _)) = html5.sources.iter().find(|(_, url)| url.trim().is_empty()) {
                return Err(Error::config(format!("html5 source of type {} has no url", mime)));
            }
            return Ok(BackendOptions::Html5(html5.clone()));
        }
        if let Some(youtube) = &self.youtube {
            if youtube.video_id.trim().is_empty() {
                return Err(Error::config("youTube.videoId must not be empty"));
            }
            return Ok(BackendOptions::YouTube(youtube.clone()));
        }
        if let Some(vimeo) = &self.vimeo {
            if vimeo.video_id.trim().is_empty() {
                return Err(Error::config("vimeo.videoId must not be empty"));
            }
            return Ok(BackendOptions::Vimeo(vimeo.clone()));
        }
        Err(Error::config("no backend block present"))
    }
}

fn flag(on: bool) -> Value {
    json!(if on { 1 } else { 0 })
}

fn overlay(mut base: Map<String, Value>, user: &Map<String, Value>) -> Map<String, Value> {
    for (key, value) in user {
        base.insert(key.clone(), value.clone());
    }
    base
}

impl Html5Options {
    /// Element properties: widget defaults overridden by `props`
    pub fn resolved_props(&self, options: &PlayerOptions) -> Map<String, Value> {
        let mut base = Map::new();
        base.insert("autoplay".into(), json!(options.autoplay));
        base.insert("muted".into(), json!(options.muted));
        base.insert("controls".into(), json!(options.controls));
        base.insert("playsinline".into(), json!(true));
        // Looping is driven by the adapter so that `ended` still fires
        base.insert("loop".into(), json!(false));
        overlay(base, &self.props)
    }
}

impl YouTubeOptions {
    /// `playerVars` handed to `YT.Player`: widget defaults overridden by the user's
    pub fn resolved_player_vars(&self, options: &PlayerOptions) -> Map<String, Value> {
        let mut base = Map::new();
        base.insert("iv_load_policy".into(), json!(3));
        base.insert("modestbranding".into(), json!(1));
        base.insert("autoplay".into(), flag(options.autoplay));
        base.insert("controls".into(), flag(options.controls));
        base.insert("showinfo".into(), json!(0));
        base.insert("wmode".into(), json!("opaque"));
        base.insert("branding".into(), json!(0));
        base.insert("autohide".into(), json!(0));
        base.insert("rel".into(), json!(0));
        base.insert("playsinline".into(), json!(1));
        // The native loop flag is unreliable with controls hidden
        base.insert("loop".into(), json!(0));
        base.insert("mute".into(), flag(options.muted));
        overlay(base, &self.player_vars)
    }
}

impl VimeoOptions {
    /// Embed parameters: widget defaults overridden by the user's
    pub fn resolved_player_vars(&self, options: &PlayerOptions) -> Map<String, Value> {
        let mut base = Map::new();
        base.insert("autoplay".into(), json!(options.autoplay));
        base.insert("muted".into(), json!(options.muted));
        base.insert("controls".into(), json!(options.controls));
        base.insert("loop".into(), json!(false));
        base.insert("autopause".into(), json!(false));
        base.insert("background".into(), json!(false));
        base.insert("byline".into(), json!(false));
        base.insert("portrait".into(), json!(false));
        base.insert("title".into(), json!(false));
        base.insert("playsinline".into(), json!(true));
        base.insert("dnt".into(), json!(true));
        overlay(base, &self.player_vars)
    }

    /// Iframe `src` for this video
    pub fn embed_url(&self, options: &PlayerOptions) -> Result<Url> {
        let mut url = Url::parse(VIMEO_PLAYER_BASE).map_err(|e| Error::config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| Error::config("vimeo base url cannot take a path"))?
            .pop_if_empty()
            .push(self.video_id.trim());

        let vars = self.resolved_player_vars(options);
        let mut pairs: Vec<(&String, &Value)> = vars.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                if let Some(rendered) = query_value(value) {
                    query.append_pair(key, &rendered);
                }
            }
        }
        Ok(url)
    }
}

/// Render a player variable for a query string; booleans become `1`/`0`
pub fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PlayerOptions::default();
        assert!(options.autoplay);
        assert!(options.r#loop);
        assert!(options.muted);
        assert!(!options.controls);
        assert!(options.fit_container);
        assert!(!options.force_aspect);
        assert!((options.ratio - 16.0 / 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_camel_case_json() {
        let options = PlayerOptions::from_json(
            r#"{
                "loop": false,
                "forceAspect": true,
                "youTube": { "videoId": "M7lc1UVf-VE", "playerVars": { "start": 10 }, "transitionIn": true }
            }"#,
        )
        .unwrap();
        assert!(!options.r#loop);
        assert!(options.force_aspect);
        assert!(options.autoplay);
        let BackendOptions::YouTube(yt) = options.backend().unwrap() else {
            panic!("expected youtube backend");
        };
        assert_eq!(yt.video_id, "M7lc1UVf-VE");
        assert!(yt.transition_in);
        assert_eq!(yt.player_vars["start"], json!(10));
    }

    #[test]
    fn test_html5_sources_as_pairs() {
        let options = PlayerOptions::from_json(
            r#"{ "html5": { "sources": [["video/mp4", "clip.mp4"], ["video/webm", "clip.webm"]], "poster": "p.jpg" } }"#,
        )
        .unwrap();
        let backend = options.backend().unwrap();
        assert_eq!(backend.kind(), BackendKind::Html5);
        assert_eq!(backend.poster(), Some("p.jpg"));
        let BackendOptions::Html5(html5) = backend else { unreachable!() };
        assert_eq!(html5.sources[1], ("video/webm".to_string(), "clip.webm".to_string()));
    }

    #[test]
    fn test_no_backend_is_rejected() {
        let err = PlayerOptions::default().backend().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("none given"));
    }

    #[test]
    fn test_multiple_backends_are_rejected() {
        let options = PlayerOptions {
            youtube: Some(YouTubeOptions { video_id: "a".into(), ..Default::default() }),
            vimeo: Some(VimeoOptions { video_id: "1".into(), ..Default::default() }),
            ..Default::default()
        };
        let err = options.backend().unwrap_err();
        assert!(err.to_string().contains("youTube, vimeo"), "{}", err);
    }

    #[test]
    fn test_invalid_blocks_are_rejected() {
        let empty_sources = PlayerOptions {
            html5: Some(Html5Options::default()),
            ..Default::default()
        };
        assert!(empty_sources.backend().is_err());

        let blank_id = PlayerOptions {
            vimeo: Some(VimeoOptions { video_id: "  ".into(), ..Default::default() }),
            ..Default::default()
        };
        assert!(blank_id.backend().is_err());

        let bad_ratio = PlayerOptions {
            ratio: -1.0,
            youtube: Some(YouTubeOptions { video_id: "a".into(), ..Default::default() }),
            ..Default::default()
        };
        assert!(bad_ratio.backend().is_err());
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        let err = PlayerOptions::from_json("{ \"ratio\": \"wide\" }").unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION");
    }

    #[test]
    fn test_youtube_player_vars_follow_options() {
        let options = PlayerOptions {
            autoplay: false,
            controls: true,
            ..Default::default()
        };
        let yt = YouTubeOptions {
            video_id: "x".into(),
            player_vars: serde_json::from_str(r#"{ "rel": 1 }"#).unwrap(),
            ..Default::default()
        };
        let vars = yt.resolved_player_vars(&options);
        assert_eq!(vars["autoplay"], json!(0));
        assert_eq!(vars["controls"], json!(1));
        assert_eq!(vars["mute"], json!(1));
        assert_eq!(vars["loop"], json!(0));
        assert_eq!(vars["iv_load_policy"], json!(3));
        assert_eq!(vars["rel"], json!(1));
    }

    #[test]
    fn test_vimeo_embed_url_renders_flags_as_digits() {
        let options = PlayerOptions::default();
        let vimeo = VimeoOptions {
            video_id: "76979871".into(),
            player_vars: serde_json::from_str(r#"{ "title": true, "color": "ff0179", "quality": null }"#).unwrap(),
            ..Default::default()
        };
        let url = vimeo.embed_url(&options).unwrap();
        assert_eq!(
            url.as_str(),
            "https://player.vimeo.com/video/76979871?autopause=0&autoplay=1&background=0&byline=0\
             &color=ff0179&controls=0&dnt=1&loop=0&muted=1&playsinline=1&portrait=0&title=1"
        );
        assert!(!url.as_str().contains("true"));
        assert!(!url.as_str().contains("false"));
    }

    #[test]
    fn test_html5_props_disable_native_loop() {
        let html5 = Html5Options {
            sources: vec![("video/mp4".into(), "a.mp4".into())],
            props: serde_json::from_str(r#"{ "preload": "auto" }"#).unwrap(),
            poster: None,
        };
        let props = html5.resolved_props(&PlayerOptions::default());
        assert_eq!(props["loop"], json!(false));
        assert_eq!(props["muted"], json!(true));
        assert_eq!(props["preload"], json!("auto"));
    }
}
