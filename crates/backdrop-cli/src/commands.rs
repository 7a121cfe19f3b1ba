//! CLI command implementations

use std::path::Path;

use anyhow::Context;
use backdrop_core::{compute_geometry, BackendKind, BackendOptions, Layout, PlayerOptions};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::output::{display_value, to_json, OutputFormat};

/// Read and parse a configuration file
pub fn load_options(path: &Path) -> anyhow::Result<PlayerOptions> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let options = PlayerOptions::from_json(&json)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    debug!(path = %path.display(), "Loaded configuration");
    Ok(options)
}

/// Summary of a validated configuration
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub backend: BackendKind,
    pub video: String,
    pub autoplay: bool,
    pub r#loop: bool,
    pub muted: bool,
    pub ratio: f64,
    pub fit_container: bool,
    pub force_aspect: bool,
    pub poster: Option<String>,
}

pub fn check_report(options: &PlayerOptions) -> anyhow::Result<CheckReport> {
    let backend = options.backend()?;
    let video = match &backend {
        BackendOptions::Html5(html5) => html5
            .sources
            .iter()
            .map(|(_, url)| url.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        BackendOptions::YouTube(youtube) => youtube.video_id.clone(),
        BackendOptions::Vimeo(vimeo) => vimeo.video_id.clone(),
    };

    Ok(CheckReport {
        backend: backend.kind(),
        video,
        autoplay: options.autoplay,
        r#loop: options.r#loop,
        muted: options.muted,
        ratio: options.ratio,
        fit_container: options.fit_container,
        force_aspect: options.force_aspect,
        poster: backend.poster().map(str::to_string),
    })
}

/// Validate a configuration
pub fn check(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let report = check_report(&load_options(path)?)?;

    match format {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Text => {
            println!("Configuration: {}", path.display());
            println!("  Backend: {}", report.backend);
            println!("  Video: {}", report.video);
            println!("  Autoplay: {}", report.autoplay);
            println!("  Loop: {}", report.r#loop);
            println!("  Muted: {}", report.muted);
            println!("  Ratio: {:.3}", report.ratio);
            println!("  Fit container: {}", report.fit_container);
            println!("  Force aspect: {}", report.force_aspect);
            if let Some(poster) = &report.poster {
                println!("  Poster: {}", poster);
            }
            println!("\nCheck: PASSED");
        }
    }
    Ok(())
}

/// What the backend receives once defaults and user overrides are merged
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedReport {
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<(String, String)>,
    /// `playerVars` for the embedded players, element properties for html5
    pub parameters: Map<String, Value>,
}

pub fn embed_report(options: &PlayerOptions) -> anyhow::Result<EmbedReport> {
    let report = match options.backend()? {
        BackendOptions::Html5(html5) => EmbedReport {
            backend: BackendKind::Html5,
            video_id: None,
            embed_url: None,
            parameters: html5.resolved_props(options),
            sources: html5.sources,
        },
        BackendOptions::YouTube(youtube) => EmbedReport {
            backend: BackendKind::YouTube,
            parameters: youtube.resolved_player_vars(options),
            video_id: Some(youtube.video_id),
            embed_url: None,
            sources: Vec::new(),
        },
        BackendOptions::Vimeo(vimeo) => EmbedReport {
            backend: BackendKind::Vimeo,
            embed_url: Some(vimeo.embed_url(options)?.to_string()),
            parameters: vimeo.resolved_player_vars(options),
            video_id: Some(vimeo.video_id),
            sources: Vec::new(),
        },
    };
    Ok(report)
}

/// Print the resolved player parameters
pub fn embed(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let report = embed_report(&load_options(path)?)?;

    match format {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Text => {
            println!("Backend: {}", report.backend);
            if let Some(video_id) = &report.video_id {
                println!("Video id: {}", video_id);
            }
            if let Some(url) = &report.embed_url {
                println!("Embed URL: {}", url);
            }
            if !report.sources.is_empty() {
                println!("\nSources:");
                for (i, (mime, url)) in report.sources.iter().enumerate() {
                    println!("  {}. {} ({})", i + 1, url, mime);
                }
            }

            let mut keys: Vec<&String> = report.parameters.keys().collect();
            keys.sort();
            println!("\nParameters:");
            for key in keys {
                println!("  {:16} {}", key, display_value(&report.parameters[key]));
            }
        }
    }
    Ok(())
}

/// Layout inputs and result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutReport {
    pub container_width: f64,
    pub container_height: f64,
    pub ratio: f64,
    #[serde(flatten)]
    pub layout: Layout,
}

pub fn layout_report(
    width: f64,
    height: f64,
    ratio: f64,
    force_aspect: bool,
    fit_container: bool,
) -> anyhow::Result<LayoutReport> {
    if !(ratio.is_finite() && ratio > 0.0) {
        anyhow::bail!("ratio must be a positive number, got {}", ratio);
    }
    if width < 0.0 || height < 0.0 {
        anyhow::bail!("container size must not be negative");
    }

    Ok(LayoutReport {
        container_width: width,
        container_height: height,
        ratio,
        layout: compute_geometry(width, height, ratio, force_aspect, fit_container),
    })
}

/// Compute where the player lands in a container
pub fn layout(
    width: f64,
    height: f64,
    ratio: f64,
    force_aspect: bool,
    fit_container: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let report = layout_report(width, height, ratio, force_aspect, fit_container)?;

    match format {
        OutputFormat::Json => println!("{}", to_json(&report)?),
        OutputFormat::Text => {
            println!("Container: {}x{} (ratio {:.3})", width, height, ratio);
            if let Some(container_height) = report.layout.container_height {
                println!("  Container height set to: {}", container_height);
            }
            let player = report.layout.player;
            println!("  Player size: {}x{}", player.width, player.height);
            println!("  Offset: left {}, top {}", player.offset_left, player.offset_top);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> PlayerOptions {
        PlayerOptions::from_json(json).unwrap()
    }

    #[test]
    fn test_check_report_youtube() {
        let report = check_report(&parse(
            r#"{ "loop": false, "youTube": { "videoId": "M7lc1UVf-VE", "poster": "p.jpg" } }"#,
        ))
        .unwrap();
        assert_eq!(report.backend, BackendKind::YouTube);
        assert_eq!(report.video, "M7lc1UVf-VE");
        assert!(!report.r#loop);
        assert_eq!(report.poster.as_deref(), Some("p.jpg"));
    }

    #[test]
    fn test_check_report_rejects_two_backends() {
        let options = parse(r#"{ "youTube": { "videoId": "a" }, "vimeo": { "videoId": "b" } }"#);
        assert!(check_report(&options).is_err());
    }

    #[test]
    fn test_embed_report_vimeo_url() {
        let report = embed_report(&parse(r#"{ "vimeo": { "videoId": "76979871" } }"#)).unwrap();
        let url = report.embed_url.unwrap();
        assert!(url.starts_with("https://player.vimeo.com/video/76979871?"));
        assert!(url.contains("autoplay=1"));
        assert!(url.contains("loop=0"));
        assert!(report.sources.is_empty());
    }

    #[test]
    fn test_embed_report_html5_sources() {
        let report = embed_report(&parse(
            r#"{ "html5": { "sources": [["video/mp4", "clip.mp4"]], "props": { "preload": "auto" } } }"#,
        ))
        .unwrap();
        assert_eq!(report.sources, vec![("video/mp4".to_string(), "clip.mp4".to_string())]);
        assert_eq!(report.parameters["preload"], "auto");
        assert!(report.video_id.is_none());
    }

    #[test]
    fn test_layout_report_cover() {
        let report = layout_report(1000.0, 300.0, 16.0 / 9.0, false, true).unwrap();
        assert_eq!(report.layout.player.width, 1000.0);
        assert_eq!(report.layout.player.height, 563.0);
        assert_eq!(report.layout.player.offset_top, -131.5);
        assert!(report.layout.container_height.is_none());
    }

    #[test]
    fn test_layout_report_rejects_bad_ratio() {
        assert!(layout_report(100.0, 100.0, 0.0, false, true).is_err());
        assert!(layout_report(-1.0, 100.0, 1.0, false, true).is_err());
    }
}
