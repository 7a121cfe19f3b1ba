//! Backdrop Core - background video widget engine
//!
//! This crate provides the host-agnostic part of the widget:
//! - One playback contract over native `<video>`, YouTube and Vimeo
//! - Load-once, notify-many loading of third-party player SDKs
//! - Cover-fit and forced-aspect layout of the video inside its container
//! - Per-instance lifecycle and lifecycle notifications
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Backdrop Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   host page ──▶ ┌──────────────────┐ ◀── resize signal          │
//! │                 │ PlayerController │ ──▶ layout::compute_geometry│
//! │                 └────────┬─────────┘                            │
//! │                          │ BoundAdapter                         │
//! │         ┌────────────────┼────────────────┐                     │
//! │  ┌──────┴──────┐  ┌──────┴──────┐  ┌──────┴──────┐              │
//! │  │   Native    │  │   YouTube   │  │    Vimeo    │              │
//! │  │   <video>   │  │   Adapter   │  │   Adapter   │              │
//! │  └─────────────┘  └──────┬──────┘  └──────┬──────┘              │
//! │                          └───────┬────────┘                     │
//! │                           ┌──────┴──────┐                       │
//! │                           │ SdkRegistry │                       │
//! │                           └─────────────┘                       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on the page's single event loop. Host integration
//! (DOM, timers, SDK objects) goes through the traits in [`host`],
//! [`timer`], [`sdk`] and [`adapter`].

pub mod adapter;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod host;
pub mod layout;
pub mod sdk;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod timer;
pub mod types;

pub use adapter::{Adapter, AdapterContext, BoundAdapter};
pub use config::{BackendOptions, Html5Options, OverlayOptions, PlayerOptions, VimeoOptions, YouTubeOptions};
pub use controller::PlayerController;
pub use error::{Error, Result};
pub use events::{EventBus, Lifecycle, ListenerId, PlayerEvent};
pub use host::{Platform, ResizeSource, Stage};
pub use layout::{compute_geometry, Geometry, Layout};
pub use sdk::{SdkBackend, SdkConfig, SdkHost, SdkPhase, SdkRegistry, WaiterId};
pub use timer::{Scheduler, TimerHandle, TimerId};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
