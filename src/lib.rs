//! `slidecast` - narrated slideshow videos over HTTP
//!
//! # Features
//!
//! - **Crossfade planning**: display windows and xfade offsets that fit the narration
//! - **Asset downloads**: streamed to disk with browser-like headers
//! - **ffmpeg pipeline**: slideshow, audio mux and ASS subtitle burn-in
//! - **Per-request workspaces**: isolated scratch directories, always removed
//!
//! # Example
//!
//! ```rust,no_run
//! use slidecast::slideshow::plan;
//!
//! fn main() -> anyhow::Result<()> {
//!     let schedule = plan(3, 10.0, 1.0)?;
//!     println!("offsets: {:?}", schedule.offsets);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod fetch;
pub mod fingerprint;
pub mod server;
pub mod slideshow;

pub use config::ServiceConfig;
pub use fetch::{AssetFetcher, AssetSource, DownloadConfig};
pub use fingerprint::{random_profile, BrowserProfile};
pub use slideshow::{
    plan, AssetKind, AssetSet, Orchestrator, RenderSettings, RenderedVideo, SlideshowError,
    SlideshowPipeline, TransitionSchedule,
};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
