//! Narrated slideshow rendering
//!
//! Turns a handful of still images, a narration track and an ASS subtitle
//! document into a single MP4:
//!
//! - **Timeline planning** - per-image display/clip durations and cumulative
//!   crossfade offsets that fill the narration exactly
//! - **Duration probing** - ffprobe reads the authoritative audio length
//! - **Three-stage ffmpeg pipeline** - xfade slideshow, audio mux, subtitle burn-in
//! - **Workspace lifecycle** - one scratch directory per request, always removed
//!
//! # Example
//!
//! ```rust,no_run
//! use slidecast::fetch::AssetFetcher;
//! use slidecast::slideshow::{AssetSet, Orchestrator, RenderSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = AssetFetcher::new()?;
//!     let orchestrator = Orchestrator::new("/tmp/slidecast", RenderSettings::default(), fetcher);
//!     let assets = AssetSet::new(
//!         vec!["https://example.com/a.jpg".into(), "https://example.com/b.jpg".into()],
//!         "https://example.com/voice.mp3".into(),
//!         std::fs::read("subtitles.ass")?,
//!     );
//!     let video = orchestrator.render(assets).await?;
//!     println!("Rendered {}", video.path().display());
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod orchestrator;
pub mod pipeline;
pub mod probe;
pub mod timeline;
pub mod workspace;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub use command::{CommandOutput, ToolCommand};
pub use orchestrator::{AssetSet, Orchestrator, RenderedVideo, RequestState, DEFAULT_OUTPUT_FILENAME};
pub use pipeline::{Artifact, RenderSettings, SlideshowPipeline, Stage};
pub use probe::MediaProber;
pub use timeline::{ensure_enough_images, plan, TransitionSchedule};
pub use workspace::Workspace;

/// Kind of remote asset being downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Narration track
    Audio,
    /// Slide image, zero-based position in the request
    Image(usize),
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Image(index) => write!(f, "image {}", index + 1),
        }
    }
}

/// Slideshow rendering errors
#[derive(Error, Debug)]
pub enum SlideshowError {
    #[error("Failed to download {kind} from {url}, status: {status}")]
    Download {
        url: String,
        status: u16,
        kind: AssetKind,
    },

    #[error("Failed to download {kind} from {url}: {source}")]
    Transport {
        url: String,
        kind: AssetKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("At least two images are required for transitions, got {count}")]
    InsufficientInput { count: usize },

    #[error(
        "Cannot fit {image_count} images with {transition_duration}s transitions \
         into {total_duration}s of audio"
    )]
    InvalidTiming {
        image_count: usize,
        total_duration: f64,
        transition_duration: f64,
    },

    #[error("{stage} stage failed (exit code {}): {diagnostic}", describe_exit(.exit_code))]
    StageExecution {
        stage: Stage,
        exit_code: Option<i32>,
        diagnostic: String,
    },

    #[error("{stage} stage timed out after {}s", .timeout.as_secs())]
    StageTimeout { stage: Stage, timeout: Duration },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Form is missing a field or is not multipart at all
    #[error("Malformed form: {0}")]
    MalformedForm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SlideshowError {
    /// Stable machine-readable error kind
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Download { .. } | Self::Transport { .. } => "download_failed",
            Self::Probe(_) => "probe_failed",
            Self::InsufficientInput { .. } => "insufficient_input",
            Self::InvalidTiming { .. } => "invalid_timing",
            Self::StageExecution { .. } => "stage_failed",
            Self::StageTimeout { .. } => "stage_timeout",
            Self::InvalidRequest(_) | Self::MalformedForm(_) | Self::Json(_) => "invalid_request",
            Self::Io(_) => "io_error",
        }
    }

    /// Whether the form itself could not be read
    ///
    /// Bad values inside a readable form (JSON, URLs) are pipeline failures.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedForm(_))
    }
}

pub type Result<T> = std::result::Result<T, SlideshowError>;

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_kind_display_is_one_based() {
        assert_eq!(AssetKind::Image(0).to_string(), "image 1");
        assert_eq!(AssetKind::Audio.to_string(), "audio");
    }

    #[test]
    fn download_error_carries_url_status_and_kind() {
        let err = SlideshowError::Download {
            url: "https://example.com/a.jpg".to_string(),
            status: 404,
            kind: AssetKind::Image(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("image 3"));
        assert!(msg.contains("https://example.com/a.jpg"));
        assert!(msg.contains("404"));
        assert_eq!(err.code(), "download_failed");
    }

    #[test]
    fn stage_error_message_names_stage_and_exit_code() {
        let err = SlideshowError::StageExecution {
            stage: Stage::AudioMux,
            exit_code: Some(1),
            diagnostic: "Invalid data found when processing input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "audio mux stage failed (exit code 1): Invalid data found when processing input"
        );

        let killed = SlideshowError::StageExecution {
            stage: Stage::Slideshow,
            exit_code: None,
            diagnostic: String::new(),
        };
        assert!(killed.to_string().contains("exit code none"));
    }

    #[test]
    fn only_malformed_forms_are_client_errors() {
        assert!(SlideshowError::MalformedForm("x".into()).is_client_error());
        assert!(!SlideshowError::InvalidRequest("x".into()).is_client_error());
        assert_eq!(SlideshowError::InvalidRequest("x".into()).code(), "invalid_request");
        assert!(!SlideshowError::InsufficientInput { count: 1 }.is_client_error());
        assert!(!SlideshowError::Probe("x".into()).is_client_error());
    }
}
