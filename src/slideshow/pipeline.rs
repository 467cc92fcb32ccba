//! Three-stage ffmpeg pipeline: xfade slideshow -> audio mux -> subtitle burn-in
//!
//! Stages form a strict chain. Each one reads the previous stage's artifact
//! from the workspace and must leave its own artifact behind before the next
//! stage is allowed to start.

use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::command::{ToolCommand, ToolError};
use super::timeline::TransitionSchedule;
use super::workspace::Workspace;
use super::{Result, SlideshowError};

/// Lines of tool stderr kept in a surfaced error
const DIAGNOSTIC_LINES: usize = 20;

/// Fixed workspace-relative name of the uploaded subtitle document
pub const SUBTITLE_FILE: &str = "subtitle.ass";

/// External-tool stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Chained xfade over looping stills, no audio
    Slideshow,
    /// Narration muxed into the silent slideshow
    AudioMux,
    /// ASS subtitles rendered into the video
    SubtitleBurn,
}

impl Stage {
    /// Artifact this stage produces
    #[must_use]
    pub fn output(&self) -> Artifact {
        match self {
            Self::Slideshow => Artifact::SilentSlideshow,
            Self::AudioMux => Artifact::MuxedVideo,
            Self::SubtitleBurn => Artifact::FinalVideo,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Slideshow => "slideshow",
            Self::AudioMux => "audio mux",
            Self::SubtitleBurn => "subtitle burn-in",
        })
    }
}

/// Intermediate or final file produced by a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    SilentSlideshow,
    MuxedVideo,
    FinalVideo,
}

impl Artifact {
    /// File name inside the workspace
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::SilentSlideshow => "silent_slideshow.mp4",
            Self::MuxedVideo => "slideshow_with_audio.mp4",
            Self::FinalVideo => "final.mp4",
        }
    }
}

/// Encoder and tool settings shared by every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// xfade transition name
    pub transition: String,
    /// Crossfade length in seconds
    pub transition_duration: f64,
    /// Output frame rate
    pub fps: u32,
    /// Canonical output pixel format
    pub pixel_format: String,
    /// Video encoder for re-encoding stages
    pub video_codec: String,
    /// Encoder preset for the subtitle burn-in
    pub preset: String,
    /// Audio encoder for the mux stage
    pub audio_codec: String,
    /// Ceiling for a single tool invocation
    pub stage_timeout_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").unwrap_or_else(|_| PathBuf::from("ffmpeg")),
            ffprobe_path: which::which("ffprobe").unwrap_or_else(|_| PathBuf::from("ffprobe")),
            transition: "fade".to_string(),
            transition_duration: 1.0,
            fps: 25,
            pixel_format: "yuv420p".to_string(),
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            audio_codec: "aac".to_string(),
            stage_timeout_secs: 600,
        }
    }
}

impl RenderSettings {
    /// Per-invocation timeout
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    /// Reject settings no pipeline run could succeed with
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.transition_duration.is_finite() || self.transition_duration <= 0.0 {
            return Err(format!(
                "transition_duration must be positive, got {}",
                self.transition_duration
            ));
        }
        if self.fps == 0 {
            return Err("fps must be at least 1".to_string());
        }
        if self.stage_timeout_secs == 0 {
            return Err("stage_timeout_secs must be at least 1".to_string());
        }
        if self.transition.is_empty() || self.pixel_format.is_empty() {
            return Err("transition and pixel_format must not be empty".to_string());
        }
        Ok(())
    }
}

/// Escape a value for use as a filter option (`\`, `'` and `:` are special)
fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Keep the tail of tool stderr and hide the scratch location
fn diagnostic(stderr: &str, workspace: &Path) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines[lines.len().saturating_sub(DIAGNOSTIC_LINES)..].join("\n");
    tail.replace(&workspace.display().to_string(), "<workspace>")
}

/// Runs the slideshow stages with ffmpeg
#[derive(Debug, Clone)]
pub struct SlideshowPipeline {
    settings: RenderSettings,
}

impl SlideshowPipeline {
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Check ffmpeg and ffprobe can be started
    pub async fn check_tools(&self) -> Vec<(String, bool)> {
        let ffmpeg = ToolCommand::probe_available(&self.settings.ffmpeg_path, &["-version"]).await;
        let ffprobe = ToolCommand::probe_available(&self.settings.ffprobe_path, &["-version"]).await;
        vec![("ffmpeg".to_string(), ffmpeg), ("ffprobe".to_string(), ffprobe)]
    }

    /// Chained pairwise xfade graph ending in `[final_v]`
    ///
    /// `[0:v][1:v]xfade=...[v1];[v1][2:v]xfade=...[v2];...[vK]format=...,fps=...[final_v]`
    #[must_use]
    pub fn filter_graph(&self, schedule: &TransitionSchedule) -> String {
        let mut graph = String::new();
        let mut last_stream = "0:v".to_string();

        for (i, offset) in schedule.offsets.iter().enumerate() {
            let next_input = i + 1;
            let output = format!("v{next_input}");
            // Writing to a String cannot fail
            let _ = write!(
                graph,
                "[{last_stream}][{next_input}:v]xfade=transition={}:duration={}:offset={offset}[{output}];",
                self.settings.transition, schedule.transition_duration,
            );
            last_stream = output;
        }

        let _ = write!(
            graph,
            "[{last_stream}]format={},fps={}[final_v]",
            self.settings.pixel_format, self.settings.fps
        );
        graph
    }

    fn base_command(&self, workspace: &Workspace) -> ToolCommand {
        ToolCommand::new(&self.settings.ffmpeg_path)
            .current_dir(workspace.path())
            .timeout(self.settings.stage_timeout())
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
    }

    /// Stage 1: stills -> silent crossfade slideshow
    pub(crate) fn slideshow_command(
        &self,
        workspace: &Workspace,
        images: &[PathBuf],
        schedule: &TransitionSchedule,
    ) -> ToolCommand {
        let clip = schedule.clip_duration.to_string();
        let mut cmd = self.base_command(workspace);

        for image in images {
            cmd = cmd
                .args(["-loop", "1", "-t"])
                .arg(&clip)
                .arg("-i")
                .arg(image);
        }

        cmd.arg("-filter_complex")
            .arg(self.filter_graph(schedule))
            .args(["-map", "[final_v]", "-an", "-c:v"])
            .arg(&self.settings.video_codec)
            .arg("-y")
            .arg(workspace.artifact(Artifact::SilentSlideshow))
    }

    /// Stage 2: slideshow + narration, video copied, audio encoded, cut to the shorter input
    pub(crate) fn mux_command(&self, workspace: &Workspace, video: &Path, audio: &Path) -> ToolCommand {
        self.base_command(workspace)
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c:v", "copy", "-c:a"])
            .arg(&self.settings.audio_codec)
            .args(["-shortest", "-y"])
            .arg(workspace.artifact(Artifact::MuxedVideo))
    }

    /// Stage 3: subtitles rendered in, audio copied, duration capped
    pub(crate) fn subtitle_command(
        &self,
        workspace: &Workspace,
        video: &Path,
        max_duration: f64,
    ) -> ToolCommand {
        self.base_command(workspace)
            .arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(format!("ass={}", escape_filter_value(SUBTITLE_FILE)))
            .arg("-c:v")
            .arg(&self.settings.video_codec)
            .arg("-preset")
            .arg(&self.settings.preset)
            .args(["-c:a", "copy", "-t"])
            .arg(max_duration.to_string())
            .arg("-y")
            .arg(workspace.artifact(Artifact::FinalVideo))
    }

    async fn run_stage(&self, stage: Stage, cmd: ToolCommand, workspace: &Workspace) -> Result<PathBuf> {
        info!("Running {stage} stage");

        let output = cmd.output().await.map_err(|e| {
            error!("{stage} stage could not complete: {e}; args: {:?}", cmd.argv());
            match e {
                ToolError::TimedOut { timeout, .. } => SlideshowError::StageTimeout { stage, timeout },
                ToolError::Io { .. } => SlideshowError::StageExecution {
                    stage,
                    exit_code: None,
                    diagnostic: e.to_string(),
                },
            }
        })?;

        if !output.success {
            error!(
                "{stage} stage failed (exit {:?})\n  command: {} {}\n  stderr: {}",
                output.exit_code,
                cmd.program().display(),
                cmd.argv().join(" "),
                output.stderr.trim()
            );
            return Err(SlideshowError::StageExecution {
                stage,
                exit_code: output.exit_code,
                diagnostic: diagnostic(&output.stderr, workspace.path()),
            });
        }

        let artifact = workspace.artifact(stage.output());
        if tokio::fs::metadata(&artifact).await.is_err() {
            error!("{stage} stage exited cleanly but wrote no {}", stage.output().file_name());
            return Err(SlideshowError::StageExecution {
                stage,
                exit_code: output.exit_code,
                diagnostic: format!("no {} was produced", stage.output().file_name()),
            });
        }

        info!("SUCCESS: {stage} stage wrote {}", stage.output().file_name());
        Ok(artifact)
    }

    /// Build the silent crossfade slideshow
    pub async fn build_slideshow(
        &self,
        workspace: &Workspace,
        images: &[PathBuf],
        schedule: &TransitionSchedule,
    ) -> Result<PathBuf> {
        let cmd = self.slideshow_command(workspace, images, schedule);
        self.run_stage(Stage::Slideshow, cmd, workspace).await
    }

    /// Mux narration into the slideshow
    pub async fn mux_audio(&self, workspace: &Workspace, video: &Path, audio: &Path) -> Result<PathBuf> {
        let cmd = self.mux_command(workspace, video, audio);
        self.run_stage(Stage::AudioMux, cmd, workspace).await
    }

    /// Burn the workspace subtitle document into the muxed video
    pub async fn burn_subtitles(
        &self,
        workspace: &Workspace,
        video: &Path,
        max_duration: f64,
    ) -> Result<PathBuf> {
        let cmd = self.subtitle_command(workspace, video, max_duration);
        self.run_stage(Stage::SubtitleBurn, cmd, workspace).await
    }
}
