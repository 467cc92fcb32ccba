//! Request orchestration: assets -> duration -> schedule -> three stages -> response
//!
//! One call to [`Orchestrator::render`] is one request. Its workspace is
//! deleted before the error is returned on every failure path; on success the
//! workspace travels inside [`RenderedVideo`] and is released once the video
//! has been delivered (or the delivery is abandoned).

use std::io;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use futures::future::try_join_all;
use futures::Stream;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, instrument, warn, Span};

use super::pipeline::{RenderSettings, SlideshowPipeline, SUBTITLE_FILE};
use super::probe::MediaProber;
use super::timeline::{ensure_enough_images, plan, TransitionSchedule};
use super::workspace::Workspace;
use super::{AssetKind, Result};
use crate::fetch::AssetSource;

/// Download name used when the caller gives none
pub const DEFAULT_OUTPUT_FILENAME: &str = "final_video.mp4";

/// Workspace-relative name of the downloaded narration
const AUDIO_FILE: &str = "narration.mp3";

/// Response body chunk size
const CHUNK_SIZE: usize = 64 * 1024;

/// Everything a request supplies
#[derive(Debug, Clone)]
pub struct AssetSet {
    image_urls: Vec<String>,
    audio_url: String,
    subtitle: Vec<u8>,
    output_filename: String,
}

impl AssetSet {
    #[must_use]
    pub fn new(image_urls: Vec<String>, audio_url: String, subtitle: Vec<u8>) -> Self {
        Self {
            image_urls,
            audio_url,
            subtitle,
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
        }
    }

    /// Name offered to the client; only the final path component is kept
    #[must_use]
    pub fn with_output_filename(mut self, name: &str) -> Self {
        self.output_filename = sanitize_filename(name);
        self
    }

    #[must_use]
    pub fn image_urls(&self) -> &[String] {
        &self.image_urls
    }

    #[must_use]
    pub fn audio_url(&self) -> &str {
        &self.audio_url
    }

    #[must_use]
    pub fn output_filename(&self) -> &str {
        &self.output_filename
    }
}

/// Reduce a client-supplied name to a safe download file name
fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let clean: String = base
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '\\' | '/'))
        .collect();

    if clean.is_empty() || clean == "." || clean == ".." {
        DEFAULT_OUTPUT_FILENAME.to_string()
    } else {
        clean
    }
}

/// Position of a request in its linear lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    AssetsFetched,
    DurationKnown,
    ScheduleComputed,
    SlideshowBuilt,
    AudioMuxed,
    Subtitled,
    Responding,
    CleanedUp,
    Failed,
}

fn advance(state: &mut RequestState, next: RequestState) {
    debug!("{state:?} -> {next:?}");
    *state = next;
}

/// Finished video still living in its workspace
///
/// Dropping this (or the stream from [`RenderedVideo::into_stream`]) removes
/// the workspace.
#[derive(Debug)]
pub struct RenderedVideo {
    workspace: Workspace,
    path: PathBuf,
    filename: String,
    schedule: TransitionSchedule,
    audio_duration: f64,
    state: RequestState,
}

impl RenderedVideo {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Download name for the client
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn schedule(&self) -> &TransitionSchedule {
        &self.schedule
    }

    #[must_use]
    pub fn audio_duration(&self) -> f64 {
        self.audio_duration
    }

    #[must_use]
    pub fn state(&self) -> RequestState {
        self.state
    }

    #[must_use]
    pub fn request_id(&self) -> uuid::Uuid {
        self.workspace.id()
    }

    /// Stream the file in chunks; the workspace goes away when the stream ends or is dropped
    pub async fn into_stream(
        mut self,
    ) -> io::Result<impl Stream<Item = io::Result<Bytes>> + Send + 'static> {
        let file = tokio::fs::File::open(&self.path).await?;
        advance(&mut self.state, RequestState::Responding);
        let workspace = self.workspace;
        let request_id = workspace.id();

        Ok(futures::stream::unfold(
            Some((file, workspace)),
            move |open| async move {
                let (mut file, workspace) = open?;
                let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
                match file.read_buf(&mut buf).await {
                    Ok(0) => {
                        drop(file);
                        match workspace.cleanup().await {
                            Ok(()) => debug!("Request {request_id}: {:?}", RequestState::CleanedUp),
                            Err(e) => warn!("Request {request_id}: workspace cleanup failed: {e}"),
                        }
                        None
                    }
                    Ok(_) => Some((Ok(buf.freeze()), Some((file, workspace)))),
                    // Workspace is dropped with the state, which removes it
                    Err(e) => Some((Err(e), None)),
                }
            },
        ))
    }

    /// Copy the video to `destination`, then remove the workspace
    pub async fn save_to(self, destination: &Path) -> io::Result<u64> {
        let bytes = tokio::fs::copy(&self.path, destination).await?;
        self.workspace.cleanup().await?;
        Ok(bytes)
    }
}

/// Sequences one request end to end
pub struct Orchestrator<S> {
    scratch_root: PathBuf,
    pipeline: SlideshowPipeline,
    prober: MediaProber,
    source: S,
}

impl<S: AssetSource> Orchestrator<S> {
    pub fn new(scratch_root: impl Into<PathBuf>, settings: RenderSettings, source: S) -> Self {
        let prober = MediaProber::new(&settings.ffprobe_path).with_timeout(settings.stage_timeout());
        Self {
            scratch_root: scratch_root.into(),
            pipeline: SlideshowPipeline::new(settings),
            prober,
            source,
        }
    }

    /// Create the shared scratch root if it is missing (startup only)
    pub async fn prepare_scratch_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.scratch_root).await
    }

    #[must_use]
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    #[must_use]
    pub fn pipeline(&self) -> &SlideshowPipeline {
        &self.pipeline
    }

    /// Run the whole request
    #[instrument(skip_all, fields(request_id = tracing::field::Empty, images = assets.image_urls.len()))]
    pub async fn render(&self, assets: AssetSet) -> Result<RenderedVideo> {
        // Nothing is downloaded for a request that can never plan
        ensure_enough_images(assets.image_urls.len())?;

        let workspace = Workspace::create(&self.scratch_root).await?;
        Span::current().record("request_id", tracing::field::display(workspace.id()));

        let mut state = RequestState::Created;
        match self.run_stages(&workspace, &assets, &mut state).await {
            Ok((path, schedule, audio_duration)) => {
                info!("Video ready: {}", assets.output_filename);
                Ok(RenderedVideo {
                    workspace,
                    path,
                    filename: assets.output_filename,
                    schedule,
                    audio_duration,
                    state,
                })
            }
            Err(e) => {
                error!("Request failed after {state:?}: {e}");
                advance(&mut state, RequestState::Failed);
                if let Err(cleanup) = workspace.cleanup().await {
                    warn!("Workspace cleanup failed: {cleanup}");
                }
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        workspace: &Workspace,
        assets: &AssetSet,
        state: &mut RequestState,
    ) -> Result<(PathBuf, TransitionSchedule, f64)> {
        info!("Acquiring {} images and narration", assets.image_urls.len());
        tokio::fs::write(workspace.join(SUBTITLE_FILE), &assets.subtitle).await?;

        let audio_path = workspace.join(AUDIO_FILE);
        let image_paths: Vec<PathBuf> = (0..assets.image_urls.len())
            .map(|i| workspace.join(format!("image_{i:02}.jpg")))
            .collect();

        let audio = self
            .source
            .fetch(&assets.audio_url, &audio_path, AssetKind::Audio);
        let images = try_join_all(
            assets
                .image_urls
                .iter()
                .zip(&image_paths)
                .enumerate()
                .map(|(i, (url, path))| self.source.fetch(url, path, AssetKind::Image(i))),
        );
        futures::try_join!(audio, images)?;
        advance(state, RequestState::AssetsFetched);

        let audio_duration = self.prober.probe_duration(&audio_path).await?;
        info!("Audio duration is {audio_duration} seconds");
        advance(state, RequestState::DurationKnown);

        let schedule = plan(
            image_paths.len(),
            audio_duration,
            self.pipeline.settings().transition_duration,
        )?;
        info!(
            "Planned {} transitions: {:.3}s per image, {:.3}s per clip",
            schedule.transition_count(),
            schedule.display_duration,
            schedule.clip_duration
        );
        advance(state, RequestState::ScheduleComputed);

        let silent = self
            .pipeline
            .build_slideshow(workspace, &image_paths, &schedule)
            .await?;
        advance(state, RequestState::SlideshowBuilt);

        let muxed = self.pipeline.mux_audio(workspace, &silent, &audio_path).await?;
        advance(state, RequestState::AudioMuxed);

        let cap = schedule.video_length().min(audio_duration);
        let final_video = self.pipeline.burn_subtitles(workspace, &muxed, cap).await?;
        advance(state, RequestState::Subtitled);

        Ok((final_video, schedule, audio_duration))
    }
}
