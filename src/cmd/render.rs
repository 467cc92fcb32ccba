use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};

use slidecast::{random_profile, AssetFetcher, AssetSet, Orchestrator, ServiceConfig};

pub async fn cmd_render(
    config_path: Option<&Path>,
    images: Vec<String>,
    audio: String,
    subtitles: &Path,
    output: &Path,
    scratch_root: Option<PathBuf>,
) -> Result<()> {
    let mut config = ServiceConfig::load(config_path)?;
    if let Some(root) = scratch_root {
        config.scratch_root = root;
    }

    let subtitle = tokio::fs::read(subtitles)
        .await
        .with_context(|| format!("failed to read {}", subtitles.display()))?;

    let fetcher = AssetFetcher::with_config(&config.download, &random_profile())?;
    let orchestrator = Orchestrator::new(&config.scratch_root, config.render, fetcher);
    orchestrator.prepare_scratch_root().await?;

    println!("🎬 Rendering {} images...", images.len());
    let start = Instant::now();

    let video = orchestrator
        .render(AssetSet::new(images, audio, subtitle))
        .await?;
    let audio_duration = video.audio_duration();
    let display = video.schedule().display_duration;
    let bytes = video.save_to(output).await?;

    println!("   Narration:  {audio_duration:.3}s ({display:.3}s per image)");
    println!(
        "💾 Saved {bytes} bytes to {} in {:.1}s",
        output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
