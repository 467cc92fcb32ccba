//! Narration duration via ffprobe

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error};

use super::command::{ToolCommand, DEFAULT_TIMEOUT};
use super::{Result, SlideshowError};

/// Reads authoritative media durations with ffprobe
#[derive(Debug, Clone)]
pub struct MediaProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl MediaProber {
    #[must_use]
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, media: &Path) -> ToolCommand {
        ToolCommand::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(media)
            .timeout(self.timeout)
    }

    /// Duration of `media` in seconds
    pub async fn probe_duration(&self, media: &Path) -> Result<f64> {
        let cmd = self.command(media);
        let output = cmd
            .output()
            .await
            .map_err(|e| SlideshowError::Probe(e.to_string()))?;

        if !output.success {
            error!(
                "ffprobe failed (exit {:?}) with args {:?}: {}",
                output.exit_code,
                cmd.argv(),
                output.stderr.trim()
            );
            return Err(SlideshowError::Probe(format!(
                "ffprobe exited with {}",
                output
                    .exit_code
                    .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
            )));
        }

        let duration = parse_duration(&output.stdout)?;
        debug!("Probed duration: {duration}s");
        Ok(duration)
    }
}

/// Parse ffprobe's `nokey=1` duration output
fn parse_duration(stdout: &str) -> Result<f64> {
    let text = stdout.trim();
    let value: f64 = text
        .parse()
        .map_err(|_| SlideshowError::Probe(format!("unparseable duration: {text:?}")))?;

    if !value.is_finite() || value <= 0.0 {
        return Err(SlideshowError::Probe(format!(
            "duration must be positive, got {text:?}"
        )));
    }

    Ok(value)
}
