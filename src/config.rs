//! Service configuration loaded from `~/.config/slidecast/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//!
//! ```toml
//! bind = "0.0.0.0:8000"
//! scratch_root = "/tmp/ffmpeg_processing"
//!
//! [render]
//! transition = "fade"
//! transition_duration = 1.0
//! fps = 25
//!
//! [download]
//! timeout_secs = 120
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::fetch::DownloadConfig;
use crate::slideshow::RenderSettings;

/// Default port for the HTTP endpoint.
pub const DEFAULT_PORT: u16 = 8000;

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listen address for the HTTP server.
    pub bind: SocketAddr,
    /// Shared parent of all request workspaces.
    pub scratch_root: PathBuf,
    pub render: RenderSettings,
    pub download: DownloadConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            scratch_root: PathBuf::from("/tmp/ffmpeg_processing"),
            render: RenderSettings::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present and built-in defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scratch_root.as_os_str().is_empty() {
            bail!("scratch_root must not be empty");
        }
        self.render
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid [render] section: {e}"))?;
        self.download
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid [download] section: {e}"))?;
        Ok(())
    }
}

/// Return the path to the service config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slidecast")
        .join("config.toml")
}
