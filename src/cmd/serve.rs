use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Result;

use slidecast::ServiceConfig;

pub async fn cmd_serve(
    config_path: Option<&Path>,
    bind: Option<SocketAddr>,
    scratch_root: Option<PathBuf>,
) -> Result<()> {
    let mut config = ServiceConfig::load(config_path)?;
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(root) = scratch_root {
        config.scratch_root = root;
    }
    config.validate()?;

    slidecast::server::serve(config).await
}
