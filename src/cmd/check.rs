use std::path::Path;

use anyhow::{bail, Result};

use slidecast::{ServiceConfig, SlideshowPipeline};

pub async fn cmd_check(config_path: Option<&Path>) -> Result<()> {
    let config = ServiceConfig::load(config_path)?;
    let pipeline = SlideshowPipeline::new(config.render);

    println!("🔍 Checking media tools:\n");
    let settings = pipeline.settings();
    let mut missing = Vec::new();
    for (tool, available) in pipeline.check_tools().await {
        let path = if tool == "ffmpeg" {
            &settings.ffmpeg_path
        } else {
            &settings.ffprobe_path
        };
        if available {
            println!("   ✅ {tool}: {}", path.display());
        } else {
            println!("   ❌ {tool}: not runnable at {}", path.display());
            missing.push(tool);
        }
    }

    if !missing.is_empty() {
        bail!("missing tools: {}", missing.join(", "));
    }
    println!("\n✅ Ready to render");
    Ok(())
}
