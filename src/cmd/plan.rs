use anyhow::Result;

use slidecast::slideshow::{plan, RenderSettings, SlideshowPipeline};

pub fn cmd_plan(images: usize, duration: f64, transition: f64, json: bool) -> Result<()> {
    let schedule = plan(images, duration, transition)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }

    let settings = RenderSettings {
        transition_duration: transition,
        ..RenderSettings::default()
    };
    let pipeline = SlideshowPipeline::new(settings);

    let offsets: Vec<String> = schedule.offsets.iter().map(ToString::to_string).collect();

    println!("🎞️  {images} images over {duration}s narration");
    println!("   Display:    {:.3}s per image", schedule.display_duration);
    println!("   Clip:       {:.3}s per input", schedule.clip_duration);
    println!("   Offsets:    {}", offsets.join(", "));
    println!("   Video:      {:.3}s before trimming", schedule.video_length());
    println!("\n🧩 Filter graph:\n{}", pipeline.filter_graph(&schedule));

    Ok(())
}
