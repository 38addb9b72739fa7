//! Show video properties.

use std::path::PathBuf;

use televid_common::config::AppConfig;
use televid_render_engine::{FfprobeProbe, MediaProbe};

use super::print_json;

pub fn run(config: &AppConfig, input: PathBuf, json: bool) -> anyhow::Result<()> {
    let info = FfprobeProbe::from_config(config).probe(&input)?;
    if json {
        return print_json(&info);
    }

    println!("Video: {}", input.display());
    println!("  Container: {}", info.format_name);
    println!("  Codec: {}", info.video_codec);
    println!(
        "  Resolution: {}x{} @ {} fps ({:.3})",
        info.width,
        info.height,
        info.frame_rate,
        info.frame_rate.as_f64()
    );
    match info.duration {
        Some(d) => println!("  Duration: {:.3}s", d.as_secs_f64()),
        None => println!("  Duration: unknown"),
    }
    match info.frame_count {
        Some(n) => println!("  Frames: {n}"),
        None => println!("  Frames: unknown"),
    }
    println!("  Audio: {}", if info.has_audio { "yes" } else { "no" });
    Ok(())
}
