//! Synthetic inputs: a lossless test-pattern clip and a matching cue file.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

/// Parameters of the generated clip.
#[derive(Debug, Clone, Copy)]
pub struct ClipSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_secs: u32,
}

impl ClipSpec {
    pub fn frame_count(&self) -> u64 {
        self.fps as u64 * self.duration_secs as u64
    }
}

/// Render ffmpeg's `testsrc` pattern losslessly so decoded frames are exact.
pub fn create_test_clip(ffmpeg: &str, clip: &ClipSpec, dest: &Path) -> Result<()> {
    let source = format!(
        "testsrc=size={}x{}:rate={}:duration={}",
        clip.width, clip.height, clip.fps, clip.duration_secs
    );
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg(&source)
        .args(["-c:v", "libx264", "-qp", "0", "-preset", "ultrafast"])
        .args(["-pix_fmt", "yuv444p"])
        .arg(dest)
        .output()
        .context("Failed to run ffmpeg. Ensure ffmpeg is installed.")?;

    if !output.status.success() {
        anyhow::bail!(
            "Test clip generation failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    tracing::info!(path = %dest.display(), "Generated test clip");
    Ok(())
}

/// A one-cue SubRip file.
pub fn create_cue_file(text: &str, start_secs: u32, end_secs: u32, dest: &Path) -> Result<()> {
    let stamp = |secs: u32| {
        format!(
            "{:02}:{:02}:{:02},000",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )
    };
    let body = format!("1\n{} --> {}\n{}\n", stamp(start_secs), stamp(end_secs), text);
    std::fs::write(dest, body).with_context(|| format!("Failed to write {}", dest.display()))
}

/// Decode every frame of `video` into `dir` as numbered PNGs.
pub fn extract_frames(ffmpeg: &str, video: &Path, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(video)
        .args(["-fps_mode", "passthrough"])
        .arg(dir.join("frame_%05d.png"))
        .output()
        .context("Failed to extract frames. Ensure ffmpeg is installed.")?;

    if !output.status.success() {
        anyhow::bail!(
            "Frame extraction failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("png"))
        .collect();
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_file_contents() {
        let path = std::env::temp_dir().join(format!("e2e_cue_{}.srt", std::process::id()));
        create_cue_file("HELLO", 2, 4, &path).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body, "1\n00:00:02,000 --> 00:00:04,000\nHELLO\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_frame_count() {
        let clip = ClipSpec {
            width: 320,
            height: 240,
            fps: 24,
            duration_secs: 10,
        };
        assert_eq!(clip.frame_count(), 240);
    }
}
