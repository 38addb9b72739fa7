//! Input video probing and still-frame extraction.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use televid_common::config::AppConfig;
use televid_common::error::{TelevidError, TelevidResult};
use televid_cue_model::geometry::FrameSize;

use crate::compositor::{FrameRate, VideoGeometry};
use crate::orchestrator::{run_captured, EngineCommand};

/// Container families the pipeline accepts (ffprobe `format_name` tokens).
pub const SUPPORTED_CONTAINERS: &[&str] = &["mov", "mp4", "matroska", "webm", "avi", "mpegts"];

/// What the probe learned about an input video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub duration: Option<Duration>,
    pub frame_count: Option<u64>,
    pub format_name: String,
    pub video_codec: String,
    pub has_audio: bool,
}

impl VideoInfo {
    pub fn geometry(&self) -> VideoGeometry {
        VideoGeometry {
            size: FrameSize::new(self.width, self.height),
            frame_rate: self.frame_rate,
            frame_count: self.frame_count,
        }
    }

    /// Midpoint of the video, used for thumbnails.
    pub fn midpoint(&self) -> Duration {
        self.duration.map(|d| d / 2).unwrap_or(Duration::ZERO)
    }
}

/// Media inspection used by the pipeline.
pub trait MediaProbe: Send + Sync {
    /// Inspect `path`; fails with `InputVideoInvalid` for unusable inputs.
    fn probe(&self, path: &Path) -> TelevidResult<VideoInfo>;

    /// Write the frame at `at` of `video` to `dest` as an image.
    fn extract_frame(&self, video: &Path, at: Duration, dest: &Path) -> TelevidResult<()>;
}

/// ffprobe/ffmpeg based [`MediaProbe`].
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    ffprobe: EngineCommand,
    ffmpeg: EngineCommand,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

impl FfprobeProbe {
    pub fn new(ffprobe: EngineCommand, ffmpeg: EngineCommand, timeout: Duration) -> Self {
        Self {
            ffprobe,
            ffmpeg,
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            EngineCommand::new(&config.engine.ffprobe),
            EngineCommand::new(&config.engine.ffmpeg),
            Duration::from_secs(config.engine.probe_timeout_secs.max(1)),
        )
    }

    pub fn is_available(&self) -> bool {
        self.ffprobe.is_available()
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> TelevidResult<VideoInfo> {
        if !path.is_file() {
            return Err(TelevidError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.display().to_string(),
        ];
        let run = run_captured(&self.ffprobe, &args, self.timeout).map_err(|e| match e {
            TelevidError::TranscodeTimeout { timeout, .. } => TelevidError::input_invalid(
                path,
                format!("probe timed out after {:.1}s", timeout.as_secs_f64()),
            ),
            other => other,
        })?;

        if !run.status.success() {
            return Err(TelevidError::input_invalid(
                path,
                format!("ffprobe failed ({}): {}", run.status, run.stderr.trim()),
            ));
        }

        let info = parse_probe_output(&run.stdout)
            .map_err(|reason| TelevidError::input_invalid(path, reason))?;
        tracing::debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = %info.frame_rate,
            frames = ?info.frame_count,
            format = %info.format_name,
            "Probed input video"
        );
        Ok(info)
    }

    fn extract_frame(&self, video: &Path, at: Duration, dest: &Path) -> TelevidResult<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", at.as_secs_f64()),
            "-i".to_string(),
            video.display().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            dest.display().to_string(),
        ];
        let run = run_captured(&self.ffmpeg, &args, self.timeout)?;
        if !run.status.success() {
            let _ = std::fs::remove_file(dest);
            return Err(TelevidError::TranscodeFailed {
                status: run.status.to_string(),
                diagnostics: run.stderr,
            });
        }
        if !dest.is_file() {
            return Err(TelevidError::TranscodeOutputMissing {
                path: dest.to_path_buf(),
                diagnostics: run.stderr,
            });
        }
        Ok(())
    }
}

/// Interpret `ffprobe -print_format json` output.
pub fn parse_probe_output(json: &str) -> Result<VideoInfo, String> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| format!("unreadable probe output: {e}"))?;

    let format_name = probe
        .format
        .as_ref()
        .and_then(|f| f.format_name.clone())
        .unwrap_or_default();
    if !SUPPORTED_CONTAINERS
        .iter()
        .any(|c| format_name.split(',').any(|token| token == *c))
    {
        return Err(format!("unsupported container '{format_name}'"));
    }

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| "no video stream".to_string())?;
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };

    let frame_rate = [&video.avg_frame_rate, &video.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| rate.parse::<FrameRate>().ok())
        .ok_or_else(|| "video stream has no usable frame rate".to_string())?;

    let duration = video
        .duration
        .as_deref()
        .or_else(|| probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .and_then(televid_common::clock::secs_to_duration);

    let frame_count = video
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| duration.and_then(|d| frame_rate.floor_frame(d + Duration::from_micros(500))));

    Ok(VideoInfo {
        width,
        height,
        frame_rate,
        duration,
        frame_count,
        format_name,
        video_codec: video.codec_name.clone().unwrap_or_default(),
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MP4_PROBE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video", "width": 1280, "height": 720,
             "r_frame_rate": "24/1", "avg_frame_rate": "24/1", "duration": "10.000000", "nb_frames": "240"},
            {"index": 1, "codec_name": "aac", "codec_type": "audio"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "10.010000"}
    }"#;

    #[test]
    fn test_parse_mp4_probe() {
        let info = parse_probe_output(MP4_PROBE).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.frame_rate, FrameRate::from_fps(24).unwrap());
        assert_eq!(info.frame_count, Some(240));
        assert_eq!(info.duration, Some(Duration::from_secs(10)));
        assert_eq!(info.midpoint(), Duration::from_secs(5));
        assert!(info.has_audio);
        assert_eq!(info.video_codec, "h264");
    }

    #[test]
    fn test_frame_count_from_duration() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360,
                         "r_frame_rate": "30000/1001", "avg_frame_rate": "0/0"}],
            "format": {"format_name": "matroska,webm", "duration": "2.002000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.frame_rate, FrameRate::new(30000, 1001).unwrap());
        assert_eq!(info.frame_count, Some(60));
        assert!(!info.has_audio);
    }

    #[test]
    fn test_rejects_audio_only_and_images() {
        let audio = r#"{"streams": [{"codec_type": "audio"}], "format": {"format_name": "mov,mp4,m4a"}}"#;
        assert_eq!(parse_probe_output(audio).unwrap_err(), "no video stream");

        let image = r#"{"streams": [{"codec_type": "video", "width": 10, "height": 10,
                         "r_frame_rate": "25/1"}], "format": {"format_name": "png_pipe"}}"#;
        assert!(parse_probe_output(image)
            .unwrap_err()
            .contains("unsupported container"));

        assert!(parse_probe_output("not json").is_err());
    }

    #[test]
    fn test_probe_missing_file() {
        let probe = FfprobeProbe::from_config(&AppConfig::default());
        let err = probe
            .probe(Path::new("/definitely/not/here.mp4"))
            .unwrap_err();
        assert!(matches!(err, TelevidError::FileNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_failure_is_input_invalid() {
        let input = std::env::temp_dir().join(format!("televid_probe_{}.mp4", std::process::id()));
        std::fs::write(&input, b"not really a video").unwrap();
        let probe = FfprobeProbe::new(
            EngineCommand::new("sh").with_leading_args([
                "-c",
                "echo 'Invalid data found when processing input' >&2; exit 1",
                "ffprobe",
            ]),
            EngineCommand::new("sh"),
            Duration::from_secs(5),
        );

        let err = probe.probe(&input).unwrap_err();
        match err {
            TelevidError::InputVideoInvalid { reason, .. } => {
                assert!(reason.contains("Invalid data"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let _ = std::fs::remove_file(&input);
    }
}
