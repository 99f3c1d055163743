//! FFmpeg-based backend for video, audio and image conversion.

use async_trait::async_trait;
use std::path::Path;

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::process::run_tool;
use super::traits::Backend;
use super::types::{
    ConversionJob, ConversionOptions, ANIMATED_FPS, ANIMATED_MAX_DURATION_SECS, ANIMATED_WIDTH,
};
use crate::classifier::Category;
use crate::config::ToolsConfig;
use crate::format::Format;

pub(crate) const VIDEO_FORMATS: &[&str] = &[
    ".mp4", ".avi", ".mov", ".mkv", ".webm", ".flv", ".wmv", ".m4v", ".mpeg", ".mpg", ".3gp",
];

pub(crate) const AUDIO_FORMATS: &[&str] = &[
    ".mp3", ".wav", ".ogg", ".flac", ".aac", ".m4a", ".wma", ".opus",
];

/// Still formats ffmpeg reads and writes without help.
pub(crate) const NATIVE_IMAGE_FORMATS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".bmp", ".webp", ".tiff", ".tif", ".gif",
];

/// Image formats tried by the relaxed retry.
const RELAXED_IMAGE_FORMATS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".bmp", ".webp", ".tiff", ".tif", ".gif", ".ico",
];

/// Outputs rendered as a short looping animation from a video source.
const ANIMATED_FORMATS: &[&str] = &[".gif", ".webp"];

/// Outputs produced by grabbing one frame of a video source.
const STILL_FORMATS: &[&str] = &[".jpg", ".jpeg", ".png", ".bmp", ".tiff", ".tif"];

const VIDEO_OUTPUTS: &[&str] = &[
    ".mp4", ".avi", ".mov", ".mkv", ".webm", ".flv", ".wmv", ".m4v", ".mpeg", ".mpg", ".3gp",
    ".mp3", ".wav", ".ogg", ".flac", ".aac", ".m4a", ".wma", ".opus", ".gif", ".webp", ".jpg",
    ".jpeg", ".png", ".bmp", ".tiff", ".tif",
];

/// How much the backend assumes about the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfmpegMode {
    /// Explicit codecs and quality settings per output format.
    Native,
    /// Let ffmpeg pick codecs; keep only the output size caps.
    Relaxed,
}

/// FFmpeg-based backend for one medium.
pub struct FfmpegBackend {
    ffmpeg_path: std::path::PathBuf,
    timeout_secs: u64,
    medium: Category,
    mode: FfmpegMode,
}

impl FfmpegBackend {
    /// Creates a new FFmpeg backend for `medium` (video, audio, or image).
    pub fn new(tools: &ToolsConfig, medium: Category, mode: FfmpegMode) -> Self {
        Self {
            ffmpeg_path: tools.ffmpeg.clone(),
            timeout_secs: tools.timeout_secs,
            medium,
            mode,
        }
    }

    /// Builds ffmpeg arguments for a job.
    pub fn build_args(&self, job: &ConversionJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
        ];

        let output = &job.output_format;
        let options = &job.options;
        let relaxed = self.mode == FfmpegMode::Relaxed;

        match self.medium {
            Category::Video if output.is_any(AUDIO_FORMATS) => {
                args.push("-vn".to_string());
                if !relaxed {
                    args.extend(audio_codec_args(output, options));
                }
            }
            Category::Video if output.is_any(ANIMATED_FORMATS) => {
                args.extend(animated_args(output, options, relaxed));
            }
            Category::Video if output.is_any(STILL_FORMATS) => {
                args.extend(["-frames:v".to_string(), "1".to_string()]);
                if !relaxed {
                    args.extend(image_quality_args(output, options));
                }
            }
            Category::Video if !relaxed => args.extend(video_codec_args(output, options)),
            Category::Audio if !relaxed => args.extend(audio_codec_args(output, options)),
            Category::Image if !relaxed => args.extend(image_quality_args(output, options)),
            _ => {}
        }

        args.push(job.output_path.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl Backend for FfmpegBackend {
    fn name(&self) -> &str {
        match self.mode {
            FfmpegMode::Native => "ffmpeg",
            FfmpegMode::Relaxed => "ffmpeg-relaxed",
        }
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        capabilities.ffmpeg
    }

    fn input_formats(&self) -> &[&'static str] {
        match (self.medium, self.mode) {
            (Category::Video, _) => VIDEO_FORMATS,
            (Category::Audio, _) => AUDIO_FORMATS,
            (_, FfmpegMode::Native) => NATIVE_IMAGE_FORMATS,
            (_, FfmpegMode::Relaxed) => RELAXED_IMAGE_FORMATS,
        }
    }

    fn output_formats(&self) -> &[&'static str] {
        match (self.medium, self.mode) {
            (Category::Video, _) => VIDEO_OUTPUTS,
            (Category::Audio, _) => AUDIO_FORMATS,
            (_, FfmpegMode::Native) => NATIVE_IMAGE_FORMATS,
            (_, FfmpegMode::Relaxed) => RELAXED_IMAGE_FORMATS,
        }
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        ensure_parent(&job.output_path).await?;
        let args = self.build_args(job);
        run_tool(&self.ffmpeg_path, &args, None, self.timeout_secs).await?;
        Ok(())
    }
}

pub(crate) async fn ensure_parent(path: &Path) -> Result<(), ConverterError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn audio_codec_args(output: &Format, options: &ConversionOptions) -> Vec<String> {
    let bitrate = format!("{}k", options.preset().audio_bitrate_kbps);
    let args: Vec<&str> = match output.as_str() {
        ".mp3" => vec!["-c:a", "libmp3lame", "-b:a", &bitrate],
        ".ogg" => vec!["-c:a", "libvorbis", "-b:a", &bitrate],
        ".opus" => vec!["-c:a", "libopus", "-b:a", &bitrate],
        ".aac" | ".m4a" => vec!["-c:a", "aac", "-b:a", &bitrate],
        ".wma" => vec!["-c:a", "wmav2", "-b:a", &bitrate],
        ".flac" => vec![
            "-c:a",
            "flac",
            "-compression_level",
            if options.compress { "8" } else { "5" },
        ],
        ".wav" => vec!["-c:a", "pcm_s16le"],
        _ => vec!["-b:a", &bitrate],
    };
    args.into_iter().map(String::from).collect()
}

fn video_codec_args(output: &Format, options: &ConversionOptions) -> Vec<String> {
    let preset = options.preset();
    let crf = preset.video_crf.to_string();
    let video_bitrate = format!("{}k", preset.video_bitrate_kbps);
    let audio_bitrate = format!("{}k", preset.audio_bitrate_kbps);
    let speed = if options.compress { "slow" } else { "medium" };

    let mut args: Vec<&str> = match output.as_str() {
        ".webm" => vec![
            "-c:v",
            "libvpx-vp9",
            "-crf",
            &crf,
            "-b:v",
            "0",
            "-c:a",
            "libopus",
            "-b:a",
            &audio_bitrate,
        ],
        ".mp4" | ".m4v" | ".mov" | ".mkv" | ".3gp" => vec![
            "-c:v",
            "libx264",
            "-preset",
            speed,
            "-crf",
            &crf,
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-b:a",
            &audio_bitrate,
        ],
        _ => vec!["-b:v", &video_bitrate, "-b:a", &audio_bitrate],
    };
    if output.is_any(&[".mp4", ".m4v", ".mov"]) {
        args.extend(["-movflags", "+faststart"]);
    }
    args.into_iter().map(String::from).collect()
}

fn animated_args(output: &Format, options: &ConversionOptions, relaxed: bool) -> Vec<String> {
    let preset = options.preset();
    let mut args = vec![
        "-t".to_string(),
        ANIMATED_MAX_DURATION_SECS.to_string(),
        "-vf".to_string(),
        format!(
            "fps={},scale={}:-1:flags=lanczos",
            ANIMATED_FPS, ANIMATED_WIDTH
        ),
        "-loop".to_string(),
        "0".to_string(),
    ];
    if output.as_str() == ".webp" && !relaxed {
        args.extend([
            "-c:v".to_string(),
            "libwebp".to_string(),
            "-quality".to_string(),
            preset.image_quality.to_string(),
        ]);
    }
    args
}

fn image_quality_args(output: &Format, options: &ConversionOptions) -> Vec<String> {
    let quality = options.preset().image_quality;
    match output.as_str() {
        ".jpg" | ".jpeg" => vec!["-q:v".to_string(), jpeg_qscale(quality).to_string()],
        ".webp" => vec!["-quality".to_string(), quality.to_string()],
        ".png" => vec![
            "-compression_level".to_string(),
            if options.compress { "9" } else { "6" }.to_string(),
        ],
        _ => Vec::new(),
    }
}

/// Maps a 1-100 quality percentage onto ffmpeg's 2-31 JPEG qscale (lower is
/// better).
fn jpeg_qscale(quality: u8) -> u8 {
    let quality = quality.min(100) as u32;
    (2 + (100 - quality) * 29 / 100) as u8
}
