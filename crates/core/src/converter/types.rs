//! Types for conversion jobs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::format::Format;

/// Longest stretch of a motion-picture source rendered into an animated
/// image.
pub const ANIMATED_MAX_DURATION_SECS: u32 = 10;

/// Frame rate of animated output, whatever the quality.
pub const ANIMATED_FPS: u32 = 10;

/// Width in pixels of animated output; height follows the aspect ratio.
pub const ANIMATED_WIDTH: u32 = 480;

/// Requested output quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    /// Parses a quality name case-insensitively. Unrecognised values fall
    /// back to [`Quality::Medium`].
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Quality::Low,
            "high" => Quality::High,
            _ => Quality::Medium,
        }
    }

    /// Concrete encoder settings for this quality.
    pub fn preset(&self) -> QualityPreset {
        match self {
            Quality::Low => QualityPreset {
                video_bitrate_kbps: 500,
                video_crf: 32,
                audio_bitrate_kbps: 96,
                image_quality: 60,
            },
            Quality::Medium => QualityPreset {
                video_bitrate_kbps: 1500,
                video_crf: 26,
                audio_bitrate_kbps: 160,
                image_quality: 80,
            },
            Quality::High => QualityPreset {
                video_bitrate_kbps: 4000,
                video_crf: 20,
                audio_bitrate_kbps: 256,
                image_quality: 95,
            },
        }
    }
}

/// Per-medium encoder settings derived from a [`Quality`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    pub video_bitrate_kbps: u32,
    pub video_crf: u8,
    pub audio_bitrate_kbps: u32,
    /// Image quality percentage (1-100).
    pub image_quality: u8,
}

/// Caller-supplied hints for a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    #[serde(default)]
    pub quality: Quality,
    /// Prefer smaller output over fidelity.
    #[serde(default)]
    pub compress: bool,
}

impl ConversionOptions {
    /// Options from the raw upload form fields.
    ///
    /// An explicit quality wins; otherwise compression selects the low
    /// preset and its absence the high one.
    pub fn from_form(quality: Option<&str>, use_compression: Option<&str>) -> Self {
        let compress = use_compression
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let quality = match quality {
            Some(q) => Quality::parse_lenient(q),
            None if compress => Quality::Low,
            None if use_compression.is_some() => Quality::High,
            None => Quality::Medium,
        };
        Self { quality, compress }
    }

    pub fn preset(&self) -> QualityPreset {
        self.quality.preset()
    }
}

/// A single conversion to perform.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Input file path.
    pub input_path: PathBuf,
    /// Output file path (will be created).
    pub output_path: PathBuf,
    pub input_format: Format,
    pub output_format: Format,
    /// The name the client uploaded the file under. Used where the output
    /// embeds a filename (archive entries).
    pub source_name: String,
    pub options: ConversionOptions,
}

impl ConversionJob {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        input_format: Format,
        output_format: Format,
    ) -> Self {
        let input_path = input_path.into();
        let source_name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("input{}", input_format));
        Self {
            input_path,
            output_path: output_path.into(),
            input_format,
            output_format,
            source_name,
            options: ConversionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }
}

/// Input and output formats a converter can currently handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupportedFormats {
    pub inputs: Vec<Format>,
    pub outputs: Vec<Format>,
}

impl SupportedFormats {
    pub fn accepts_input(&self, format: &Format) -> bool {
        self.inputs.contains(format)
    }

    pub fn accepts_output(&self, format: &Format) -> bool {
        self.outputs.contains(format)
    }

    /// Adds formats not already present, preserving first-seen order.
    pub fn extend(&mut self, inputs: &[&str], outputs: &[&str]) {
        for raw in inputs {
            if let Some(f) = Format::parse(raw) {
                if !self.inputs.contains(&f) {
                    self.inputs.push(f);
                }
            }
        }
        for raw in outputs {
            if let Some(f) = Format::parse(raw) {
                if !self.outputs.contains(&f) {
                    self.outputs.push(f);
                }
            }
        }
    }
}
