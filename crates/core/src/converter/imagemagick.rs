//! ImageMagick backends (`magick` and the legacy `convert`).

use async_trait::async_trait;
use std::path::PathBuf;

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::ffmpeg::ensure_parent;
use super::process::run_tool;
use super::traits::Backend;
use super::types::ConversionJob;
use crate::config::ToolsConfig;

const INPUTS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".tif", ".ico", ".svg",
];

const OUTPUTS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".tif", ".ico",
];

/// Which ImageMagick entry point to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagickFlavor {
    /// ImageMagick 7
    Magick,
    /// ImageMagick 6
    Convert,
}

pub struct ImageMagickBackend {
    program: PathBuf,
    timeout_secs: u64,
    flavor: MagickFlavor,
}

impl ImageMagickBackend {
    pub fn new(tools: &ToolsConfig, flavor: MagickFlavor) -> Self {
        let program = match flavor {
            MagickFlavor::Magick => tools.magick.clone(),
            MagickFlavor::Convert => tools.convert.clone(),
        };
        Self {
            program,
            timeout_secs: tools.timeout_secs,
            flavor,
        }
    }

    pub fn build_args(&self, job: &ConversionJob) -> Vec<String> {
        let mut input = job.input_path.to_string_lossy().to_string();
        // Animated GIF to a still format: keep only the first frame.
        if job.input_format.as_str() == ".gif" && job.output_format.as_str() != ".gif" {
            input.push_str("[0]");
        }

        let mut args = vec![input];
        match job.output_format.as_str() {
            ".ico" => {
                args.extend([
                    "-background".to_string(),
                    "none".to_string(),
                    "-define".to_string(),
                    "icon:auto-resize=256,128,64,48,32,16".to_string(),
                ]);
            }
            ".jpg" | ".jpeg" | ".webp" => {
                args.extend([
                    "-quality".to_string(),
                    job.options.preset().image_quality.to_string(),
                ]);
            }
            _ => {}
        }
        if job.options.compress {
            args.push("-strip".to_string());
        }
        args.push(job.output_path.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl Backend for ImageMagickBackend {
    fn name(&self) -> &str {
        match self.flavor {
            MagickFlavor::Magick => "magick",
            MagickFlavor::Convert => "convert",
        }
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        match self.flavor {
            MagickFlavor::Magick => capabilities.magick,
            MagickFlavor::Convert => capabilities.convert,
        }
    }

    fn input_formats(&self) -> &[&'static str] {
        INPUTS
    }

    fn output_formats(&self) -> &[&'static str] {
        OUTPUTS
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        ensure_parent(&job.output_path).await?;
        run_tool(&self.program, self.build_args(job), None, self.timeout_secs).await?;
        Ok(())
    }
}
