//! In-process image backend using the `image` crate.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::capabilities::ToolCapabilities;
use super::error::ConverterError;
use super::ffmpeg::ensure_parent;
use super::traits::Backend;
use super::types::ConversionJob;

const INPUTS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".tif", ".ico",
];

const OUTPUTS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".tif", ".ico",
];

/// Largest edge an ICO entry may have.
const ICO_MAX_EDGE: u32 = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLibraryBackend;

impl ImageLibraryBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for ImageLibraryBackend {
    fn name(&self) -> &str {
        "image-library"
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        capabilities.image_library
    }

    fn input_formats(&self) -> &[&'static str] {
        INPUTS
    }

    fn output_formats(&self) -> &[&'static str] {
        OUTPUTS
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        ensure_parent(&job.output_path).await?;
        let input = job.input_path.clone();
        let output = job.output_path.clone();
        let extension = job.output_format.bare().to_string();
        let quality = job.options.preset().image_quality;

        tokio::task::spawn_blocking(move || transcode(&input, &output, &extension, quality))
            .await
            .map_err(|e| ConverterError::Image(format!("image task failed: {}", e)))?
    }
}

fn transcode(
    input: &Path,
    output: &Path,
    extension: &str,
    quality: u8,
) -> Result<(), ConverterError> {
    let image = ImageReader::open(input)?.with_guessed_format()?.decode()?;
    let format = ImageFormat::from_extension(extension)
        .ok_or_else(|| ConverterError::Image(format!("no encoder for .{}", extension)))?;

    match format {
        ImageFormat::Jpeg => {
            let mut writer = BufWriter::new(File::create(output)?);
            let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
        }
        ImageFormat::Ico => {
            let image = if image.width() > ICO_MAX_EDGE || image.height() > ICO_MAX_EDGE {
                image.thumbnail(ICO_MAX_EDGE, ICO_MAX_EDGE)
            } else {
                image
            };
            DynamicImage::ImageRgba8(image.to_rgba8()).save_with_format(output, format)?;
        }
        ImageFormat::Gif | ImageFormat::WebP => {
            DynamicImage::ImageRgba8(image.to_rgba8()).save_with_format(output, format)?;
        }
        _ => image.save_with_format(output, format)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::testing::fixtures::{one_pixel_png, write_file};
    use tempfile::TempDir;

    fn job(dir: &TempDir, output: &str) -> ConversionJob {
        let input = write_file(dir.path(), "pixel.png", one_pixel_png());
        ConversionJob::new(
            input,
            dir.path().join(format!("pixel{}", output)),
            Format::parse(".png").unwrap(),
            Format::parse(output).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_png_to_ico() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir, ".ico");
        ImageLibraryBackend::new().attempt(&job).await.unwrap();
        let decoded = image::open(&job.output_path).unwrap();
        assert_eq!(decoded.width(), 1);
    }

    #[tokio::test]
    async fn test_png_to_jpeg() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir, ".jpg");
        ImageLibraryBackend::new().attempt(&job).await.unwrap();
        let bytes = std::fs::read(&job.output_path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_garbage_input_fails() {
        let dir = TempDir::new().unwrap();
        let input = write_file(dir.path(), "broken.png", b"not an image");
        let job = ConversionJob::new(
            input,
            dir.path().join("broken.bmp"),
            Format::parse(".png").unwrap(),
            Format::parse(".bmp").unwrap(),
        );
        assert!(ImageLibraryBackend::new().attempt(&job).await.is_err());
    }

    #[test]
    fn test_requires_library_capability() {
        let backend = ImageLibraryBackend::new();
        assert!(backend.is_available(&ToolCapabilities::builtin_only()));
        assert!(!backend.is_available(&ToolCapabilities::none()));
    }
}
