//! Converter module: per-category chains of conversion backends.
//!
//! Each category owns an ordered list of [`Backend`]s. A [`ConverterChain`]
//! tries them in priority order, skipping those absent from the current
//! [`ToolCapabilities`], and falls through on failure until one produces
//! the output file.
//!
//! # Example
//!
//! ```ignore
//! use transmute_core::converter::{CapabilityProbe, ConversionJob, ConverterRegistry};
//!
//! let registry = ConverterRegistry::new(&config.tools);
//! let probe = Arc::new(CapabilityProbe::new());
//! probe.spawn_detection(config.tools.clone());
//!
//! let job = ConversionJob::new(
//!     "/uploads/abc-report.docx",
//!     "/converted/report-1a2b3c4d.md",
//!     Format::parse("docx").unwrap(),
//!     Format::parse("md").unwrap(),
//! );
//! let converter = registry.get(Category::Document).unwrap();
//! let output = converter.convert(&job, &probe.snapshot()).await?;
//! ```

pub mod archive;
mod capabilities;
mod chain;
pub mod document;
mod error;
mod ffmpeg;
mod image_lib;
mod imagemagick;
mod markup;
mod office;
mod process;
mod registry;
pub mod spreadsheet;
mod traits;
mod types;

pub use archive::{ArchiveBackend, ArchiveConverter, BuiltinArchiveBackend, SevenZipBackend};
pub use capabilities::{probed_paths, CapabilityProbe, ToolCapabilities};
pub use chain::ConverterChain;
pub use document::{BuiltinDocumentBackend, DocumentModel};
pub use error::ConverterError;
pub use ffmpeg::{FfmpegBackend, FfmpegMode};
pub use image_lib::ImageLibraryBackend;
pub use imagemagick::{ImageMagickBackend, MagickFlavor};
pub use office::{OfficeSuite, OfficeSuiteBackend, PandocBackend, SsconvertBackend};
pub use process::{run_tool, tool_responds};
pub use registry::ConverterRegistry;
pub use spreadsheet::DelimitedBackend;
pub use traits::{Backend, Converter};
pub use types::{
    ConversionJob, ConversionOptions, Quality, QualityPreset, SupportedFormats,
    ANIMATED_FPS, ANIMATED_MAX_DURATION_SECS, ANIMATED_WIDTH,
};
