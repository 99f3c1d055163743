//! Builds the per-category converter chains.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::archive::{ArchiveConverter, BuiltinArchiveBackend, SevenZipBackend};
use super::capabilities::ToolCapabilities;
use super::chain::ConverterChain;
use super::document::BuiltinDocumentBackend;
use super::ffmpeg::{FfmpegBackend, FfmpegMode};
use super::image_lib::ImageLibraryBackend;
use super::imagemagick::{ImageMagickBackend, MagickFlavor};
use super::office::{OfficeSuite, OfficeSuiteBackend, PandocBackend, SsconvertBackend};
use super::spreadsheet::DelimitedBackend;
use super::traits::{Backend, Converter};
use super::types::SupportedFormats;
use crate::classifier::Category;
use crate::config::ToolsConfig;

/// One converter per supported category, constructed once at startup.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<Category, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// The standard chains, in fixed priority order per category.
    pub fn new(tools: &ToolsConfig) -> Self {
        let office = |category| -> Vec<Arc<dyn Backend>> {
            vec![
                Arc::new(OfficeSuiteBackend::new(tools, OfficeSuite::LibreOffice, category)),
                Arc::new(OfficeSuiteBackend::new(tools, OfficeSuite::Soffice, category)),
            ]
        };

        let video = ConverterChain::new(
            Category::Video,
            vec![
                Arc::new(FfmpegBackend::new(tools, Category::Video, FfmpegMode::Native)),
                Arc::new(FfmpegBackend::new(tools, Category::Video, FfmpegMode::Relaxed)),
            ],
        );
        let audio = ConverterChain::new(
            Category::Audio,
            vec![
                Arc::new(FfmpegBackend::new(tools, Category::Audio, FfmpegMode::Native)),
                Arc::new(FfmpegBackend::new(tools, Category::Audio, FfmpegMode::Relaxed)),
            ],
        );
        let image = ConverterChain::new(
            Category::Image,
            vec![
                Arc::new(FfmpegBackend::new(tools, Category::Image, FfmpegMode::Native)),
                Arc::new(ImageMagickBackend::new(tools, MagickFlavor::Magick)),
                Arc::new(ImageMagickBackend::new(tools, MagickFlavor::Convert)),
                Arc::new(ImageLibraryBackend::new()),
                Arc::new(FfmpegBackend::new(tools, Category::Image, FfmpegMode::Relaxed)),
            ],
        );

        let mut document_backends = office(Category::Document);
        document_backends.push(Arc::new(PandocBackend::new(tools)));
        document_backends.push(Arc::new(BuiltinDocumentBackend::new()));
        let document = ConverterChain::new(Category::Document, document_backends);

        let mut spreadsheet_backends: Vec<Arc<dyn Backend>> =
            vec![Arc::new(DelimitedBackend::new())];
        spreadsheet_backends.extend(office(Category::Spreadsheet));
        spreadsheet_backends.push(Arc::new(SsconvertBackend::new(tools)));
        let spreadsheet = ConverterChain::new(Category::Spreadsheet, spreadsheet_backends);

        let presentation = ConverterChain::new(Category::Presentation, office(Category::Presentation));

        let archive = ArchiveConverter::new(vec![
            Arc::new(BuiltinArchiveBackend::new()),
            Arc::new(SevenZipBackend::new(tools)),
        ]);

        let mut converters: HashMap<Category, Arc<dyn Converter>> = HashMap::new();
        converters.insert(Category::Video, Arc::new(video));
        converters.insert(Category::Audio, Arc::new(audio));
        converters.insert(Category::Image, Arc::new(image));
        converters.insert(Category::Document, Arc::new(document));
        converters.insert(Category::Spreadsheet, Arc::new(spreadsheet));
        converters.insert(Category::Presentation, Arc::new(presentation));
        converters.insert(Category::Archive, Arc::new(archive));
        Self { converters }
    }

    /// A registry with explicit converters, for tests.
    pub fn from_converters(converters: Vec<Arc<dyn Converter>>) -> Self {
        Self {
            converters: converters
                .into_iter()
                .map(|converter| (converter.category(), converter))
                .collect(),
        }
    }

    pub fn get(&self, category: Category) -> Option<Arc<dyn Converter>> {
        self.converters.get(&category).cloned()
    }

    /// Formats convertible right now, per category.
    pub fn supported_formats(
        &self,
        capabilities: &ToolCapabilities,
    ) -> BTreeMap<Category, SupportedFormats> {
        self.converters
            .iter()
            .map(|(category, converter)| (*category, converter.supported_formats(capabilities)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    fn fmt(raw: &str) -> Format {
        Format::parse(raw).unwrap()
    }

    #[test]
    fn test_every_category_has_a_converter() {
        let registry = ConverterRegistry::new(&ToolsConfig::default());
        for category in Category::SUPPORTED {
            let converter = registry.get(category).unwrap();
            assert_eq!(converter.category(), category);
        }
        assert!(registry.get(Category::Unknown).is_none());
    }

    #[test]
    fn test_builtin_only_formats() {
        let registry = ConverterRegistry::new(&ToolsConfig::default());
        let formats = registry.supported_formats(&ToolCapabilities::builtin_only());

        assert!(formats[&Category::Video].inputs.is_empty());
        assert!(formats[&Category::Presentation].outputs.is_empty());
        assert!(formats[&Category::Image].accepts_output(&fmt("ico")));
        assert!(formats[&Category::Document].accepts_output(&fmt("md")));
        assert!(!formats[&Category::Document].accepts_output(&fmt("pdf")));
        assert!(formats[&Category::Spreadsheet].accepts_output(&fmt("json")));
        assert!(formats[&Category::Archive].accepts_input(&fmt("tar.gz")));
        assert!(!formats[&Category::Archive].accepts_input(&fmt("rar")));
    }

    #[test]
    fn test_detected_tools_extend_formats() {
        let registry = ConverterRegistry::new(&ToolsConfig::default());
        let caps = ToolCapabilities {
            ffmpeg: true,
            libreoffice: true,
            sevenzip: true,
            ..ToolCapabilities::builtin_only()
        };
        let formats = registry.supported_formats(&caps);
        assert!(formats[&Category::Video].accepts_output(&fmt("gif")));
        assert!(formats[&Category::Document].accepts_output(&fmt("pdf")));
        assert!(formats[&Category::Presentation].accepts_input(&fmt("pptx")));
        assert!(formats[&Category::Archive].accepts_input(&fmt("rar")));
    }
}
