//! Testing utilities and mock implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use transmute_core::testing::{AttemptLog, MockBackend};
//!
//! let log = AttemptLog::default();
//! let chain = ConverterChain::new(
//!     Category::Image,
//!     vec![
//!         Arc::new(MockBackend::failing("primary", &[".png"], &[".jpg"]).with_log(&log)),
//!         Arc::new(MockBackend::succeeding("fallback", &[".png"], &[".jpg"]).with_log(&log)),
//!     ],
//! );
//! chain.convert(&job, &caps).await?;
//! assert_eq!(log.names(), vec!["primary", "fallback"]);
//! ```

mod mock_backend;

pub use mock_backend::{AttemptLog, MockBackend};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// Writes `contents` to `dir/name` and returns the path.
    pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture parent");
        }
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    /// A 1x1 opaque PNG.
    pub fn one_pixel_png() -> Vec<u8> {
        let mut bytes = Vec::new();
        let image = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 0, 0, 255]));
        image::DynamicImage::ImageRgba8(image)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .expect("encode png");
        bytes
    }

    /// A minimal `.docx` package with a title and the given paragraphs.
    pub fn docx_bytes(title: &str, paragraphs: &[&str]) -> Vec<u8> {
        use std::io::Write;
        use zip::write::FileOptions;

        let mut body = format!(
            r#"<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
            title
        );
        for p in paragraphs {
            body.push_str(&format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, p));
        }
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let mut buffer = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
            zip.start_file("word/document.xml", FileOptions::default())
                .expect("start entry");
            zip.write_all(document.as_bytes()).expect("write entry");
            zip.finish().expect("finish zip");
        }
        buffer
    }
}
