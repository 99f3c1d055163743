//! Backend capability detection.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::process::tool_responds;
use crate::config::ToolsConfig;

/// Backends detected on this system.
///
/// Computed once, then treated as read-only. In-process libraries are
/// recorded here too so tests can simulate a system with nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCapabilities {
    /// ffmpeg (video, audio, image)
    pub ffmpeg: bool,
    /// ImageMagick 7 `magick`
    pub magick: bool,
    /// ImageMagick 6 `convert`
    pub convert: bool,
    pub libreoffice: bool,
    pub soffice: bool,
    pub pandoc: bool,
    /// Gnumeric `ssconvert`
    pub ssconvert: bool,
    /// 7-Zip
    pub sevenzip: bool,
    /// In-process image codecs
    pub image_library: bool,
    /// In-process document parse/render
    pub document_builtin: bool,
    /// In-process delimited-text handling
    pub spreadsheet_builtin: bool,
    /// In-process zip/tar/gzip codecs
    pub archive_builtin: bool,
    /// Whether external tool detection has completed.
    pub probed: bool,
}

impl ToolCapabilities {
    /// Nothing available, not even the in-process backends.
    pub fn none() -> Self {
        Self::default()
    }

    /// Only the in-process backends; every external tool absent.
    pub fn builtin_only() -> Self {
        Self {
            image_library: true,
            document_builtin: true,
            spreadsheet_builtin: true,
            archive_builtin: true,
            ..Self::default()
        }
    }

    /// Probe every configured external tool. Never fails; a tool that
    /// cannot be run is recorded as absent.
    pub async fn detect(tools: &ToolsConfig) -> Self {
        let (ffmpeg, magick, convert, libreoffice, soffice, pandoc, ssconvert, sevenzip) = tokio::join!(
            tool_responds(&tools.ffmpeg, &["-version"]),
            tool_responds(&tools.magick, &["-version"]),
            tool_responds(&tools.convert, &["-version"]),
            tool_responds(&tools.libreoffice, &["--version"]),
            tool_responds(&tools.soffice, &["--version"]),
            tool_responds(&tools.pandoc, &["--version"]),
            tool_responds(&tools.ssconvert, &["--version"]),
            tool_responds(&tools.sevenzip, &["i"]),
        );

        Self {
            ffmpeg,
            magick,
            convert,
            libreoffice,
            soffice,
            pandoc,
            ssconvert,
            sevenzip,
            probed: true,
            ..Self::builtin_only()
        }
    }

    /// The office suite executable to use, preferring `libreoffice`.
    pub fn office_suite<'a>(&self, tools: &'a ToolsConfig) -> Option<&'a Path> {
        if self.libreoffice {
            Some(&tools.libreoffice)
        } else if self.soffice {
            Some(&tools.soffice)
        } else {
            None
        }
    }

    pub fn has_office_suite(&self) -> bool {
        self.libreoffice || self.soffice
    }

    /// Names of the backends present, for logging and the capabilities
    /// endpoint.
    pub fn present(&self) -> Vec<&'static str> {
        [
            (self.ffmpeg, "ffmpeg"),
            (self.magick, "magick"),
            (self.convert, "convert"),
            (self.libreoffice, "libreoffice"),
            (self.soffice, "soffice"),
            (self.pandoc, "pandoc"),
            (self.ssconvert, "ssconvert"),
            (self.sevenzip, "7z"),
            (self.image_library, "image-library"),
            (self.document_builtin, "builtin-document"),
            (self.spreadsheet_builtin, "builtin-spreadsheet"),
            (self.archive_builtin, "builtin-archive"),
        ]
        .into_iter()
        .filter_map(|(present, name)| present.then_some(name))
        .collect()
    }
}

/// Publishes the current capability set.
///
/// Starts at [`ToolCapabilities::builtin_only`]; detection runs in the
/// background and replaces the value when it finishes. Until then every
/// external tool reads as absent.
#[derive(Debug)]
pub struct CapabilityProbe {
    tx: watch::Sender<ToolCapabilities>,
}

impl Default for CapabilityProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityProbe {
    pub fn new() -> Self {
        Self::fixed(ToolCapabilities::builtin_only())
    }

    /// A probe whose value never changes unless replaced explicitly.
    pub fn fixed(capabilities: ToolCapabilities) -> Self {
        let (tx, _rx) = watch::channel(capabilities);
        Self { tx }
    }

    /// Current capability set.
    pub fn snapshot(&self) -> ToolCapabilities {
        self.tx.borrow().clone()
    }

    /// Replaces the published set.
    pub fn publish(&self, capabilities: ToolCapabilities) {
        self.tx.send_replace(capabilities);
    }

    /// Runs detection in the background and publishes the result.
    pub fn spawn_detection(self: &Arc<Self>, tools: ToolsConfig) -> JoinHandle<()> {
        let probe = Arc::clone(self);
        tokio::spawn(async move {
            let capabilities = ToolCapabilities::detect(&tools).await;
            tracing::info!(present = ?capabilities.present(), "Capability detection finished");
            probe.publish(capabilities);
        })
    }

    /// Waits until detection has completed.
    pub async fn ready(&self) -> ToolCapabilities {
        let mut rx = self.tx.subscribe();
        let caps = match rx.wait_for(|caps| caps.probed).await {
            Ok(caps) => caps.clone(),
            Err(_) => self.snapshot(),
        };
        caps
    }
}

/// Paths checked by detection, for the capabilities endpoint.
pub fn probed_paths(tools: &ToolsConfig) -> Vec<(&'static str, PathBuf)> {
    vec![
        ("ffmpeg", tools.ffmpeg.clone()),
        ("magick", tools.magick.clone()),
        ("convert", tools.convert.clone()),
        ("libreoffice", tools.libreoffice.clone()),
        ("soffice", tools.soffice.clone()),
        ("pandoc", tools.pandoc.clone()),
        ("ssconvert", tools.ssconvert.clone()),
        ("7z", tools.sevenzip.clone()),
    ]
}
