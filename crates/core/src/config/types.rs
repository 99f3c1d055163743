use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    3000
}

/// Where uploads and converted artifacts live, and how big an upload may be.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("converted")
}

fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

/// Artifact expiry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Seconds a converted file stays downloadable.
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            expiry_secs: default_expiry_secs(),
        }
    }
}

fn default_expiry_secs() -> u64 {
    300
}

/// External tool locations and invocation limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
    #[serde(default = "default_magick")]
    pub magick: PathBuf,
    /// Legacy ImageMagick 6 entry point.
    #[serde(default = "default_convert")]
    pub convert: PathBuf,
    #[serde(default = "default_libreoffice")]
    pub libreoffice: PathBuf,
    #[serde(default = "default_soffice")]
    pub soffice: PathBuf,
    #[serde(default = "default_pandoc")]
    pub pandoc: PathBuf,
    /// Gnumeric command line converter.
    #[serde(default = "default_ssconvert")]
    pub ssconvert: PathBuf,
    #[serde(default = "default_sevenzip")]
    pub sevenzip: PathBuf,
    /// Timeout for a single backend invocation in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            magick: default_magick(),
            convert: default_convert(),
            libreoffice: default_libreoffice(),
            soffice: default_soffice(),
            pandoc: default_pandoc(),
            ssconvert: default_ssconvert(),
            sevenzip: default_sevenzip(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_magick() -> PathBuf {
    PathBuf::from("magick")
}

fn default_convert() -> PathBuf {
    PathBuf::from("convert")
}

fn default_libreoffice() -> PathBuf {
    PathBuf::from("libreoffice")
}

fn default_soffice() -> PathBuf {
    PathBuf::from("soffice")
}

fn default_pandoc() -> PathBuf {
    PathBuf::from("pandoc")
}

fn default_ssconvert() -> PathBuf {
    PathBuf::from("ssconvert")
}

fn default_sevenzip() -> PathBuf {
    PathBuf::from("7z")
}

fn default_timeout_secs() -> u64 {
    600
}
