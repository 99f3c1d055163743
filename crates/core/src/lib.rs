pub mod classifier;
pub mod config;
pub mod converter;
pub mod dispatcher;
pub mod format;
pub mod lifecycle;
pub mod metrics;
pub mod testing;
pub mod upload;

pub use classifier::{content_type_for, Category, FileClassifier};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, LifecycleConfig, ServerConfig, StorageConfig, ToolsConfig,
};
pub use converter::{
    CapabilityProbe, ConversionJob, ConversionOptions, Converter, ConverterError,
    ConverterRegistry, Quality, SupportedFormats, ToolCapabilities,
};
pub use dispatcher::{ConversionDispatcher, ConversionResult, ConvertedArtifact, DispatchError};
pub use format::Format;
pub use lifecycle::{ArtifactLifecycleManager, LifecycleStats};
pub use upload::{sanitize_filename, UploadedFile};
