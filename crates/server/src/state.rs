use std::sync::Arc;
use std::time::Duration;
use transmute_core::{
    ArtifactLifecycleManager, CapabilityProbe, Config, ConversionDispatcher, ConverterRegistry,
};

/// Shared application state
pub struct AppState {
    config: Config,
    dispatcher: ConversionDispatcher,
}

impl AppState {
    pub fn new(config: Config, dispatcher: ConversionDispatcher) -> Self {
        Self { config, dispatcher }
    }

    /// Builds the standard converter chains and artifact registry for `config`.
    pub fn from_config(config: Config, probe: Arc<CapabilityProbe>) -> Self {
        let lifecycle = ArtifactLifecycleManager::new(
            config.storage.upload_dir.clone(),
            config.storage.output_dir.clone(),
            Duration::from_secs(config.lifecycle.expiry_secs),
        );
        let registry = ConverterRegistry::new(&config.tools);
        let dispatcher = ConversionDispatcher::new(registry, probe, lifecycle);
        Self::new(config, dispatcher)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &ConversionDispatcher {
        &self.dispatcher
    }

    pub fn lifecycle(&self) -> &ArtifactLifecycleManager {
        self.dispatcher.lifecycle()
    }

    pub fn probe(&self) -> &Arc<CapabilityProbe> {
        self.dispatcher.probe()
    }
}
