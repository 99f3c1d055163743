//! Mock conversion backend for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::converter::{Backend, ConversionJob, ConverterError, ToolCapabilities};

/// Shared record of which backends were attempted, in order.
#[derive(Debug, Clone, Default)]
pub struct AttemptLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl AttemptLog {
    pub fn record(&self, name: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(name.to_string());
        }
    }

    /// Backend names in attempt order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    /// Write the output file and succeed.
    Succeed,
    /// Return a tool failure.
    Fail,
    /// Succeed without writing anything.
    Silent,
    /// Succeed after writing a zero-byte output.
    Empty,
}

/// Mock implementation of the Backend trait.
///
/// Provides controllable behavior for testing:
/// - Scripted success or failure
/// - Availability tied to either an external tool or a built-in library
/// - Attempt order recording across several mocks
/// - Simulated work duration
#[derive(Debug, Clone)]
pub struct MockBackend {
    name: String,
    inputs: Vec<&'static str>,
    outputs: Vec<&'static str>,
    behavior: Behavior,
    requires_tool: bool,
    delay: Option<Duration>,
    log: Option<AttemptLog>,
}

impl MockBackend {
    fn new(
        name: &str,
        inputs: &[&'static str],
        outputs: &[&'static str],
        behavior: Behavior,
    ) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
            behavior,
            requires_tool: false,
            delay: None,
            log: None,
        }
    }

    pub fn succeeding(name: &str, inputs: &[&'static str], outputs: &[&'static str]) -> Self {
        Self::new(name, inputs, outputs, Behavior::Succeed)
    }

    pub fn failing(name: &str, inputs: &[&'static str], outputs: &[&'static str]) -> Self {
        Self::new(name, inputs, outputs, Behavior::Fail)
    }

    /// Reports success but never writes the output.
    pub fn silent(name: &str, inputs: &[&'static str], outputs: &[&'static str]) -> Self {
        Self::new(name, inputs, outputs, Behavior::Silent)
    }

    /// Reports success but leaves a zero-byte output.
    pub fn empty(name: &str, inputs: &[&'static str], outputs: &[&'static str]) -> Self {
        Self::new(name, inputs, outputs, Behavior::Empty)
    }

    /// Makes availability depend on `ffmpeg` being detected instead of the
    /// in-process image library.
    pub fn requiring_tool(mut self) -> Self {
        self.requires_tool = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_log(mut self, log: &AttemptLog) -> Self {
        self.log = Some(log.clone());
        self
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self, capabilities: &ToolCapabilities) -> bool {
        if self.requires_tool {
            capabilities.ffmpeg
        } else {
            capabilities.image_library
        }
    }

    fn input_formats(&self) -> &[&'static str] {
        &self.inputs
    }

    fn output_formats(&self) -> &[&'static str] {
        &self.outputs
    }

    async fn attempt(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        if let Some(log) = &self.log {
            log.record(&self.name);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            Behavior::Succeed => {
                tokio::fs::write(&job.output_path, format!("converted by {}", self.name)).await?;
                Ok(())
            }
            Behavior::Fail => Err(ConverterError::tool_failed(
                self.name.clone(),
                Some(1),
                Some("mock failure".to_string()),
            )),
            Behavior::Silent => Ok(()),
            Behavior::Empty => {
                tokio::fs::write(&job.output_path, b"").await?;
                Ok(())
            }
        }
    }
}
