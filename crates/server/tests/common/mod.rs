//! Common test utilities for E2E testing.
//!
//! This module provides a test fixture that creates an in-process server
//! over temporary storage directories, with a fixed capability set so no
//! test depends on external tools being installed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use transmute_core::{
    ArtifactLifecycleManager, CapabilityProbe, Config, ConversionDispatcher, ConverterRegistry,
    LifecycleConfig, ServerConfig, StorageConfig, ToolCapabilities, ToolsConfig,
};
use transmute_server::state::AppState;

/// Re-export fixtures for test convenience
pub use transmute_core::testing::fixtures;

const BOUNDARY: &str = "transmute-test-boundary";

/// Test fixture for E2E testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_convert() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.convert("notes.txt", b"Hello", "md").await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Artifact registry shared with the router
    pub lifecycle: ArtifactLifecycleManager,
    /// Temporary directory holding uploads and converted files
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Raw response, for downloads
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            storage: StorageConfig {
                upload_dir: temp_dir.path().join("uploads"),
                output_dir: temp_dir.path().join("converted"),
                max_upload_bytes: test_config.max_upload_bytes,
            },
            lifecycle: LifecycleConfig {
                expiry_secs: test_config.expiry.as_secs().max(1),
            },
            tools: ToolsConfig::default(),
        };

        let lifecycle = ArtifactLifecycleManager::new(
            config.storage.upload_dir.clone(),
            config.storage.output_dir.clone(),
            test_config.expiry,
        );
        lifecycle
            .clear_on_startup()
            .await
            .expect("Failed to prepare storage");

        let dispatcher = ConversionDispatcher::new(
            ConverterRegistry::new(&config.tools),
            Arc::new(CapabilityProbe::fixed(test_config.capabilities)),
            lifecycle.clone(),
        );
        let state = Arc::new(AppState::new(config, dispatcher));

        // Create router
        let router = transmute_server::api::create_router(state);

        Self {
            router,
            lifecycle,
            temp_dir,
        }
    }

    /// Send a GET request and parse a JSON body.
    pub async fn get(&self, path: &str) -> TestResponse {
        let raw = self.get_raw(path).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.bytes),
        }
    }

    /// Send a GET request and keep the raw body.
    pub async fn get_raw(&self, path: &str) -> RawResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Upload `bytes` as `filename` and request conversion to `format`.
    pub async fn convert(&self, filename: &str, bytes: &[u8], format: &str) -> TestResponse {
        self.convert_with_fields(Some((filename, bytes)), &[("format", format)])
            .await
    }

    /// Send a multipart conversion request with an optional file part and
    /// arbitrary text fields.
    pub async fn convert_with_fields(
        &self,
        file: Option<(&str, &[u8])>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let body = multipart_body(file, fields);
        let request = Request::builder()
            .method("POST")
            .uri("/api/convert")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        let raw = self.send(request).await;
        TestResponse {
            status: raw.status,
            body: parse_json(&raw.bytes),
        }
    }

    /// Number of files currently in the upload directory.
    pub fn uploads_left(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path().join("uploads"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Path of a converted artifact.
    pub fn output_path(&self, name: &str) -> std::path::PathBuf {
        self.lifecycle.path_for(name)
    }

    async fn send(&self, request: Request<Body>) -> RawResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        RawResponse {
            status,
            headers,
            bytes,
        }
    }
}

fn parse_json(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
    }
}

/// Builds a `multipart/form-data` body by hand.
fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// How long converted files stay downloadable
    pub expiry: Duration,
    /// Upload size limit in bytes
    pub max_upload_bytes: u64,
    /// Capability set seen by the converters
    pub capabilities: ToolCapabilities,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(60),
            max_upload_bytes: 10 * 1024 * 1024,
            capabilities: ToolCapabilities::builtin_only(),
        }
    }
}

impl TestConfig {
    /// Create config with a short expiry window.
    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            expiry,
            ..Default::default()
        }
    }

    /// Create config with no backends at all.
    pub fn without_backends() -> Self {
        Self {
            capabilities: ToolCapabilities::none(),
            ..Default::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
