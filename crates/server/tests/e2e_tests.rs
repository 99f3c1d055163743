//! End-to-end tests through the in-process router.
//!
//! These tests exercise the full upload -> convert -> download flow using
//! the in-process backends only.

mod common;

use std::time::Duration;

use axum::http::{header, StatusCode};

use common::{fixtures, TestConfig, TestFixture};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["tracked_artifacts"], 0);
}

#[tokio::test]
async fn test_formats_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/formats").await;
    assert_status!(response, StatusCode::OK);

    let documents = response.body["document"].as_array().unwrap();
    assert!(documents.iter().any(|f| f == ".docx"));
    assert!(response.body["archive"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == ".tar.gz"));
    assert!(response.body.get("unknown").is_none());
}

#[tokio::test]
async fn test_capabilities_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/capabilities").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["ready"], false);
    assert_eq!(response.body["tools"]["ffmpeg"], false);
    assert_eq!(response.body["tools"]["document_builtin"], true);
    assert_eq!(response.body["paths"]["ffmpeg"], "ffmpeg");
    assert_eq!(response.body["paths"]["7z"], "7z");
    assert!(response.body["formats"]["document"]["outputs"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == ".md"));
}

#[tokio::test]
async fn test_config_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["lifecycle"]["expiry_secs"], 60);
    assert!(response.body["tools"]["ffmpeg"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    let raw = fixture.get_raw("/metrics").await;
    assert_eq!(raw.status, StatusCode::OK);
    let text = String::from_utf8(raw.bytes).unwrap();
    assert!(text.contains("transmute_artifacts_tracked"));
}

// =============================================================================
// Conversion Tests
// =============================================================================

#[tokio::test]
async fn test_convert_then_download() {
    let fixture = TestFixture::new().await;
    let docx = fixtures::docx_bytes("Report", &["First point", "Second point"]);

    let response = fixture.convert("report.docx", &docx, "md").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["originalName"], "report.docx");

    let converted = response.body["convertedName"].as_str().unwrap().to_string();
    assert!(converted.ends_with(".md"));
    assert_eq!(
        response.body["downloadUrl"],
        format!("/api/download/{}", converted)
    );
    assert_eq!(fixture.uploads_left(), 0);

    let stats = fixture.get("/api/cleanup/stats").await;
    assert_eq!(stats.body["tracked"], 1);
    assert_eq!(stats.body["oldest"], converted.as_str());

    let download = fixture
        .get_raw(&format!("/api/download/{}", converted))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(
        download.headers[header::CONTENT_TYPE],
        "text/markdown; charset=utf-8"
    );
    assert_eq!(
        download.headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}\"", converted).as_str()
    );
    assert_eq!(
        download.headers[header::CONTENT_LENGTH],
        download.bytes.len().to_string().as_str()
    );
    let markdown = String::from_utf8(download.bytes).unwrap();
    assert!(markdown.starts_with("# Report\n\nFirst point"));

    // One download only: the artifact is gone afterwards.
    assert!(!fixture.output_path(&converted).exists());
    let again = fixture.get(&format!("/api/download/{}", converted)).await;
    assert_status!(again, StatusCode::GONE);
    assert_eq!(again.body["code"], "DOWNLOAD_EXPIRED");
}

#[tokio::test]
async fn test_download_after_expiry_is_gone() {
    let fixture = TestFixture::with_config(TestConfig::with_expiry(Duration::from_millis(150))).await;

    let response = fixture.convert("notes.txt", b"Short lived", "html").await;
    assert_status!(response, StatusCode::OK);
    let converted = response.body["convertedName"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(400)).await;

    let download = fixture.get(&format!("/api/download/{}", converted)).await;
    assert_status!(download, StatusCode::GONE);
    assert_eq!(download.body["error"], "DOWNLOAD_EXPIRED");
    assert_eq!(download.body["code"], "DOWNLOAD_EXPIRED");
    assert!(download.body["message"].is_string());
    assert!(!fixture.output_path(&converted).exists());
}

#[tokio::test]
async fn test_download_of_missing_file_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture.convert("notes.txt", b"Vanishing", "md").await;
    let converted = response.body["convertedName"].as_str().unwrap().to_string();
    std::fs::remove_file(fixture.output_path(&converted)).unwrap();

    let download = fixture.get(&format!("/api/download/{}", converted)).await;
    assert_status!(download, StatusCode::NOT_FOUND);
    assert_eq!(download.body["error"], "FILE_NOT_FOUND");
}

#[tokio::test]
async fn test_download_of_untracked_file_is_gone() {
    let fixture = TestFixture::new().await;
    let path = fixture.output_path("planted.txt");
    std::fs::write(&path, "not converted here").unwrap();

    let download = fixture.get("/api/download/planted.txt").await;
    assert_status!(download, StatusCode::GONE);
    assert!(path.exists());
}

#[tokio::test]
async fn test_download_rejects_traversal() {
    let fixture = TestFixture::new().await;
    let download = fixture.get("/api/download/..%2Fsecret.txt").await;
    assert_status!(download, StatusCode::BAD_REQUEST);
    assert_eq!(download.body["error"], "INVALID_FILENAME");
}

#[tokio::test]
async fn test_unsupported_file_type() {
    let fixture = TestFixture::new().await;
    let response = fixture.convert("mystery.xyz", b"???", "md").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    let details = response.body["details"].as_str().unwrap();
    assert!(details.contains(".xyz"));
    assert_eq!(fixture.uploads_left(), 0);
}

#[tokio::test]
async fn test_unsupported_target_format() {
    let fixture = TestFixture::new().await;
    let response = fixture.convert("notes.txt", b"Hello", "mp4").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["details"].as_str().unwrap().contains(".mp4"));
}

#[tokio::test]
async fn test_missing_file() {
    let fixture = TestFixture::new().await;
    let response = fixture.convert_with_fields(None, &[("format", "md")]).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["details"], "No file uploaded");
}

#[tokio::test]
async fn test_missing_format() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .convert_with_fields(Some(("notes.txt", b"Hello")), &[])
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["details"], "No target format specified");
    assert_eq!(fixture.uploads_left(), 0);
}

#[tokio::test]
async fn test_upload_too_large() {
    let fixture = TestFixture::with_config(TestConfig {
        max_upload_bytes: 16,
        ..Default::default()
    })
    .await;
    let response = fixture
        .convert("big.txt", &[b'a'; 1024], "md")
        .await;
    assert_status!(response, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.body["error"], "FILE_TOO_LARGE");
    assert_eq!(fixture.uploads_left(), 0);
}

#[tokio::test]
async fn test_image_conversion_without_backends() {
    let fixture = TestFixture::with_config(TestConfig::without_backends()).await;
    let response = fixture
        .convert("photo.png", &fixtures::one_pixel_png(), "ico")
        .await;
    assert_status!(response, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["success"], false);
    let details = response.body["details"].as_str().unwrap();
    assert!(details.contains("No image backend available"));
    assert_eq!(fixture.uploads_left(), 0);
}

#[tokio::test]
async fn test_compress_single_file_into_zip() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .convert_with_fields(
            Some(("notes.txt", b"zip me")),
            &[("format", ".ZIP"), ("useCompression", "true")],
        )
        .await;
    assert_status!(response, StatusCode::OK);
    let converted = response.body["convertedName"].as_str().unwrap().to_string();
    assert!(converted.starts_with("notes-"));
    assert!(converted.ends_with(".zip"));

    let download = fixture
        .get_raw(&format!("/api/download/{}", converted))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.headers[header::CONTENT_TYPE], "application/zip");
    assert!(download.bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn test_concurrent_conversions() {
    let fixture = TestFixture::new().await;
    let (a, b) = tokio::join!(
        fixture.convert("a.csv", b"x,y\n1,2\n", "json"),
        fixture.convert("b.csv", b"x,y\n3,4\n", "tsv"),
    );
    assert_status!(a, StatusCode::OK);
    assert_status!(b, StatusCode::OK);
    assert_ne!(a.body["convertedName"], b.body["convertedName"]);

    let health = fixture.get("/api/health").await;
    assert_eq!(health.body["tracked_artifacts"], 2);
}
