mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    create_test_app_state, enroll_form, jpeg_bytes, recognize_form, spawn_server, test_config,
    FailingExtractor, SlowExtractor, TestClient,
};
use tempfile::TempDir;

#[tokio::test]
async fn failed_extraction_leaves_both_stores_untouched() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path().to_path_buf());
    let state = create_test_app_state(&tmp, cfg, Arc::new(FailingExtractor));
    let port = spawn_server(state).await;
    let client = TestClient::new(port);

    let resp = client
        .post_form("/registrar", enroll_form("alice", jpeg_bytes(), "alice.jpg"))
        .await;
    assert_eq!(resp.status(), 422);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("extraction failed"));

    // extraction runs before any write: no gallery row, no orphaned image
    let resp = client.get("/usuarios").await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["usuarios"], serde_json::json!([]));
    assert!(!tmp.path().join("uploads").join("alice.jpg").exists());
}

#[tokio::test]
async fn failed_extraction_on_reconocer_is_a_typed_notice() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path().to_path_buf());
    let state = create_test_app_state(&tmp, cfg, Arc::new(FailingExtractor));
    let port = spawn_server(state).await;
    let client = TestClient::new(port);

    let resp = client
        .post_form("/reconocer", recognize_form(jpeg_bytes(), "probe.jpg"))
        .await;
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn slow_extractor_trips_the_deadline() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = test_config(tmp.path().to_path_buf());
    cfg.extract_timeout = Duration::from_millis(50);
    let state = create_test_app_state(
        &tmp,
        cfg,
        Arc::new(SlowExtractor {
            delay: Duration::from_secs(5),
        }),
    );
    let port = spawn_server(state).await;
    let client = TestClient::new(port);

    let resp = client
        .post_form("/reconocer", recognize_form(jpeg_bytes(), "probe.jpg"))
        .await;
    assert_eq!(resp.status(), 504);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn non_multipart_post_is_a_validation_error() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(tmp.path().to_path_buf());
    let state = create_test_app_state(&tmp, cfg, Arc::new(FailingExtractor));
    let port = spawn_server(state).await;
    let client = TestClient::new(port);

    let resp = client.post_empty("/registrar").await;
    assert!(resp.status().is_client_error());
}
