//! Integration tests for the resona server
//!
//! These tests verify the full request flow by hitting a live server.
//! They are marked with #[ignore] so they don't run in CI without a server
//! (and its slskd daemon) running.
//!
//! To run these tests:
//! 1. Start slskd and the backend: resona
//! 2. Run tests with: cargo test --test integration_tests -- --ignored

use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8000";

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_health_endpoint() -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client.get(format!("{}/health", BASE_URL)).send().await?;

    assert_eq!(response.status(), 200);

    let json: Value = response.json().await?;
    assert!(json.get("status").is_some());
    assert!(json.get("version").is_some());
    assert!(json.get("gateway_status").is_some());

    Ok(())
}

// =============================================================================
// Search Flow Tests
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_search_and_poll_results() -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/search/soulseek", BASE_URL))
        .json(&json!({"query": "test query"}))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    let token = body["search_token"]
        .as_u64()
        .expect("search should return a token when connected");

    // Poll until completion or a handful of attempts.
    for _ in 0..10 {
        let response = client
            .get(format!("{}/search/soulseek/results/{}", BASE_URL, token))
            .send()
            .await?;
        assert_eq!(response.status(), 200);

        let body: Value = response.json().await?;
        assert!(body["result_count"].as_u64().is_some());
        if body["is_complete"].as_bool() == Some(true) {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_unknown_token_returns_empty_incomplete() -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/search/soulseek/results/999999", BASE_URL))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(body["result_count"].as_u64(), Some(0));
    assert_eq!(body["is_complete"].as_bool(), Some(false));

    Ok(())
}

// =============================================================================
// Download Flow Tests
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_download_status_for_unknown_transfer() -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/download-status/ghost/nothing.mp3", BASE_URL))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert_eq!(body["status"].as_str(), Some("Not started"));
    assert_eq!(body["percent"].as_f64(), Some(0.0));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_downloads_listing_shape() -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/downloads/status", BASE_URL))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await?;
    assert!(body["downloads"].is_array());
    assert_eq!(body["system_status"]["backend_status"].as_str(), Some("Online"));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_cancel_rejects_malformed_id() -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/download/cancel/not-a-valid-id", BASE_URL))
        .send()
        .await?;
    assert_eq!(response.status(), 400);

    Ok(())
}
