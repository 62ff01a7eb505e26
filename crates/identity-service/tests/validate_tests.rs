//! Integration tests for the validate endpoint
//!
//! Each test spawns a real identity service wired to an in-memory auth
//! events channel and checks both the HTTP answer and what was published.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use auth_test_utils::{
    MemoryChannel, TestCredentialBuilder, TestIdentityServer, FOREIGN_SECRET,
};
use reqwest::StatusCode;
use std::time::Duration;

async fn validate(
    server: &TestIdentityServer,
    body: serde_json::Value,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(reqwest::Client::new()
        .post(format!("{}/v1/auth/validate", server.url()))
        .json(&body)
        .send()
        .await?)
}

// ============================================================================
// Valid credentials
// ============================================================================

/// A valid credential returns its subject and publishes exactly one event.
#[tokio::test]
async fn test_valid_credential_publishes_one_event() -> Result<(), anyhow::Error> {
    // Arrange
    let channel = MemoryChannel::new();
    let server = TestIdentityServer::spawn(channel.clone()).await?;
    let token = TestCredentialBuilder::for_subject("U1").build();

    // Act
    let response = validate(&server, serde_json::json!({ "token": token })).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body, serde_json::json!({ "subject_id": "U1" }));

    assert!(server.validation().drain(Duration::from_secs(1)).await);
    let events = channel.published_events();
    assert_eq!(events.len(), 1, "exactly one event per successful validation");
    assert_eq!(events[0].subject_id, "U1");
    assert_eq!(events[0].event.as_str(), "token_validated");

    Ok(())
}

/// Validating the same credential twice publishes twice; the consumer
/// side handles the duplicate.
#[tokio::test]
async fn test_repeat_validation_publishes_each_time() -> Result<(), anyhow::Error> {
    let channel = MemoryChannel::new();
    let server = TestIdentityServer::spawn(channel.clone()).await?;
    let token = TestCredentialBuilder::for_subject("U1").build();

    for _ in 0..2 {
        let response = validate(&server, serde_json::json!({ "token": token })).await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert!(server.validation().drain(Duration::from_secs(1)).await);
    assert_eq!(channel.published_events().len(), 2);

    Ok(())
}

/// A broker outage does not change the validation answer.
#[tokio::test]
async fn test_channel_outage_still_validates() -> Result<(), anyhow::Error> {
    let channel = MemoryChannel::new();
    channel.set_unavailable(true);
    let server = TestIdentityServer::spawn(channel.clone()).await?;
    let token = TestCredentialBuilder::for_subject("U1").build();

    let response = validate(&server, serde_json::json!({ "token": token })).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.validation().drain(Duration::from_secs(1)).await);
    assert!(channel.published_events().is_empty());

    Ok(())
}

// ============================================================================
// Rejections
// ============================================================================

/// Each rejection reason is reported with its code and publishes nothing.
#[tokio::test]
async fn test_rejections_report_reason_and_publish_nothing() -> Result<(), anyhow::Error> {
    let channel = MemoryChannel::new();
    let server = TestIdentityServer::spawn(channel.clone()).await?;

    let expired = TestCredentialBuilder::for_subject("U1")
        .issued_at(chrono::Utc::now().timestamp() - 7200)
        .expires_in(-3600)
        .build();
    let forged = TestCredentialBuilder::for_subject("U1")
        .signed_with(FOREIGN_SECRET)
        .build();

    let cases = [
        (expired, "CREDENTIAL_EXPIRED"),
        (forged, "SIGNATURE_INVALID"),
        ("not-a-credential".to_string(), "CREDENTIAL_MALFORMED"),
    ];

    for (token, expected_code) in cases {
        let response = validate(&server, serde_json::json!({ "token": token })).await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{expected_code}");
        assert!(response.headers().contains_key("www-authenticate"));
        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["error"]["code"], expected_code);
    }

    assert!(server.validation().drain(Duration::from_secs(1)).await);
    assert!(channel.published_events().is_empty());

    Ok(())
}

/// A request without a credential is a bad request, not an auth failure.
#[tokio::test]
async fn test_missing_token_is_bad_request() -> Result<(), anyhow::Error> {
    let channel = MemoryChannel::new();
    let server = TestIdentityServer::spawn(channel.clone()).await?;

    for body in [serde_json::json!({}), serde_json::json!({ "token": "" })] {
        let response = validate(&server, body).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["error"]["code"], "TOKEN_MISSING");
    }

    assert!(channel.published_events().is_empty());

    Ok(())
}
