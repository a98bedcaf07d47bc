use pretty_assertions::assert_eq;
use replicate_form::{
    Error,
    config::ReplicateConfig,
    relay::{CreatePredictionRequest, JobStatus, PredictionApi, RelayClient},
};
use serde_json::{Map, json};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

use common::test_utils::{TEST_KEY, test_key};

fn relayed(server: &MockServer) -> RelayClient {
    RelayClient::new(&ReplicateConfig {
        relay_url: Some(format!("{}/proxy.php", server.uri())),
        api_base: "https://unused.invalid".to_string(),
    })
}

fn direct(server: &MockServer) -> RelayClient {
    RelayClient::new(&ReplicateConfig {
        relay_url: None,
        api_base: format!("{}/v1", server.uri()),
    })
}

#[test_log::test(tokio::test)]
async fn test_create_through_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/proxy.php"))
        .and(query_param("endpoint", "predictions"))
        .and(header("X-API-Key", TEST_KEY))
        .and(body_partial_json(json!({"version": "v1", "input": {"prompt": "a cat"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "pred-42",
            "status": "starting",
            "created_at": "2024-05-01T12:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut input = Map::new();
    input.insert("prompt".to_string(), json!("a cat"));
    let job = relayed(&server)
        .create_prediction(
            &test_key(),
            &CreatePredictionRequest {
                version: "v1".to_string(),
                input,
            },
        )
        .await
        .unwrap();

    assert_eq!(job.id, "pred-42");
    assert_eq!(job.status, JobStatus::Starting);
    assert!(job.created_at.is_some());
}

#[tokio::test]
async fn test_poll_directly_with_token_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/predictions/pred-42"))
        .and(header("Authorization", format!("Token {}", TEST_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pred-42",
            "status": "succeeded",
            "output": ["https://cdn/a.png"],
            "logs": "done"
        })))
        .mount(&server)
        .await;

    let job = direct(&server)
        .get_prediction(&test_key(), "pred-42")
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.output, Some(json!(["https://cdn/a.png"])));
}

#[tokio::test]
async fn test_unknown_status_still_parses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proxy.php"))
        .and(query_param("endpoint", "predictions/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p1", "status": "queued"})))
        .mount(&server)
        .await;

    let job = relayed(&server).get_prediction(&test_key(), "p1").await.unwrap();
    assert_eq!(job.status, JobStatus::Unknown);
    assert!(!job.status.is_terminal());
}

#[tokio::test]
async fn test_relay_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/proxy.php"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "cURL error: Could not resolve host",
            "debug": {"endpoint": "models/a/b"}
        })))
        .mount(&server)
        .await;

    let err = relayed(&server)
        .get_model(&test_key(), "a", "b")
        .await
        .unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "cURL error: Could not resolve host");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_model_version_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models/stability-ai/sdxl/versions/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "abc123", "openapi_schema": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let version = direct(&server)
        .get_model_version(&test_key(), "stability-ai", "sdxl", "abc123")
        .await
        .unwrap();
    assert_eq!(version["id"], json!("abc123"));
}

#[tokio::test]
async fn test_slow_upstream_hits_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models/a/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"latest_version": {"id": "v1"}}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = direct(&server).with_timeouts(Duration::from_millis(200), Duration::from_secs(30));
    let err = client.get_model(&test_key(), "a", "b").await.unwrap_err();

    match err {
        Error::Network(e) => assert!(e.is_timeout(), "{}", e),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_creation_uses_longer_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "pred-7", "status": "starting"}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = direct(&server).with_timeouts(Duration::from_millis(100), Duration::from_secs(10));
    let job = client
        .create_prediction(
            &test_key(),
            &CreatePredictionRequest {
                version: "v1".to_string(),
                input: Map::new(),
            },
        )
        .await
        .unwrap();
    assert_eq!(job.id, "pred-7");
}
