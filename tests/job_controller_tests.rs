use pretty_assertions::assert_eq;
use replicate_form::{
    Error,
    form::{ControlValue, FormSnapshot},
    job::{StatusLevel, SubmissionController, SubmissionRequest, SubmissionState},
    relay::JobStatus,
    schema::{InterpretOptions, interpret_version},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

mod common;

use common::mocks::{MockPredictionApi, job, network_blip, succeeded};
use common::test_utils::{test_key, test_policy, text_to_image_version};

fn request(prompt: &str) -> SubmissionRequest {
    let fields = interpret_version(&text_to_image_version("v1"), &InterpretOptions::default()).unwrap();
    let mut form = FormSnapshot::default();
    form.values
        .insert("prompt".to_string(), ControlValue::Text(prompt.to_string()));
    SubmissionRequest {
        key: test_key(),
        version_id: "v1".to_string(),
        fields,
        form,
    }
}

fn controller(api: &Arc<MockPredictionApi>) -> SubmissionController {
    SubmissionController::new(api.clone(), test_policy())
}

#[tokio::test(start_paused = true)]
async fn test_polls_until_success() {
    let api = Arc::new(MockPredictionApi::new().with_polls(vec![
        Ok(job("pred-1", JobStatus::Starting)),
        Ok(job("pred-1", JobStatus::Processing)),
        Ok(succeeded(json!(["https://cdn/a.png", "https://cdn/b.png"]))),
    ]));

    let start = Instant::now();
    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Succeeded);
    assert_eq!(outcome.status.text, "Prediction succeeded!");
    assert_eq!(outcome.polls, 3);
    assert_eq!(outcome.presentation.unwrap().rendered_count(), 2);
    assert_eq!(api.create_count(), 1);
    // two pending polls, one interval each
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_missing_required_field_makes_no_calls() {
    let api = Arc::new(MockPredictionApi::new());
    let outcome = controller(&api).submit(request("   ")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Errored);
    assert_eq!(outcome.status.text, "Input Error: Missing required field: prompt");
    assert_eq!(outcome.status.level, StatusLevel::Error);
    assert_eq!(api.network_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_is_bounded() {
    let api = Arc::new(MockPredictionApi::new().with_polls(vec![Err(network_blip())]));

    let start = Instant::now();
    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Errored);
    assert_eq!(api.poll_count(), 4);
    assert_eq!(outcome.transient_failures, 4);
    assert_eq!(outcome.status.text, "Error: API error (502): Bad gateway");
    assert!(start.elapsed() >= Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_recover() {
    let api = Arc::new(MockPredictionApi::new().with_polls(vec![
        Err(network_blip()),
        Err(network_blip()),
        Ok(succeeded(json!("https://cdn/only.png"))),
    ]));

    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Succeeded);
    assert_eq!(outcome.transient_failures, 2);
    assert_eq!(outcome.polls, 3);
}

#[tokio::test(start_paused = true)]
async fn test_hung_status_request_times_out() {
    let api = Arc::new(
        MockPredictionApi::new()
            .with_polls(vec![Ok(succeeded(json!("https://cdn/late.png")))])
            .with_poll_delay(Duration::from_secs(60)),
    );

    let start = Instant::now();
    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Errored);
    assert_eq!(api.poll_count(), 4);
    assert!(outcome.status.text.contains("timed out after 10000ms"), "{}", outcome.status.text);
    // four timeouts and three backoffs, never the full mock delay
    assert!(start.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_reports_upstream_error() {
    let failed = replicate_form::relay::PredictionJob {
        error: Some(json!("NSFW content detected")),
        ..job("pred-1", JobStatus::Failed)
    };
    let api = Arc::new(MockPredictionApi::new().with_polls(vec![Ok(failed)]));

    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Failed);
    assert_eq!(outcome.status.text, "Prediction Failed: \"NSFW content detected\"");
    assert!(outcome.presentation.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_canceled_job_is_terminal() {
    let api = Arc::new(MockPredictionApi::new().with_polls(vec![Ok(job("pred-1", JobStatus::Canceled))]));

    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Failed);
    assert_eq!(outcome.status.text, "Prediction was canceled");
    assert_eq!(api.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_success_without_images_is_a_warning() {
    let api = Arc::new(MockPredictionApi::new().with_polls(vec![Ok(succeeded(json!({"text": "no images here"})))]));

    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Succeeded);
    assert_eq!(outcome.status.level, StatusLevel::Warning);
    assert!(outcome.presentation.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_creation_failure_is_not_retried() {
    let api = Arc::new(MockPredictionApi::new().with_create_error(Error::Api {
        status: 401,
        message: "Invalid token.".to_string(),
    }));

    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Errored);
    assert_eq!(
        outcome.status.text,
        "Error: Failed to create prediction: API error (401): Invalid token."
    );
    assert_eq!(api.create_count(), 1);
    assert_eq!(api.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_creation_outlasts_status_timeout() {
    let api = Arc::new(
        MockPredictionApi::new()
            .with_create_delay(Duration::from_secs(30))
            .with_polls(vec![Ok(succeeded(json!("https://cdn/slow.png")))]),
    );

    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Succeeded);
    assert_eq!(api.create_count(), 1);
    assert_eq!(api.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_creation_times_out_once() {
    let api = Arc::new(MockPredictionApi::new().with_create_delay(Duration::from_secs(600)));

    let start = Instant::now();
    let outcome = controller(&api).submit(request("a cat")).await.unwrap();

    assert_eq!(outcome.state, SubmissionState::Errored);
    assert_eq!(
        outcome.status.text,
        "Error: Failed to create prediction: Request timed out after 60000ms"
    );
    assert_eq!(api.create_count(), 1);
    assert_eq!(api.poll_count(), 0);
    assert!(start.elapsed() < Duration::from_secs(61));
}

#[tokio::test(start_paused = true)]
async fn test_blank_seed_is_randomized_in_payload() {
    let api = Arc::new(MockPredictionApi::new().with_polls(vec![Ok(succeeded(json!("https://cdn/x.png")))]));

    controller(&api).submit(request("a cat")).await.unwrap();

    let created = api.get_created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].version, "v1");
    let seed = created[0].input["seed"].as_i64().unwrap();
    assert!((0..1_000_000_000).contains(&seed));
    assert_eq!(created[0].input["aspect_ratio"], json!("1:1"));
    assert_eq!(created[0].input["num_outputs"], json!(1));
}

#[tokio::test(start_paused = true)]
async fn test_second_submission_refused_while_in_flight() {
    let api = Arc::new(
        MockPredictionApi::new()
            .with_polls(vec![
                Ok(job("pred-1", JobStatus::Processing)),
                Ok(succeeded(json!("https://cdn/x.png"))),
            ]),
    );
    let controller = Arc::new(controller(&api));

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.submit(request("a cat")).await })
    };
    while !controller.is_in_flight() {
        tokio::task::yield_now().await;
    }

    let second = controller.submit(request("a dog")).await;
    assert!(matches!(second, Err(Error::SubmissionInFlight)));

    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.succeeded());
    assert!(!controller.is_in_flight());
    assert_eq!(api.create_count(), 1);
}
