use async_trait::async_trait;
use replicate_form::{
    Error, Result,
    relay::{ApiKey, CreatePredictionRequest, JobStatus, PredictionApi, PredictionJob},
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock Replicate API for testing.
///
/// Poll responses are consumed in order; the last one keeps being returned.
#[derive(Debug, Default)]
pub struct MockPredictionApi {
    pub create_response: Arc<Mutex<Option<Result<PredictionJob>>>>,
    pub poll_responses: Arc<Mutex<VecDeque<Result<PredictionJob>>>>,
    pub poll_delay: Option<Duration>,
    pub create_delay: Option<Duration>,
    pub model_delay: Option<Duration>,
    pub models: Arc<Mutex<HashMap<String, Value>>>,
    pub versions: Arc<Mutex<HashMap<String, Value>>>,
    pub created: Arc<Mutex<Vec<CreatePredictionRequest>>>,
    pub keys_seen: Arc<Mutex<Vec<String>>>,
    pub create_calls: Arc<AtomicUsize>,
    pub poll_calls: Arc<AtomicUsize>,
    pub model_calls: Arc<AtomicUsize>,
    pub version_calls: Arc<AtomicUsize>,
}

impl MockPredictionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_created(self, job: PredictionJob) -> Self {
        *self.create_response.lock().unwrap() = Some(Ok(job));
        self
    }

    pub fn with_create_error(self, error: Error) -> Self {
        *self.create_response.lock().unwrap() = Some(Err(error));
        self
    }

    pub fn with_polls(self, responses: Vec<Result<PredictionJob>>) -> Self {
        *self.poll_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Delays both model and version lookups.
    pub fn with_model_delay(mut self, delay: Duration) -> Self {
        self.model_delay = Some(delay);
        self
    }

    /// Registers `owner/name` with a latest version and its schema document.
    pub fn with_model(self, identifier: &str, version_id: &str, version: Value) -> Self {
        self.models.lock().unwrap().insert(
            identifier.to_string(),
            serde_json::json!({ "latest_version": { "id": version_id } }),
        );
        self.versions
            .lock()
            .unwrap()
            .insert(version_id.to_string(), version);
        self
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn model_count(&self) -> usize {
        self.model_calls.load(Ordering::SeqCst)
    }

    pub fn network_count(&self) -> usize {
        self.create_count() + self.poll_count() + self.model_count() + self.version_calls.load(Ordering::SeqCst)
    }

    pub fn get_created(&self) -> Vec<CreatePredictionRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PredictionApi for MockPredictionApi {
    async fn create_prediction(
        &self,
        key: &ApiKey,
        request: &CreatePredictionRequest,
    ) -> Result<PredictionJob> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.keys_seen.lock().unwrap().push(key.expose().to_string());
        self.created.lock().unwrap().push(request.clone());
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        self.create_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(job("pred-1", JobStatus::Starting)))
    }

    async fn get_prediction(&self, _key: &ApiKey, _id: &str) -> Result<PredictionJob> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.poll_responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        next.unwrap_or_else(|| Err(Error::internal("No more mock responses available")))
    }

    async fn get_model(&self, _key: &ApiKey, owner: &str, name: &str) -> Result<Value> {
        self.model_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.model_delay {
            tokio::time::sleep(delay).await;
        }
        let identifier = format!("{}/{}", owner, name);
        self.models
            .lock()
            .unwrap()
            .get(&identifier)
            .cloned()
            .ok_or(Error::Api {
                status: 404,
                message: "Not found.".to_string(),
            })
    }

    async fn get_model_version(
        &self,
        _key: &ApiKey,
        _owner: &str,
        _name: &str,
        version_id: &str,
    ) -> Result<Value> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.model_delay {
            tokio::time::sleep(delay).await;
        }
        self.versions
            .lock()
            .unwrap()
            .get(version_id)
            .cloned()
            .ok_or(Error::Api {
                status: 404,
                message: "Not found.".to_string(),
            })
    }
}

pub fn job(id: &str, status: JobStatus) -> PredictionJob {
    PredictionJob {
        id: id.to_string(),
        status,
        output: None,
        error: None,
        logs: None,
        created_at: None,
        completed_at: None,
    }
}

pub fn succeeded(output: Value) -> PredictionJob {
    PredictionJob {
        output: Some(output),
        ..job("pred-1", JobStatus::Succeeded)
    }
}

pub fn network_blip() -> Error {
    Error::Api {
        status: 502,
        message: "Bad gateway".to_string(),
    }
}
