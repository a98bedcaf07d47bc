use super::types::{ApiKey, CreatePredictionRequest, PredictionJob};
use crate::{Error, Result, config::ReplicateConfig};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_ERROR_BODY: usize = 512;

/// The upstream operations the form needs.
#[async_trait]
pub trait PredictionApi: Send + Sync {
    async fn create_prediction(
        &self,
        key: &ApiKey,
        request: &CreatePredictionRequest,
    ) -> Result<PredictionJob>;

    async fn get_prediction(&self, key: &ApiKey, id: &str) -> Result<PredictionJob>;

    /// `GET models/{owner}/{name}`
    async fn get_model(&self, key: &ApiKey, owner: &str, name: &str) -> Result<Value>;

    /// `GET models/{owner}/{name}/versions/{id}`
    async fn get_model_version(
        &self,
        key: &ApiKey,
        owner: &str,
        name: &str,
        version_id: &str,
    ) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Relay { url: String },
    Direct { api_base: String },
}

/// Talks to Replicate either through the relay or straight to the API.
pub struct RelayClient {
    http: reqwest::Client,
    target: Target,
    request_timeout: Option<Duration>,
    create_timeout: Option<Duration>,
}

impl RelayClient {
    pub fn new(config: &ReplicateConfig) -> Self {
        let target = match config
            .relay_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        {
            Some(url) => Target::Relay {
                url: url.to_string(),
            },
            None => Target::Direct {
                api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            },
        };

        Self {
            http: reqwest::Client::new(),
            target,
            request_timeout: None,
            create_timeout: None,
        }
    }

    /// Every call gets `request`, except prediction creation which gets
    /// `create`. A call past its deadline fails as a network error.
    pub fn with_timeouts(mut self, request: Duration, create: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(request.max(create))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to a default HTTP client: {}", e);
                reqwest::Client::new()
            });
        self.request_timeout = Some(request);
        self.create_timeout = Some(create);
        self
    }

    pub fn is_relayed(&self) -> bool {
        matches!(self.target, Target::Relay { .. })
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        key: &ApiKey,
        body: Option<&Value>,
    ) -> Result<Value> {
        let endpoint = endpoint.trim_start_matches('/');
        debug!("{} {} (relayed: {})", method, endpoint, self.is_relayed());

        let deadline = if method == Method::POST {
            self.create_timeout
        } else {
            self.request_timeout
        };

        let mut req_builder = match &self.target {
            Target::Relay { url } => self
                .http
                .request(method, url)
                .query(&[("endpoint", endpoint)])
                .header("X-API-Key", key.expose()),
            Target::Direct { api_base } => self
                .http
                .request(method, format!("{}/{}", api_base, endpoint))
                .header("Authorization", format!("Token {}", key.expose())),
        };

        if let Some(deadline) = deadline {
            req_builder = req_builder.timeout(deadline);
        }

        if let Some(body) = body {
            req_builder = req_builder.json(body);
        }

        let response = req_builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl PredictionApi for RelayClient {
    async fn create_prediction(
        &self,
        key: &ApiKey,
        request: &CreatePredictionRequest,
    ) -> Result<PredictionJob> {
        let body = serde_json::to_value(request)?;
        let value = self.send(Method::POST, "predictions", key, Some(&body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get_prediction(&self, key: &ApiKey, id: &str) -> Result<PredictionJob> {
        let value = self
            .send(Method::GET, &format!("predictions/{}", id), key, None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get_model(&self, key: &ApiKey, owner: &str, name: &str) -> Result<Value> {
        self.send(Method::GET, &format!("models/{}/{}", owner, name), key, None)
            .await
    }

    async fn get_model_version(
        &self,
        key: &ApiKey,
        owner: &str,
        name: &str,
        version_id: &str,
    ) -> Result<Value> {
        self.send(
            Method::GET,
            &format!("models/{}/{}/versions/{}", owner, name, version_id),
            key,
            None,
        )
        .await
    }
}

/// Relay errors come as `{error, debug}`, upstream ones as `{detail}` or `{title, detail}`.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return error.to_string();
        }
        if let Some(detail) = value.get("detail") {
            return match detail {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
        }
        return truncate(&value.to_string());
    }
    truncate(body.trim())
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_ERROR_BODY).collect();
    out.push_str("...");
    out
}
