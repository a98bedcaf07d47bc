use super::fsm::SubmissionState;
use crate::{
    config::PollingConfig,
    form::FormSnapshot,
    output::Presentation,
    relay::{ApiKey, PredictionJob},
    schema::FieldDescriptor,
};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Fixed polling cadence and retry budget for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub retry_backoff: Duration,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub create_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            retry_backoff: config.retry_backoff(),
            max_retries: config.max_retries,
            request_timeout: config.request_timeout(),
            create_timeout: config.create_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// The single line of user-facing status text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusLine {
    pub text: String,
    pub level: StatusLevel,
}

impl StatusLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: StatusLevel::Info,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: StatusLevel::Warning,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: StatusLevel::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == StatusLevel::Error
    }
}

/// Everything one submission needs, detached from the session.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub key: ApiKey,
    pub version_id: String,
    pub fields: Vec<FieldDescriptor>,
    pub form: FormSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub submission_id: Uuid,
    pub state: SubmissionState,
    pub status: StatusLine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<PredictionJob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation: Option<Presentation>,
    pub polls: u32,
    pub transient_failures: u32,
}
