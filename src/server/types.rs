use crate::{
    config::ModelCategory,
    form::{Widget, upload::UploadSummary},
    job::SubmissionOutcome,
    relay::ModelReference,
    schema::FieldDescriptor,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub categories: Vec<ModelCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub api_key: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub accepted: bool,
    pub remembered: bool,
}

#[derive(Debug, Deserialize)]
pub struct SelectModelRequest {
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct FormResponse {
    pub model: ModelReference,
    pub details_url: String,
    pub fields: Vec<FieldDescriptor>,
    pub widgets: Vec<Widget>,
    pub html: String,
}

#[derive(Debug, Deserialize)]
pub struct FieldValueRequest {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct FieldResponse {
    pub field: String,
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub data_uri: String,
    #[serde(default)]
    pub display_width: Option<f32>,
    #[serde(default)]
    pub display_height: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub field: String,
    pub file: UploadSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<MaskResponse>,
}

#[derive(Debug, Deserialize)]
pub struct StrokeRequest {
    /// Display-space pointer positions, `[x, y]`.
    pub points: Vec<[f32; 2]>,
    #[serde(default)]
    pub brush_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MaskResponse {
    pub width: u32,
    pub height: u32,
    pub brush_size: u32,
    pub history_len: usize,
    pub blank: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undone: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_html: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
