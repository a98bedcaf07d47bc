mod client;
mod types;

pub use client::{PredictionApi, RelayClient};
pub use types::{
    API_KEY_PREFIX, ApiKey, CreatePredictionRequest, JobStatus, ModelReference, PredictionJob,
};
