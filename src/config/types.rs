use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub replicate: ReplicateConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default = "default_models")]
    pub models: Vec<ModelCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateConfig {
    /// When set, every call goes through the relay as `<relay_url>?endpoint=<path>`.
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Creation is not retried, so it gets a longer bound than status checks.
    #[serde(default = "default_create_timeout_ms")]
    pub create_timeout_ms: u64,
    /// Probe every output URL before reporting it as displayable.
    #[serde(default)]
    pub verify_outputs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_store_path")]
    pub store_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCategory {
    pub category: String,
    pub models: Vec<String>,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_millis(self.create_timeout_ms)
    }
}

impl Config {
    pub fn knows_model(&self, identifier: &str) -> bool {
        self.models
            .iter()
            .any(|category| category.models.iter().any(|m| m == identifier))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            replicate: ReplicateConfig::default(),
            polling: PollingConfig::default(),
            uploads: UploadsConfig::default(),
            credentials: CredentialsConfig::default(),
            models: default_models(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logs: LogsConfig::default(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            api_base: default_api_base(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_retries: default_max_retries(),
            request_timeout_ms: default_request_timeout_ms(),
            create_timeout_ms: default_create_timeout_ms(),
            verify_outputs: false,
        }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_base() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_interval_ms() -> u64 {
    2_000
}

fn default_retry_backoff_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_create_timeout_ms() -> u64 {
    60_000
}

fn default_max_size_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_store_path() -> String {
    ".replicate-credential".to_string()
}

fn category(name: &str, models: &[&str]) -> ModelCategory {
    ModelCategory {
        category: name.to_string(),
        models: models.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn default_models() -> Vec<ModelCategory> {
    vec![
        category(
            "text2image",
            &[
                "black-forest-labs/flux-1.1-pro-ultra",
                "black-forest-labs/flux-1.1-pro",
                "black-forest-labs/flux-dev",
                "black-forest-labs/flux-schnell",
                "black-forest-labs/flux-dev-lora",
                "bytedance/flux-pulid",
                "stability-ai/stable-diffusion-3.5-large",
                "stability-ai/stable-diffusion-3.5-large-turbo",
                "stability-ai/stable-diffusion-3.5-medium",
                "stability-ai/stable-diffusion-3",
                "stability-ai/sdxl",
                "ideogram-ai/ideogram-v2a",
                "ideogram-ai/ideogram-v2a-turbo",
                "google/imagen-3",
                "google/imagen-3-fast",
                "recraft-ai/recraft-v3-svg",
                "luma/photon",
                "luma/photon-flash",
                "minimax/image-01",
                "nvidia/sana",
                "lucataco/dreamshaper-xl-turbo",
            ],
        ),
        category(
            "inpaint",
            &[
                "black-forest-labs/flux-fill-pro",
                "ideogram-ai/ideogram-v2",
                "ideogram-ai/ideogram-v2-turbo",
                "stability-ai/stable-diffusion-inpainting",
                "zsxkib/flux-dev-inpainting",
                "lucataco/realistic-vision-v5-inpainting",
                "asiryan/realistic-vision-v6.0-b1",
                "pagebrain/dreamshaper-v7",
                "fermatresearch/flux-controlnet-inpaint",
            ],
        ),
        category(
            "outpaint",
            &[
                "black-forest-labs/flux-fill-pro",
                "fermatresearch/sdxl-outpainting-lora",
            ],
        ),
    ]
}
