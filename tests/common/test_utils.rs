use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, Rgba, RgbaImage};
use replicate_form::{
    config::{Config, CredentialsConfig, PollingConfig},
    job::PollPolicy,
    relay::ApiKey,
};
use serde_json::{Value, json};
use std::io::Cursor;
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_KEY: &str = "r8_test_key";
pub const TEXT_MODEL: &str = "black-forest-labs/flux-schnell";
pub const INPAINT_MODEL: &str = "black-forest-labs/flux-fill-pro";

pub fn test_key() -> ApiKey {
    ApiKey::parse(TEST_KEY).unwrap()
}

/// Create a test configuration with sensible defaults
pub fn create_test_config(temp_dir: &TempDir) -> Config {
    Config {
        credentials: CredentialsConfig {
            store_path: temp_dir
                .path()
                .join("credential")
                .to_string_lossy()
                .to_string(),
        },
        polling: PollingConfig {
            interval_ms: 2000,
            retry_backoff_ms: 5000,
            max_retries: 3,
            request_timeout_ms: 10000,
            create_timeout_ms: 60000,
            verify_outputs: false,
        },
        ..Config::default()
    }
}

pub fn test_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(2),
        retry_backoff: Duration::from_secs(5),
        max_retries: 3,
        request_timeout: Duration::from_secs(10),
        create_timeout: Duration::from_secs(60),
    }
}

/// Wraps `Input` properties in a model version document.
pub fn version_document(version_id: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "id": version_id,
        "openapi_schema": {
            "components": {
                "schemas": {
                    "Input": {
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    },
                    "aspect_ratio": {
                        "type": "string",
                        "enum": ["1:1", "16:9", "9:16"],
                    }
                }
            }
        }
    })
}

pub fn text_to_image_version(version_id: &str) -> Value {
    version_document(
        version_id,
        json!({
            "prompt": {"type": "string", "x-order": 0, "description": "Text prompt"},
            "aspect_ratio": {"allOf": [{"$ref": "#/components/schemas/aspect_ratio"}], "default": "1:1", "x-order": 1},
            "num_outputs": {"type": "integer", "minimum": 1, "maximum": 4, "default": 1, "x-order": 2},
            "seed": {"type": "integer", "x-order": 3},
        }),
        &["prompt"],
    )
}

pub fn inpaint_version(version_id: &str) -> Value {
    version_document(
        version_id,
        json!({
            "prompt": {"type": "string", "x-order": 0},
            "image": {"type": "string", "format": "uri", "x-order": 1},
            "mask": {"type": "string", "format": "uri", "x-order": 2},
        }),
        &["prompt", "image"],
    )
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn png_data_uri(width: u32, height: u32) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png_bytes(width, height)))
}

/// PNG filled with pseudo-random pixels, so the encoder cannot shrink it.
/// The file ends up slightly larger than `width * height * 4` bytes.
pub fn noise_png_data_uri(width: u32, height: u32) -> String {
    let mut seed: u32 = 0x2545_f491;
    let image = RgbaImage::from_fn(width, height, |_, _| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        Rgba(seed.to_le_bytes())
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}
