use crate::{
    Error, Result,
    schema::{Dimensions, FieldDescriptor},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use tracing::debug;

/// A `data:<mime>;base64,<payload>` upload, decoded.
#[derive(Clone, PartialEq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| Error::upload("Upload must be a data URI"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| Error::upload("Malformed data URI"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| Error::upload("Only base64 data URIs are supported"))?;
        let mime_type = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        Ok(Self {
            mime_type,
            bytes: BASE64.decode(payload.trim())?,
        })
    }

    pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
    }

    pub fn to_uri(&self) -> String {
        Self::encode(&self.mime_type, &self.bytes)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl std::fmt::Debug for DataUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataUri")
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// An upload that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub data: DataUri,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub mime_type: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl UploadedFile {
    pub fn summary(&self) -> UploadSummary {
        UploadSummary {
            mime_type: self.data.mime_type.clone(),
            size_bytes: self.data.size(),
            dimensions: self.dimensions,
        }
    }
}

/// `accepted` entries are exact types, `*/*`, or `main/*` wildcards.
pub fn mime_matches(accepted: &[String], mime_type: &str) -> bool {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    accepted.iter().any(|pattern| {
        let pattern = pattern.trim().to_ascii_lowercase();
        if pattern == "*/*" || pattern == mime_type {
            return true;
        }
        match pattern.strip_suffix("/*") {
            Some(main) => mime_type
                .split_once('/')
                .is_some_and(|(candidate, _)| candidate == main),
            None => false,
        }
    })
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{} KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}

pub fn check_size(size: u64, max: Option<u64>) -> Result<()> {
    match max {
        Some(limit) if size > limit => Err(Error::upload(format!(
            "File too large. Maximum size is {}",
            format_size(limit)
        ))),
        _ => Ok(()),
    }
}

pub fn check_mime(accepted: &[String], mime_type: &str) -> Result<()> {
    if accepted.is_empty() || mime_matches(accepted, mime_type) {
        return Ok(());
    }
    Err(Error::upload(format!(
        "Invalid file type '{}'. Accepted types: {}",
        mime_type,
        accepted.join(", ")
    )))
}

/// Reads the pixel size without decoding the whole image.
pub async fn read_dimensions(bytes: Vec<u8>) -> Result<Dimensions> {
    tokio::task::spawn_blocking(move || -> Result<Dimensions> {
        let (width, height) = image::ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Dimensions { width, height })
    })
    .await
    .map_err(|e| Error::internal(format!("image decode task failed: {}", e)))?
}

/// Size, then MIME type, then (for images) pixel dimensions.
pub async fn validate_upload(descriptor: &FieldDescriptor, raw: &str) -> Result<UploadedFile> {
    let data = DataUri::parse(raw)?;
    let constraints = &descriptor.constraints;

    check_size(data.size(), constraints.max_size_bytes)?;
    check_mime(&constraints.accepted_mime_types, &data.mime_type)?;

    let dimensions = if data.mime_type.starts_with("image/") {
        let found = read_dimensions(data.bytes.clone())
            .await
            .map_err(|_| Error::upload("Could not read image. Please upload a valid image"))?;
        if let Some(expected) = constraints.dimensions {
            if expected != found {
                return Err(Error::upload(format!(
                    "Image must be exactly {}x{} pixels (got {}x{})",
                    expected.width, expected.height, found.width, found.height
                )));
            }
        }
        Some(found)
    } else {
        None
    };

    debug!(
        "Accepted upload for '{}': {} ({} bytes)",
        descriptor.name,
        data.mime_type,
        data.size()
    );

    Ok(UploadedFile { data, dimensions })
}
