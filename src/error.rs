use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("{0}")]
    Upload(String),

    #[error("Could not retrieve input schema: {0}")]
    SchemaUnavailable(String),

    #[error("Invalid Replicate API key format")]
    InvalidCredential,

    #[error("Please enter your Replicate API key.")]
    MissingCredential,

    #[error("Model version not found. Please select a model.")]
    NoModelSelected,

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("A prediction is already in progress")]
    SubmissionInFlight,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Invalid state transition: {current} -> {requested}")]
    InvalidTransition { current: String, requested: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Self::Config(s) => Self::Config(s.clone()),
            Self::MissingField { field } => Self::MissingField {
                field: field.clone(),
            },
            Self::InvalidField { field, reason } => Self::InvalidField {
                field: field.clone(),
                reason: reason.clone(),
            },
            Self::Upload(s) => Self::Upload(s.clone()),
            Self::SchemaUnavailable(s) => Self::SchemaUnavailable(s.clone()),
            Self::InvalidCredential => Self::InvalidCredential,
            Self::MissingCredential => Self::MissingCredential,
            Self::NoModelSelected => Self::NoModelSelected,
            Self::UnknownModel(s) => Self::UnknownModel(s.clone()),
            Self::SubmissionInFlight => Self::SubmissionInFlight,
            Self::Api { status, message } => Self::Api {
                status: *status,
                message: message.clone(),
            },
            Self::Timeout { millis } => Self::Timeout { millis: *millis },
            Self::InvalidTransition { current, requested } => Self::InvalidTransition {
                current: current.clone(),
                requested: requested.clone(),
            },
            Self::Internal(s) => Self::Internal(s.clone()),
            // For errors that can't be cloned, convert to string representation
            Self::Serialization(e) => Self::Internal(format!("Serialization error: {}", e)),
            Self::Yaml(e) => Self::Internal(format!("YAML error: {}", e)),
            Self::Io(e) => Self::Internal(format!("IO error: {}", e)),
            Self::Network(e) => Self::Internal(format!("Network error: {}", e)),
            Self::AddrParse(e) => Self::Internal(format!("Address parse error: {}", e)),
            Self::Image(e) => Self::Internal(format!("Image error: {}", e)),
            Self::Base64(e) => Self::Internal(format!("Base64 error: {}", e)),
        }
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Errors worth another attempt when the request is idempotent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout { .. } | Self::Api { .. } | Self::Serialization(_)
        )
    }

    /// Errors caught before anything is sent upstream.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::Upload(_)
                | Self::MissingCredential
                | Self::InvalidCredential
                | Self::NoModelSelected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_names_the_field() {
        let err = Error::missing_field("prompt");
        assert_eq!(err.to_string(), "Missing required field: prompt");
        assert!(err.is_input_error());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transport_errors_are_transient() {
        assert!(Error::Timeout { millis: 10_000 }.is_transient());
        assert!(
            Error::Api {
                status: 502,
                message: "bad gateway".to_string()
            }
            .is_transient()
        );
        assert!(!Error::schema("missing Input").is_transient());
    }

    #[test]
    fn test_io_error_clones_as_internal() {
        let err = Error::from(std::io::Error::other("disk gone"));
        let cloned = err.clone();
        assert!(matches!(cloned, Error::Internal(_)));
        assert_eq!(cloned.to_string(), "Internal error: IO error: disk gone");
    }

    #[test]
    fn test_clone_preserves_display() {
        let err = Error::invalid_field("width", "must be a number");
        assert_eq!(err.clone().to_string(), err.to_string());
    }
}
