use crate::{Result, relay::ApiKey};
use std::{io::ErrorKind, path::PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Opt-in persistence for the API key. Nothing is written unless the user
/// asks to be remembered.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// A missing or unreadable key file is not an error, there is just no
    /// remembered key.
    pub async fn load(&self) -> Result<Option<ApiKey>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No remembered credential at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match ApiKey::parse(&raw) {
            Ok(key) => {
                info!("Loaded remembered credential from {}", self.path.display());
                Ok(Some(key))
            }
            Err(e) => {
                warn!("Ignoring stored credential at {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, key: &ApiKey) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, key.expose()).await?;
        info!("Credential remembered at {}", self.path.display());
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Remembered credential removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
