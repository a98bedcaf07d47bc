mod store;

pub use store::CredentialStore;

use crate::{
    Error, Result,
    form::FormState,
    job::SubmissionRequest,
    relay::{ApiKey, ModelReference, PredictionApi},
    schema::{InterpretOptions, interpret_version},
};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything the page used to keep in globals: the key, the version cache,
/// the selected model and its form.
#[derive(Debug, Default)]
pub struct Session {
    credential: Option<ApiKey>,
    model_cache: HashMap<String, ModelReference>,
    current: Option<ModelReference>,
    form: FormState,
    options: InterpretOptions,
    request_timeout: Option<Duration>,
}

impl Session {
    pub fn new(options: InterpretOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Bounds each upstream lookup made while the session lock is held.
    pub fn with_request_timeout(mut self, limit: Duration) -> Self {
        self.request_timeout = Some(limit);
        self
    }

    pub fn credential(&self) -> Option<&ApiKey> {
        self.credential.as_ref()
    }

    pub fn require_credential(&self) -> Result<ApiKey> {
        self.credential.clone().ok_or(Error::MissingCredential)
    }

    /// A different key may see different versions, so the cache goes.
    pub fn set_credential(&mut self, key: ApiKey) {
        if self.credential.as_ref() != Some(&key) {
            self.invalidate_cache();
        }
        self.credential = Some(key);
    }

    pub fn clear_credential(&mut self) {
        self.credential = None;
        self.invalidate_cache();
    }

    pub fn cached_model(&self, identifier: &str) -> Option<&ModelReference> {
        self.model_cache.get(identifier)
    }

    pub fn current_model(&self) -> Option<&ModelReference> {
        self.current.as_ref()
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut FormState {
        &mut self.form
    }

    /// Resolves the latest version (cached per identifier), fetches its
    /// schema and replaces the form.
    pub async fn select_model(
        &mut self,
        api: &dyn PredictionApi,
        identifier: &str,
    ) -> Result<&FormState> {
        let key = self.require_credential()?;
        let reference = match self.model_cache.get(identifier) {
            Some(reference) => {
                debug!("Version cache hit for {}", identifier);
                reference.clone()
            }
            None => {
                let reference = bounded(
                    self.request_timeout,
                    resolve_latest_version(api, &key, identifier),
                )
                .await?;
                self.model_cache
                    .insert(identifier.to_string(), reference.clone());
                reference
            }
        };

        let version = bounded(
            self.request_timeout,
            api.get_model_version(&key, &reference.owner, &reference.name, &reference.version_id),
        )
        .await?;
        let fields = interpret_version(&version, &self.options)?;

        info!(
            "Selected {} at version {} ({} fields)",
            reference.identifier,
            reference.version_id,
            fields.len()
        );
        self.current = Some(reference);
        self.form = FormState::new(fields);
        Ok(&self.form)
    }

    /// Freezes what one submission needs so the lock can be released.
    pub fn submission_request(&self) -> Result<SubmissionRequest> {
        let key = self.require_credential()?;
        let model = self.current.as_ref().ok_or(Error::NoModelSelected)?;
        Ok(SubmissionRequest {
            key,
            version_id: model.version_id.clone(),
            fields: self.form.descriptors().to_vec(),
            form: self.form.snapshot()?,
        })
    }

    fn invalidate_cache(&mut self) {
        if !self.model_cache.is_empty() {
            info!("Credential changed, dropping {} cached versions", self.model_cache.len());
        }
        self.model_cache.clear();
    }
}

async fn bounded<T>(limit: Option<Duration>, request: impl Future<Output = Result<T>>) -> Result<T> {
    let Some(limit) = limit else {
        return request.await;
    };
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Model lookup gave up after {:?}", limit);
            Err(Error::Timeout {
                millis: limit.as_millis() as u64,
            })
        }
    }
}

async fn resolve_latest_version(
    api: &dyn PredictionApi,
    key: &ApiKey,
    identifier: &str,
) -> Result<ModelReference> {
    let (owner, name) = ModelReference::split_identifier(identifier)?;
    let model = api.get_model(key, &owner, &name).await?;
    let version_id = model
        .pointer("/latest_version/id")
        .and_then(|id| id.as_str())
        .ok_or_else(|| Error::schema(format!("{} has no published version", identifier)))?;

    Ok(ModelReference {
        identifier: identifier.to_string(),
        owner,
        name,
        version_id: version_id.to_string(),
    })
}
