use super::types::{
    CredentialRequest, CredentialResponse, ErrorResponse, FieldResponse, FieldValueRequest,
    FormResponse, HealthResponse, MaskResponse, ModelsResponse, PredictionResponse,
    SelectModelRequest, StrokeRequest, UploadRequest, UploadResponse,
};
use crate::{
    Error,
    config::Config,
    form::{ControlValue, FormState, MaskCanvas, validate_upload, widgets},
    job::SubmissionController,
    relay::{ApiKey, PredictionApi},
    schema::{FieldDescriptor, FieldKind},
    session::{CredentialStore, Session},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<Mutex<Session>>,
    pub controller: Arc<SubmissionController>,
    pub api: Arc<dyn PredictionApi>,
    pub store: CredentialStore,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Maps the crate error onto an HTTP status with the user-facing text.
pub fn error_response(e: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        Error::MissingField { .. }
        | Error::InvalidField { .. }
        | Error::Upload(_)
        | Error::Image(_)
        | Error::Base64(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::MissingCredential | Error::InvalidCredential => StatusCode::UNAUTHORIZED,
        Error::NoModelSelected => StatusCode::BAD_REQUEST,
        Error::UnknownModel(_) => StatusCode::NOT_FOUND,
        Error::SubmissionInFlight => StatusCode::CONFLICT,
        Error::Api { .. } | Error::Network(_) | Error::SchemaUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed ({}): {}", status, e);
    } else if e.is_input_error() {
        debug!("Input rejected ({}): {}", status, e);
    } else {
        warn!("Request rejected ({}): {}", status, e);
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn mask_response(canvas: &MaskCanvas, undone: Option<bool>) -> MaskResponse {
    let dimensions = canvas.dimensions();
    MaskResponse {
        width: dimensions.width,
        height: dimensions.height,
        brush_size: canvas.brush_size(),
        history_len: canvas.history_len(),
        blank: canvas.is_blank(),
        undone,
    }
}

pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let session = state.session.lock().await;
    Json(ModelsResponse {
        categories: state.config.models.clone(),
        selected: session.current_model().map(|m| m.identifier.clone()),
    })
}

pub async fn put_credential(
    State(state): State<AppState>,
    Json(request): Json<CredentialRequest>,
) -> ApiResult<CredentialResponse> {
    let key = ApiKey::parse(&request.api_key).map_err(error_response)?;

    state.session.lock().await.set_credential(key.clone());

    let remembered = if request.remember {
        state.store.save(&key).await.map_err(error_response)?;
        true
    } else {
        state.store.clear().await.map_err(error_response)?;
        false
    };

    info!("Credential updated (remembered: {})", remembered);
    Ok(Json(CredentialResponse {
        accepted: true,
        remembered,
    }))
}

pub async fn delete_credential(State(state): State<AppState>) -> ApiResult<CredentialResponse> {
    state.session.lock().await.clear_credential();
    state.store.clear().await.map_err(error_response)?;
    info!("Credential cleared");
    Ok(Json(CredentialResponse {
        accepted: false,
        remembered: false,
    }))
}

pub async fn select_model(
    State(state): State<AppState>,
    Json(request): Json<SelectModelRequest>,
) -> ApiResult<FormResponse> {
    let identifier = request.model.trim();
    if !state.config.knows_model(identifier) {
        return Err(error_response(Error::UnknownModel(identifier.to_string())));
    }
    info!("Loading model {}", identifier);

    // held across the fetch so rapid re-selections apply in order
    let mut session = state.session.lock().await;
    let form = session
        .select_model(state.api.as_ref(), identifier)
        .await
        .map_err(error_response)?;
    let fields = form.descriptors().to_vec();
    let html = form.render_html();
    let model = session
        .current_model()
        .cloned()
        .ok_or_else(|| error_response(Error::NoModelSelected))?;

    Ok(Json(FormResponse {
        details_url: model.details_url(),
        model,
        widgets: widgets(&fields),
        fields,
        html,
    }))
}

pub async fn set_field(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<FieldValueRequest>,
) -> ApiResult<FieldResponse> {
    let mut session = state.session.lock().await;
    let form = session.form_mut();
    form.set_value(&name, ControlValue::from_json(&request.value))
        .map_err(error_response)?;

    Ok(Json(FieldResponse {
        errors: form.errors().clone(),
        field: name,
    }))
}

pub async fn upload_field(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<UploadResponse> {
    let descriptor = state
        .session
        .lock()
        .await
        .form()
        .descriptor(&name)
        .cloned()
        .map_err(error_response)?;

    // decoding happens without the session lock
    let validated = validate_upload(&descriptor, &request.data_uri).await;

    let mut session = state.session.lock().await;
    let form = session.form_mut();
    let current = ensure_unchanged(form, &descriptor);
    let file = match validated.and_then(|file| current.map(|()| file)) {
        Ok(file) => file,
        Err(e) => {
            if form.descriptor(&name).is_ok() {
                form.reject_upload(&name, &e);
            }
            return Err(error_response(e));
        }
    };

    let summary = file.summary();
    let display = request.display_width.zip(request.display_height);
    if let Err(e) = form.accept_upload(&name, file, display) {
        form.reject_upload(&name, &e);
        return Err(error_response(e));
    }
    info!("Accepted upload for {}", name);

    Ok(Json(UploadResponse {
        mask: form
            .mask()
            .filter(|_| descriptor.kind == FieldKind::MaskUri)
            .map(|canvas| mask_response(canvas, None)),
        file: summary,
        field: name,
    }))
}

/// The upload was validated against a copy taken before the lock was
/// released. A model switch in between makes that validation stale.
fn ensure_unchanged(form: &FormState, validated: &FieldDescriptor) -> crate::Result<()> {
    match form.descriptor(&validated.name) {
        Ok(current) if current == validated => Ok(()),
        _ => Err(Error::invalid_field(
            validated.name.as_str(),
            "form changed during upload, please upload again",
        )),
    }
}

pub async fn delete_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<FieldResponse> {
    let mut session = state.session.lock().await;
    let form = session.form_mut();
    form.remove_upload(&name).map_err(error_response)?;

    Ok(Json(FieldResponse {
        errors: form.errors().clone(),
        field: name,
    }))
}

pub async fn mask_stroke(
    State(state): State<AppState>,
    Json(request): Json<StrokeRequest>,
) -> ApiResult<MaskResponse> {
    let mut session = state.session.lock().await;
    let canvas = session.form_mut().mask_mut().map_err(error_response)?;
    if let Some(size) = request.brush_size {
        canvas.set_brush_size(size);
    }
    let points: Vec<(f32, f32)> = request.points.iter().map(|[x, y]| (*x, *y)).collect();
    canvas.stroke(&points);

    Ok(Json(mask_response(canvas, None)))
}

pub async fn mask_undo(State(state): State<AppState>) -> ApiResult<MaskResponse> {
    let mut session = state.session.lock().await;
    let canvas = session.form_mut().mask_mut().map_err(error_response)?;
    let undone = canvas.undo();
    Ok(Json(mask_response(canvas, Some(undone))))
}

pub async fn mask_clear(State(state): State<AppState>) -> ApiResult<MaskResponse> {
    let mut session = state.session.lock().await;
    let canvas = session.form_mut().mask_mut().map_err(error_response)?;
    canvas.clear();
    Ok(Json(mask_response(canvas, None)))
}

pub async fn create_prediction(State(state): State<AppState>) -> ApiResult<PredictionResponse> {
    if state.controller.is_in_flight() {
        return Err(error_response(Error::SubmissionInFlight));
    }

    // the lock is only held for the snapshot, never while polling
    let request = state
        .session
        .lock()
        .await
        .submission_request()
        .map_err(error_response)?;

    let outcome = state
        .controller
        .submit(request)
        .await
        .map_err(error_response)?;

    let result_html = outcome.presentation.as_ref().map(|p| p.to_html());
    Ok(Json(PredictionResponse {
        outcome,
        result_html,
    }))
}
