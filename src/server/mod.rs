pub mod handlers;
pub mod types;

use crate::{
    Result,
    config::Config,
    job::{PollPolicy, SubmissionController},
    output::HttpImageProbe,
    relay::{PredictionApi, RelayClient},
    schema::InterpretOptions,
    session::{CredentialStore, Session},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use handlers::AppState;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Room for the JSON envelope around an upload's data URI.
const BODY_ENVELOPE_BYTES: u64 = 64 * 1024;

/// Uploads arrive base64-encoded inside JSON, so the body can be a third
/// larger than the biggest file the form accepts.
pub fn body_limit(max_upload_bytes: u64) -> usize {
    let encoded = max_upload_bytes.div_ceil(3).saturating_mul(4);
    usize::try_from(encoded.saturating_add(BODY_ENVELOPE_BYTES)).unwrap_or(usize::MAX)
}

pub fn router(state: AppState) -> Router {
    let limit = body_limit(state.config.uploads.max_size_bytes);
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/models", get(handlers::list_models))
        .route(
            "/api/credential",
            put(handlers::put_credential).delete(handlers::delete_credential),
        )
        .route("/api/model", post(handlers::select_model))
        .route("/api/fields/:name", put(handlers::set_field))
        .route(
            "/api/fields/:name/upload",
            post(handlers::upload_field).delete(handlers::delete_upload),
        )
        .route("/api/mask/stroke", post(handlers::mask_stroke))
        .route("/api/mask/undo", post(handlers::mask_undo))
        .route("/api/mask/clear", post(handlers::mask_clear))
        .route("/api/predictions", post(handlers::create_prediction))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wires the live collaborators together. Tests build `AppState` themselves
/// with a mock API.
pub async fn build_state(config: Config) -> Result<AppState> {
    let client = RelayClient::new(&config.replicate)
        .with_timeouts(config.polling.request_timeout(), config.polling.create_timeout());
    if client.is_relayed() {
        info!("Routing upstream calls through the relay");
    } else {
        info!("No relay configured, calling {} directly", config.replicate.api_base);
    }
    let api: Arc<dyn PredictionApi> = Arc::new(client);

    let mut controller = SubmissionController::new(api.clone(), PollPolicy::from(&config.polling));
    if config.polling.verify_outputs {
        controller = controller.with_probe(Arc::new(HttpImageProbe::new()));
    }

    let options = InterpretOptions {
        default_max_upload_bytes: Some(config.uploads.max_size_bytes),
    };
    let mut session = Session::new(options).with_request_timeout(config.polling.request_timeout());

    let store = CredentialStore::new(&config.credentials.store_path);
    if let Some(key) = store.load().await? {
        session.set_credential(key);
    }

    Ok(AppState {
        config: Arc::new(config),
        session: Arc::new(Mutex::new(session)),
        controller: Arc::new(controller),
        api,
        store,
    })
}

pub async fn run(config: Config) -> Result<()> {
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let app = router(build_state(config).await?);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
