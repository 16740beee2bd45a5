use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::CommandError;
use crate::engine::Engine;
use crate::engine::EntityCommand;
use crate::engine::EntityState;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    entities: usize,
    devices: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for CommandError {
    fn into_response(self) -> Response {
        let status = match &self {
            CommandError::UnknownEntity(_) => StatusCode::NOT_FOUND,
            CommandError::Unsupported { .. } | CommandError::Failed { .. } => {
                StatusCode::BAD_REQUEST
            }
            CommandError::IntegrationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        error_response(status, self)
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let snapshot = state.engine.state_snapshot();

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            entities: snapshot.entities.len(),
            devices: snapshot.devices.len(),
        }),
    )
}

/// Handler for GET /v1/states
#[tracing::instrument(skip(state))]
async fn states(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, EntityState>> {
    let snapshot = state.engine.state_snapshot();
    Json(
        snapshot
            .entities
            .iter()
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect(),
    )
}

/// Handler for GET /v1/states/:entity_id
#[tracing::instrument(skip(state))]
async fn entity_state(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Response {
    match state.engine.entity_state(&entity_id) {
        Some(entity) => (StatusCode::OK, Json(entity)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Unknown entity: {}", entity_id),
        ),
    }
}

/// Handler for POST /v1/entities/:entity_id/command
#[tracing::instrument(skip(state))]
async fn command(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(command): Json<EntityCommand>,
) -> Result<StatusCode, CommandError> {
    tracing::debug!("Handling {} for {}", command.as_ref(), entity_id);
    state.engine.send_command(&entity_id, command).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/states", get(states))
        .route("/v1/states/:entity_id", get(entity_state))
        .route("/v1/entities/:entity_id/command", post(command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// This function will bind to the specified address and serve the API endpoints.
/// It will run until the provided shutdown signal is triggered.
///
/// # Arguments
/// * `listen` - The IP address to listen on (e.g., "127.0.0.1")
/// * `port` - The port to listen on (e.g., 8565)
/// * `engine` - Engine whose state is served and which executes commands
/// * `shutdown_rx` - A oneshot receiver that will trigger graceful shutdown
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
