use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::{SubmitError, ValidationError};
use crate::gateway::request_id::request_id_middleware;
use crate::gateway::IngestionGateway;
use crate::job::{JobId, JobRequest};

pub const ENDPOINT_JOBS: &str = "/jobs";
pub const ENDPOINT_HEALTH: &str = "/healthz";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

pub fn router(gateway: IngestionGateway) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route(ENDPOINT_HEALTH, get(health_handler))
        .route(ENDPOINT_JOBS, post(submit_handler))
        .route("/jobs/{job_id}", get(status_handler))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(gateway)
}

/// Serve until `shutdown` fires, then clear the gateway's status store.
pub async fn serve(
    listener: TcpListener,
    gateway: IngestionGateway,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(
        addr = %addr,
        topic = %gateway.config().inbound_topic,
        "Starting ingestion gateway"
    );

    let result = axum::serve(listener, router(gateway.clone()))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await;

    gateway.shutdown().await;
    tracing::info!("Ingestion gateway stopped");
    result
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn submit_handler(
    State(gateway): State<IngestionGateway>,
    body: Result<Json<JobRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = ValidationError::Malformed(rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    match gateway.submit(request).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(SubmitError::Validation(e)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(SubmitError::Dispatch(e)) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
    }
}

async fn status_handler(
    State(gateway): State<IngestionGateway>,
    Path(job_id): Path<String>,
) -> Response {
    match gateway.get_status(&JobId::from(job_id)).await {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            "jobId not found (status store is per-instance)".to_string(),
        ),
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}
