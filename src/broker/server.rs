use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::broker::protocol::{
    CommitRequest, ErrorResponse, FetchRequest, FetchResponse, LeaveRequest, ProduceRequest,
    ENDPOINT_HEALTH, MAX_FETCH_WAIT_MS,
};
use crate::broker::{InMemoryBroker, TopicPartition};
use crate::error::BrokerError;

/// HTTP front for an [`InMemoryBroker`], so stages in other processes can share it.
pub fn router(broker: InMemoryBroker) -> Router {
    Router::new()
        .route(ENDPOINT_HEALTH, get(health_handler))
        .route("/v1/topics/{topic}/records", post(produce_handler))
        .route("/v1/groups/{group}/fetch", post(fetch_handler))
        .route("/v1/groups/{group}/commit", post(commit_handler))
        .route("/v1/groups/{group}/leave", post(leave_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(broker)
}

/// Serve the broker until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    broker: InMemoryBroker,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(
        addr = %addr,
        partitions = broker.config().partitions,
        "Starting broker service"
    );

    axum::serve(listener, router(broker))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Broker service stopped");
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn produce_handler(
    State(broker): State<InMemoryBroker>,
    Path(topic): Path<String>,
    Json(request): Json<ProduceRequest>,
) -> Response {
    let payload = match request.payload() {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    match broker.produce(&topic, &request.key, payload).await {
        Ok(delivery) => (StatusCode::OK, Json(delivery)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e),
    }
}

async fn fetch_handler(
    State(broker): State<InMemoryBroker>,
    Path(group): Path<String>,
    Json(request): Json<FetchRequest>,
) -> Response {
    let timeout = Duration::from_millis(request.timeout_ms.min(MAX_FETCH_WAIT_MS));

    match broker
        .fetch(&group, &request.member_id, &request.topics, timeout)
        .await
    {
        Some(record) => (StatusCode::OK, Json(FetchResponse::from(record))).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn commit_handler(
    State(broker): State<InMemoryBroker>,
    Path(group): Path<String>,
    Json(request): Json<CommitRequest>,
) -> Response {
    let tp = TopicPartition::new(request.topic, request.partition);
    match broker.commit(&group, &tp, request.offset).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, &e),
    }
}

async fn leave_handler(
    State(broker): State<InMemoryBroker>,
    Path(group): Path<String>,
    Json(request): Json<LeaveRequest>,
) -> StatusCode {
    broker.leave(&group, &request.member_id).await;
    tracing::debug!(group = %group, member_id = %request.member_id, "Member left group");
    StatusCode::NO_CONTENT
}

fn error_response(status: StatusCode, error: &BrokerError) -> Response {
    tracing::warn!(status = %status, error = %error, "Broker request rejected");
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}
