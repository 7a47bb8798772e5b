mod test_harness;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use doc_router::broker::{InMemoryBroker, Producer};
use doc_router::config::GatewayConfig;
use doc_router::gateway::request_id::REQUEST_ID_HEADER;
use doc_router::gateway::{router, IngestionGateway};
use doc_router::job::codec;
use test_harness::{RejectingProducer, StallingProducer};

fn create_test_app(producer: Arc<dyn Producer>) -> (Router, IngestionGateway) {
    let gateway = IngestionGateway::new(
        producer,
        GatewayConfig::default().with_publish_timeout(Duration::from_millis(100)),
    );
    (router(gateway.clone()), gateway)
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let (app, _) = create_test_app(Arc::new(InMemoryBroker::default()));

    let response = app.oneshot(get("/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn test_submit_valid_job() {
    let broker = InMemoryBroker::default();
    let (app, _) = create_test_app(Arc::new(broker.clone()));

    let body = json!({ "fileSizeMb": 10, "pageCount": 5, "imageCount": 2 }).to_string();
    let response = app.oneshot(post_json("/jobs", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["topic"], "jobs.in");
    let job_id = json["jobId"].as_str().unwrap().to_string();
    assert!(!job_id.is_empty());

    let records = broker.records("jobs.in").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, job_id);
    let job = codec::decode(&records[0].payload).unwrap();
    assert_eq!(job.job_id.as_str(), job_id);
    assert!(job.submitted_at > 0);
}

#[tokio::test]
async fn test_submit_out_of_range_returns_400() {
    let broker = InMemoryBroker::default();
    let (app, _) = create_test_app(Arc::new(broker.clone()));

    let body = json!({ "fileSizeMb": 600, "pageCount": 5, "imageCount": 2 }).to_string();
    let response = app.oneshot(post_json("/jobs", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("fileSizeMb"));
    assert!(broker.records("jobs.in").await.is_empty());
}

#[tokio::test]
async fn test_submit_boundary_values_accepted() {
    let broker = InMemoryBroker::default();
    let (app, _) = create_test_app(Arc::new(broker.clone()));

    for body in [
        json!({ "fileSizeMb": 1, "pageCount": 1, "imageCount": 0 }),
        json!({ "fileSizeMb": 500, "pageCount": 5000, "imageCount": 5000 }),
    ] {
        let response = app
            .clone()
            .oneshot(post_json("/jobs", body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(broker.records("jobs.in").await.len(), 2);
}

#[tokio::test]
async fn test_submit_missing_or_malformed_fields_return_400() {
    let broker = InMemoryBroker::default();
    let (app, _) = create_test_app(Arc::new(broker.clone()));

    let bodies = [
        json!({ "fileSizeMb": 10, "pageCount": 5 }).to_string(),
        json!({ "fileSizeMb": "ten", "pageCount": 5, "imageCount": 2 }).to_string(),
        json!({ "fileSizeMb": 10, "pageCount": -1, "imageCount": 2 }).to_string(),
        "{not json".to_string(),
    ];

    for body in bodies {
        let response = app.clone().oneshot(post_json("/jobs", body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(body_json(response).await["error"].is_string());
    }
    assert!(broker.records("jobs.in").await.is_empty());
}

#[tokio::test]
async fn test_dispatch_failure_returns_503_and_forgets_job() {
    let (app, gateway) = create_test_app(Arc::new(RejectingProducer));

    let body = json!({ "fileSizeMb": 10, "pageCount": 5, "imageCount": 2 }).to_string();
    let response = app.oneshot(post_json("/jobs", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_json(response).await["error"].is_string());
    assert_eq!(gateway.tracked_jobs().await, 0);
}

#[tokio::test]
async fn test_unconfirmed_publish_times_out_with_503() {
    let (app, gateway) = create_test_app(Arc::new(StallingProducer::default()));

    let body = json!({ "fileSizeMb": 10, "pageCount": 5, "imageCount": 2 }).to_string();
    let response = app.oneshot(post_json("/jobs", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("not confirmed"));
    assert_eq!(gateway.tracked_jobs().await, 0);
}

#[tokio::test]
async fn test_status_of_submitted_job() {
    let (app, _) = create_test_app(Arc::new(InMemoryBroker::default()));

    let body = json!({ "fileSizeMb": 10, "pageCount": 200, "imageCount": 2 }).to_string();
    let response = app.clone().oneshot(post_json("/jobs", body)).await.unwrap();
    let job_id = body_json(response).await["jobId"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(get(&format!("/jobs/{}", job_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["state"], "submitted");
    assert_eq!(json["payload"]["jobId"], job_id.as_str());
    assert_eq!(json["payload"]["pageCount"], 200);
}

#[tokio::test]
async fn test_status_of_unknown_job_returns_404() {
    let (app, _) = create_test_app(Arc::new(InMemoryBroker::default()));

    let response = app.oneshot(get("/jobs/does-not-exist")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_status_is_per_instance() {
    let broker = InMemoryBroker::default();
    let (first, _) = create_test_app(Arc::new(broker.clone()));
    let (second, _) = create_test_app(Arc::new(broker.clone()));

    let body = json!({ "fileSizeMb": 10, "pageCount": 5, "imageCount": 2 }).to_string();
    let response = first.clone().oneshot(post_json("/jobs", body)).await.unwrap();
    let job_id = body_json(response).await["jobId"]
        .as_str()
        .unwrap()
        .to_string();

    let uri = format!("/jobs/{}", job_id);
    assert_eq!(
        first.oneshot(get(&uri)).await.unwrap().status(),
        StatusCode::OK
    );
    assert_eq!(
        second.oneshot(get(&uri)).await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let (app, _) = create_test_app(Arc::new(InMemoryBroker::default()));

    let request = Request::builder()
        .uri("/healthz")
        .header(REQUEST_ID_HEADER, "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");

    let response = app.oneshot(get("/healthz")).await.unwrap();
    let generated = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(!generated.is_empty());
}
