//! End-to-end webhook flow against a mocked Azure DevOps API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webhook_to_devops::{
    auth::{AccessToken, CredentialError, TokenCredential, DEVOPS_SCOPE},
    router::{build_router, WEBHOOK_ROUTE},
    services::DevOpsClient,
    AppState, Config,
};

const TOKEN: &str = "test-token";
const WORK_ITEM_PATH: &str = "/Ops/_apis/wit/workitems/$Task";

struct StubCredential {
    fail: bool,
    delay: Option<std::time::Duration>,
    calls: AtomicUsize,
}

impl StubCredential {
    fn ok() -> Arc<Self> {
        Arc::new(Self { fail: false, delay: None, calls: AtomicUsize::new(0) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, delay: None, calls: AtomicUsize::new(0) })
    }

    fn slow(delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self { fail: false, delay: Some(delay), calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl TokenCredential for StubCredential {
    fn name(&self) -> &'static str {
        "StubCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        assert_eq!(scope, DEVOPS_SCOPE);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(CredentialError::Exhausted {
                reasons: vec!["StubCredential: not logged in".to_string()],
            });
        }
        Ok(AccessToken::new(TOKEN, Utc::now() + Duration::hours(1)))
    }
}

fn config(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn app(config: Config, credential: Arc<StubCredential>) -> Router {
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.request_timeout))
        .build()
        .unwrap();
    let state = AppState::new(config, credential, DevOpsClient::new(client), metrics_handle);
    build_router(state)
}

fn configured_app(server: &MockServer, credential: Arc<StubCredential>) -> Router {
    let uri = server.uri();
    app(
        config(&[("DEVOPS_ORG_URL", uri.as_str()), ("DEVOPS_PROJECT_NAME", "Ops")]),
        credential,
    )
}

fn webhook(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(WEBHOOK_ROUTE)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn created(id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": id,
        "fields": {"System.Title": "ignored"},
        "_links": {"html": {"href": format!("https://dev.azure.com/contoso/Ops/_workitems/edit/{}", id)}}
    }))
}

#[tokio::test]
async fn test_webhook_creates_work_item() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WORK_ITEM_PATH))
        .and(query_param("api-version", "7.2-preview"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "application/json-patch+json"))
        .respond_with(created(42))
        .expect(1)
        .mount(&server)
        .await;

    let payload = json!({"control": {"name": "Disk full", "id": "wc-1"}, "severity": "HIGH"});
    let (status, body) = send(configured_app(&server, StubCredential::ok()), webhook(payload.to_string())).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Work item created successfully");
    assert_eq!(body["workItemId"], 42);
    assert_eq!(body["url"], "https://dev.azure.com/contoso/Ops/_workitems/edit/42");

    let requests = server.received_requests().await.unwrap();
    let patch: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(patch[0], json!({"op": "add", "path": "/fields/System.Title", "value": "Wiz - Disk full"}));
    assert_eq!(patch[1]["op"], "add");
    assert_eq!(patch[1]["path"], "/fields/System.Description");
    let description = patch[1]["value"].as_str().unwrap();
    assert!(description.starts_with("<p>Raw Webhook Payload:</p><pre>"));
    assert!(description.contains("\"severity\": \"HIGH\""));
}

#[tokio::test]
async fn test_work_item_type_from_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Ops/_apis/wit/workitems/$Bug"))
        .respond_with(created(7))
        .expect(1)
        .mount(&server)
        .await;

    let payload = json!({"control": {"name": "Open port"}, "workItemType": "Bug"});
    let (status, body) = send(configured_app(&server, StubCredential::ok()), webhook(payload.to_string())).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["workItemId"], 7);
}

#[tokio::test]
async fn test_missing_control_is_rejected_without_api_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(created(1))
        .expect(0)
        .mount(&server)
        .await;

    let (status, body) = send(
        configured_app(&server, StubCredential::ok()),
        webhook(json!({"name": "x"}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_3002");
    assert_eq!(body["error"]["message"], "Webhook payload must contain a 'control' object");
    assert_eq!(body["error"]["field"], "control");
}

#[tokio::test]
async fn test_invalid_json_and_missing_title() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(created(1))
        .expect(0)
        .mount(&server)
        .await;

    let (status, body) = send(configured_app(&server, StubCredential::ok()), webhook("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_3001");

    let (status, body) = send(
        configured_app(&server, StubCredential::ok()),
        webhook(json!({"control": {}}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VAL_3003");
}

#[tokio::test]
async fn test_token_failure_stops_before_validation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(created(1))
        .expect(0)
        .mount(&server)
        .await;

    let credential = StubCredential::failing();
    // Body is invalid too: authentication runs first.
    let (status, body) = send(configured_app(&server, Arc::clone(&credential)), webhook("{not json")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "AUTH_1001");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to authenticate with Azure DevOps"));
    assert_eq!(credential.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_downstream_error_status_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WORK_ITEM_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("TF400813: not authorized"))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        configured_app(&server, StubCredential::ok()),
        webhook(json!({"control": {"name": "Disk full"}}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "EXT_8001");
    assert_eq!(
        body["error"]["message"],
        "Failed to create work item. Azure DevOps API Error: TF400813: not authorized"
    );
    assert_eq!(body["error"]["details"], "TF400813: not authorized");
}

#[tokio::test]
async fn test_malformed_downstream_response_is_generic_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WORK_ITEM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .mount(&server)
        .await;

    let (status, body) = send(
        configured_app(&server, StubCredential::ok()),
        webhook(json!({"control": {"name": "Disk full"}}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "EXT_8002");
    assert_eq!(
        body["error"]["message"],
        "An unexpected error occurred while creating the work item."
    );
}

#[tokio::test]
async fn test_missing_devops_config() {
    let (status, body) = send(
        app(config(&[("DEVOPS_PROJECT_NAME", "Ops")]), StubCredential::ok()),
        webhook(json!({"control": {"name": "Disk full"}}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INT_9998");
    assert_eq!(
        body["error"]["message"],
        "Azure DevOps organization URL or project name is not configured in service settings."
    );
}

#[tokio::test]
async fn test_function_key_required_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WORK_ITEM_PATH))
        .respond_with(created(5))
        .expect(2)
        .mount(&server)
        .await;

    let uri = server.uri();
    let config = config(&[
        ("DEVOPS_ORG_URL", uri.as_str()),
        ("DEVOPS_PROJECT_NAME", "Ops"),
        ("FUNCTION_KEY", "s3cret"),
    ]);
    let payload = json!({"control": {"name": "Disk full"}}).to_string();

    let credential = StubCredential::ok();
    let (status, body) = send(app(config.clone(), Arc::clone(&credential)), webhook(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_1002");
    assert_eq!(credential.calls.load(Ordering::SeqCst), 0);

    let mut wrong = webhook(payload.clone());
    wrong.headers_mut().insert("x-functions-key", "nope".parse().unwrap());
    let (status, _) = send(app(config.clone(), StubCredential::ok()), wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut with_header = webhook(payload.clone());
    with_header.headers_mut().insert("x-functions-key", "s3cret".parse().unwrap());
    let (status, _) = send(app(config.clone(), StubCredential::ok()), with_header).await;
    assert_eq!(status, StatusCode::CREATED);

    let with_query = Request::builder()
        .method("POST")
        .uri(format!("{}?code=s3cret", WEBHOOK_ROUTE))
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = send(app(config, StubCredential::ok()), with_query).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_get_is_not_allowed() {
    let request = Request::builder()
        .method("GET")
        .uri(WEBHOOK_ROUTE)
        .body(Body::empty())
        .unwrap();
    let response = app(config(&[]), StubCredential::ok()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_health_reports_configuration() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(config(&[]), StubCredential::ok()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["devops_configured"], false);
    assert_eq!(body["function_key_enabled"], false);

    let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(
        app(
            config(&[("DEVOPS_ORG_URL", "https://dev.azure.com/contoso"), ("DEVOPS_PROJECT_NAME", "Ops")]),
            StubCredential::ok(),
        ),
        request,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint_is_plain_text() {
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app(config(&[]), StubCredential::ok()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; version=0.0.4"
    );
}

#[tokio::test]
async fn test_repeated_webhook_creates_two_work_items() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WORK_ITEM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "_links": {"html": {"href": "https://x/42"}}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let payload = json!({"control": {"name": "Disk full"}}).to_string();
    for _ in 0..2 {
        let (status, body) = send(configured_app(&server, StubCredential::ok()), webhook(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body,
            json!({"message": "Work item created successfully", "workItemId": 42, "url": "https://x/42"})
        );
    }
}

#[tokio::test]
async fn test_slow_token_and_api_still_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WORK_ITEM_PATH))
        .respond_with(created(9).set_delay(std::time::Duration::from_millis(600)))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    // Each outbound step fits the timeout, the two together do not.
    let config = config(&[
        ("DEVOPS_ORG_URL", uri.as_str()),
        ("DEVOPS_PROJECT_NAME", "Ops"),
        ("REQUEST_TIMEOUT", "1"),
    ]);
    let credential = StubCredential::slow(std::time::Duration::from_millis(700));

    let (status, body) = send(
        app(config, credential),
        webhook(json!({"control": {"name": "Disk full"}}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["workItemId"], 9);
}

#[tokio::test]
async fn test_error_body_and_header_share_request_id() {
    let mut request = webhook(json!({"name": "x"}).to_string());
    request.headers_mut().insert("x-request-id", "hook-delivery-1".parse().unwrap());
    let response = app(config(&[]), StubCredential::ok()).oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "hook-delivery-1");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["request_id"], "hook-delivery-1");

    let response = app(config(&[]), StubCredential::ok())
        .oneshot(webhook("{not json"))
        .await
        .unwrap();
    let header = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["request_id"], header.as_str());
}
