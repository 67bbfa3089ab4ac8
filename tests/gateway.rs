//! HTTP surface tests: the execute route plus the admin endpoints, served
//! from an ephemeral listener.

mod support;

use panelforge::engine::ExecutionEngine;
use panelforge::gateway::run_gateway_with_listener;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use support::{ScriptedProvider, build_test_engine, pipeline};
use tokio_util::sync::CancellationToken;

struct GatewayTestServer {
    port: u16,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl GatewayTestServer {
    async fn start(engine: ExecutionEngine) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral gateway listener should bind");
        let port = listener
            .local_addr()
            .expect("listener should expose local address")
            .port();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_gateway_with_listener(
            listener,
            Arc::new(engine),
            shutdown.clone(),
        ));

        wait_until_ready(port).await;
        Self {
            port,
            shutdown,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }
}

impl Drop for GatewayTestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

async fn wait_until_ready(port: u16) {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .expect("reqwest client should be built");

    for _ in 0..80 {
        let health = client
            .get(format!("http://127.0.0.1:{port}/health"))
            .send()
            .await;
        if matches!(health, Ok(resp) if resp.status() == StatusCode::OK) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("gateway did not become ready on port {port}");
}

fn demo_engine() -> ExecutionEngine {
    let flaky = ScriptedProvider::failing("flaky");
    let steady = ScriptedProvider::ok("steady", "generated component layout");
    build_test_engine(
        vec![Arc::new(flaky), Arc::new(steady)],
        vec![pipeline("component-generation", &["flaky", "steady"])],
    )
}

#[tokio::test]
async fn health_reports_provider_count() {
    let server = GatewayTestServer::start(demo_engine()).await;

    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"], 2);
}

#[tokio::test]
async fn execute_round_trips_with_fallback() {
    let server = GatewayTestServer::start(demo_engine()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/ai/execute"))
        .json(&json!({
            "pipeline": "component-generation",
            "messages": [{"role": "user", "content": "add a pump"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"]["content"], "generated component layout");
    assert_eq!(body["provider"], "steady");
    assert_eq!(body["context"]["attempted_providers"][0], "flaky");
}

#[tokio::test]
async fn execute_unknown_pipeline_is_404() {
    let server = GatewayTestServer::start(demo_engine()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/ai/execute"))
        .json(&json!({
            "pipeline": "ghost",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn execute_rejects_malformed_json() {
    let server = GatewayTestServer::start(demo_engine()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/ai/execute"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exhaustion_surfaces_as_bad_gateway_with_diagnostics() {
    let doomed = ScriptedProvider::failing("doomed");
    let engine = build_test_engine(vec![Arc::new(doomed)], vec![pipeline("p", &["doomed"])]);
    let server = GatewayTestServer::start(engine).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/ai/execute"))
        .json(&json!({
            "pipeline": "p",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["attempted_providers"][0], "doomed");
    assert!(body["last_error"].as_str().unwrap().contains("doomed is down"));
}

#[tokio::test]
async fn admin_lists_providers_pipelines_and_filters() {
    let server = GatewayTestServer::start(demo_engine()).await;

    let providers: Value = reqwest::get(server.url("/api/ai/providers"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = providers
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["flaky", "steady"]);
    assert_eq!(providers[0]["available"], true);

    let pipelines: Value = reqwest::get(server.url("/api/ai/pipelines"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pipelines[0]["id"], "component-generation");

    let filters: Value = reqwest::get(server.url("/api/ai/filters"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let filter_ids: Vec<&str> = filters
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap())
        .collect();
    assert!(filter_ids.contains(&"redact-secrets"));
    assert!(filter_ids.contains(&"halt-on-invalid-request"));
}

#[tokio::test]
async fn metrics_endpoint_reflects_dispatches_and_resets() {
    let server = GatewayTestServer::start(demo_engine()).await;
    let client = reqwest::Client::new();

    client
        .post(server.url("/api/ai/execute"))
        .json(&json!({
            "pipeline": "component-generation",
            "messages": [{"role": "user", "content": "add a pump"}]
        }))
        .send()
        .await
        .unwrap();

    let metrics: Value = reqwest::get(server.url("/api/ai/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["flaky"]["total_requests"], 1);
    assert_eq!(metrics["flaky"]["successful_requests"], 0);
    assert_eq!(metrics["steady"]["success_rate"], 1.0);

    let reset = client
        .post(server.url("/api/ai/metrics/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);

    let metrics: Value = reqwest::get(server.url("/api/ai/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(metrics.as_object().unwrap().is_empty());
}

#[tokio::test]
async fn cache_clear_forces_fresh_dispatch() {
    let mock = ScriptedProvider::ok("solo", "cached reply");
    let calls = mock.call_counter();
    let engine = build_test_engine(vec![Arc::new(mock)], vec![pipeline("p", &["solo"])]);
    let server = GatewayTestServer::start(engine).await;
    let client = reqwest::Client::new();

    let execute = || {
        client
            .post(server.url("/api/ai/execute"))
            .json(&json!({
                "pipeline": "p",
                "messages": [{"role": "user", "content": "hi"}]
            }))
            .send()
    };

    execute().await.unwrap();
    execute().await.unwrap();
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let cleared: Value = client
        .post(server.url("/api/ai/cache/clear"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["cleared"], 1);

    execute().await.unwrap();
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn runtime_pipeline_registration_is_immediately_servable() {
    let server = GatewayTestServer::start(demo_engine()).await;
    let client = reqwest::Client::new();

    let registered = client
        .post(server.url("/api/ai/pipelines"))
        .json(&json!({
            "id": "ocr-cleanup",
            "provider_preference": ["steady"],
            "system_prompt": "Clean up OCR text.",
            "filters": {"post_process": ["strip-reasoning"]}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(registered.status(), StatusCode::CREATED);

    let response = client
        .post(server.url("/api/ai/execute"))
        .json(&json!({
            "pipeline": "ocr-cleanup",
            "messages": [{"role": "user", "content": "T4NK LVL 42%"}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["provider"], "steady");
}

#[tokio::test]
async fn registering_invalid_pipeline_is_unprocessable() {
    let server = GatewayTestServer::start(demo_engine()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/ai/pipelines"))
        .json(&json!({
            "id": "broken",
            "provider_preference": ["no-such-provider"]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("no-such-provider"));
}
