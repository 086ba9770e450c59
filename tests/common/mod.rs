//! Shared test utilities and fixtures
//!
//! A wiremock server stands in for the control plane.

#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ferrule_engine::RuntimeEnv;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const NEXT: &str = "/2018-06-01/runtime/invocation/next";
pub const REGISTER: &str = "/2020-01-01/extension/register";
pub const EVENT_NEXT: &str = "/2020-01-01/extension/event/next";

/// Deadline one minute out, in epoch milliseconds.
pub fn future_deadline_ms() -> String {
    (SystemTime::now() + Duration::from_secs(60))
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis()
        .to_string()
}

pub fn env_for(server: &MockServer) -> RuntimeEnv {
    let mut env = RuntimeEnv::new(server.address().to_string());
    env.function_name = Some("integration".to_string());
    env.function_version = Some("$LATEST".to_string());
    env
}

/// Serve one invocation from `/next`.
///
/// Queued invocations are handed out in mount order. Once all are used up
/// the server answers 404, which stops the loop with a fetch error.
pub async fn queue_invocation(server: &MockServer, request_id: &str, payload: &str) {
    Mock::given(method("GET"))
        .and(path(NEXT))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("lambda-runtime-aws-request-id", request_id)
                .insert_header("lambda-runtime-deadline-ms", future_deadline_ms().as_str())
                .insert_header(
                    "lambda-runtime-invoked-function-arn",
                    "arn:aws:lambda:us-east-1:000000000000:function:integration",
                )
                .set_body_string(payload),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// `/next` that never answers within a test.
pub async fn mount_idle_next(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(NEXT))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(60)))
        .mount(server)
        .await;
}

/// Accept every success and failure report.
pub async fn accept_reports(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/2018-06-01/runtime/invocation/[^/]+/(response|error)$"))
        .respond_with(ResponseTemplate::new(202))
        .mount(server)
        .await;
}

pub async fn accept_registration(server: &MockServer, extension_id: &str) {
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .respond_with(
            ResponseTemplate::new(200).insert_header("lambda-extension-identifier", extension_id),
        )
        .mount(server)
        .await;
}

pub async fn mount_idle_events(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(EVENT_NEXT))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(60)))
        .mount(server)
        .await;
}

/// Report requests in arrival order, as `(path, json body)`.
pub async fn reports(server: &MockServer) -> Vec<(String, serde_json::Value)> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path().starts_with("/2018-06-01/"))
        .map(|r| {
            let body = serde_json::from_slice(&r.body).unwrap_or(serde_json::Value::Null);
            (r.url.path().to_string(), body)
        })
        .collect()
}

/// Number of requests made to `route`.
pub async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}
