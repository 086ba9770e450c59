//! The invocation loop end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ferrule_engine::{Context, Options, RuntimeError};
use serde::{Deserialize, Serialize};
use wiremock::MockServer;

use crate::common::{NEXT, accept_reports, env_for, hits, queue_invocation, reports};

#[derive(Debug, Deserialize)]
struct Greeting {
    name: String,
}

#[derive(Debug, Serialize)]
struct Reply {
    message: String,
}

async fn greet(_ctx: Context, req: Greeting) -> Result<Reply, String> {
    if req.name.is_empty() {
        return Err("name must not be empty".to_string());
    }
    Ok(Reply {
        message: format!("hello {}", req.name),
    })
}

#[tokio::test]
async fn replies_then_stops_when_fetch_fails() {
    let server = MockServer::start().await;
    queue_invocation(&server, "req-1", r#"{"name":"world"}"#).await;
    accept_reports(&server).await;

    let err = ferrule_engine::run(greet, Options::new(), env_for(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Fetch(_)), "got {err:?}");

    let reports = reports(&server).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].0, "/2018-06-01/runtime/invocation/req-1/response");
    assert_eq!(reports[0].1, serde_json::json!({ "message": "hello world" }));
}

#[tokio::test]
async fn request_id_reaches_the_handler() {
    async fn echo_id(ctx: Context, _input: serde_json::Value) -> Result<serde_json::Value, String> {
        Ok(serde_json::json!({
            "requestId": ctx.request_id().as_str(),
            "arn": ctx.invoked_function_arn(),
        }))
    }

    let server = MockServer::start().await;
    queue_invocation(&server, "abc-123", "{}").await;
    accept_reports(&server).await;

    let _ = ferrule_engine::run(echo_id, Options::new(), env_for(&server)).await;

    let reports = reports(&server).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].1["requestId"], "abc-123");
    assert_eq!(
        reports[0].1["arn"],
        "arn:aws:lambda:us-east-1:000000000000:function:integration"
    );
}

#[tokio::test]
async fn malformed_input_is_reported_and_loop_continues() {
    let server = MockServer::start().await;
    queue_invocation(&server, "req-1", "not json").await;
    queue_invocation(&server, "req-2", r#"{"name":"again"}"#).await;
    accept_reports(&server).await;

    let err = ferrule_engine::run(greet, Options::new(), env_for(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Fetch(_)), "got {err:?}");

    let reports = reports(&server).await;
    assert_eq!(reports.len(), 2);

    let (path, body) = &reports[0];
    assert_eq!(path, "/2018-06-01/runtime/invocation/req-1/error");
    assert_eq!(body["errorType"], "Runtime.UnmarshalError");
    assert!(body.get("stackTrace").is_none());

    assert_eq!(reports[1].0, "/2018-06-01/runtime/invocation/req-2/response");
    assert_eq!(hits(&server, NEXT).await, 3);
}

#[tokio::test]
async fn handler_error_does_not_stop_the_loop() {
    let server = MockServer::start().await;
    queue_invocation(&server, "req-1", r#"{"name":""}"#).await;
    queue_invocation(&server, "req-2", r#"{"name":"b"}"#).await;
    accept_reports(&server).await;

    let _ = ferrule_engine::run(greet, Options::new(), env_for(&server)).await;

    let reports = reports(&server).await;
    assert_eq!(reports.len(), 2);
    assert_eq!(
        reports[0].1,
        serde_json::json!({
            "errorType": "Runtime.HandlerError",
            "errorMessage": "name must not be empty",
        })
    );
    assert_eq!(reports[1].1, serde_json::json!({ "message": "hello b" }));
}

#[tokio::test]
async fn panic_is_reported_once_and_stops_the_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let explode = move |_ctx: Context, input: Vec<u32>| {
        counted.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<u32, String>(input[input.len()]) }
    };

    let server = MockServer::start().await;
    queue_invocation(&server, "req-1", "[1,2,3]").await;
    queue_invocation(&server, "req-2", "[4]").await;
    accept_reports(&server).await;

    let err = ferrule_engine::run(explode, Options::new(), env_for(&server))
        .await
        .unwrap_err();
    assert!(err.is_fatal_panic());
    let RuntimeError::HandlerPanicked { request_id, record } = err else {
        panic!("expected HandlerPanicked");
    };
    assert_eq!(request_id.as_str(), "req-1");
    assert_eq!(record.error_type, "Runtime.Panic.String");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(hits(&server, NEXT).await, 1);

    let reports = reports(&server).await;
    assert_eq!(reports.len(), 1);
    let (path, body) = &reports[0];
    assert_eq!(path, "/2018-06-01/runtime/invocation/req-1/error");
    assert!(
        body["errorMessage"]
            .as_str()
            .unwrap()
            .contains("index out of bounds")
    );
    let frames = body["stackTrace"].as_array().unwrap();
    assert!(!frames.is_empty());
    assert!(
        frames
            .iter()
            .any(|f| f["path"].as_str().unwrap().ends_with("invocation_loop.rs")),
        "no frame from the handler: {frames:?}"
    );
    assert_no_harness_frames(frames);
}

#[tokio::test]
async fn panic_before_the_future_is_built_keeps_harness_frames_out() {
    let explode = |_ctx: Context, input: Vec<u32>| {
        let value = input[input.len()];
        async move { Ok::<u32, String>(value) }
    };

    let server = MockServer::start().await;
    queue_invocation(&server, "req-1", "[1]").await;
    accept_reports(&server).await;

    let err = ferrule_engine::run(explode, Options::new(), env_for(&server))
        .await
        .unwrap_err();
    assert!(err.is_fatal_panic());

    let reports = reports(&server).await;
    assert_eq!(reports.len(), 1);
    let frames = reports[0].1["stackTrace"].as_array().unwrap();
    assert!(!frames.is_empty());
    assert_no_harness_frames(frames);
}

fn assert_no_harness_frames(frames: &[serde_json::Value]) {
    for frame in frames {
        let label = frame["label"].as_str().unwrap();
        let path = frame["path"].as_str().unwrap();
        assert!(!label.contains("ferrule_engine"), "harness frame reported: {frame}");
        assert!(!path.starts_with("engine/src/"), "harness frame reported: {frame}");
    }
}
