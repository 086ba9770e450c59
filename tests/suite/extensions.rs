//! Runtime loop with in-process extensions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ferrule_engine::{Context, InternalExtension, Options, RuntimeError, SHUTDOWN_BUDGET};
use tokio::sync::oneshot;
use wiremock::MockServer;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    REGISTER, accept_registration, env_for, hits, mount_idle_events, mount_idle_next,
};

async fn echo(_ctx: Context, input: serde_json::Value) -> Result<serde_json::Value, String> {
    Ok(input)
}

#[tokio::test]
async fn termination_runs_hooks_and_stops_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .and(header("lambda-extension-name", "Extension.Counter"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("lambda-extension-identifier", "ext-1"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_idle_events(&server).await;
    mount_idle_next(&server).await;

    let inits = Arc::new(AtomicUsize::new(0));
    let sigterms = Arc::new(AtomicUsize::new(0));
    let (budget_tx, budget_rx) = oneshot::channel();

    let init_count = Arc::clone(&inits);
    let sigterm_count = Arc::clone(&sigterms);
    let extension = InternalExtension::new("Extension.Counter")
        .on_init(move || -> Result<(), std::io::Error> {
            init_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .on_invoke(|_deadline, _event| async {})
        .on_sigterm(move |deadline| async move {
            sigterm_count.fetch_add(1, Ordering::SeqCst);
            let _ = budget_tx.send(deadline.remaining());
        });

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let runtime = tokio::spawn(ferrule_engine::run_until(
        echo,
        Options::new().with_extension(extension),
        env_for(&server),
        async move {
            let _ = stop_rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), runtime)
        .await
        .expect("runtime did not stop after termination")
        .unwrap();
    assert!(result.is_ok(), "got {result:?}");
    assert_eq!(sigterms.load(Ordering::SeqCst), 1);
    assert!(budget_rx.await.unwrap() <= SHUTDOWN_BUDGET);
}

#[tokio::test]
async fn failed_init_aborts_before_any_invocation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .respond_with(
            ResponseTemplate::new(200).insert_header("lambda-extension-identifier", "ext-1"),
        )
        .expect(0)
        .mount(&server)
        .await;
    mount_idle_next(&server).await;

    let extension = InternalExtension::new("Extension.Broken")
        .on_init(|| Err::<(), _>(std::io::Error::other("no config")));

    let err = ferrule_engine::run_until(
        echo,
        Options::new().with_extension(extension),
        env_for(&server),
        std::future::pending(),
    )
    .await
    .unwrap_err();

    let RuntimeError::ExtensionInit { name, source } = err else {
        panic!("expected ExtensionInit");
    };
    assert_eq!(name, "Extension.Broken");
    assert_eq!(source.to_string(), "no config");
    assert_eq!(hits(&server, crate::common::NEXT).await, 0);
}

#[tokio::test]
async fn extensions_register_in_order() {
    let server = MockServer::start().await;
    accept_registration(&server, "ext-any").await;
    mount_idle_events(&server).await;
    mount_idle_next(&server).await;

    let options = Options::new()
        .with_extension(InternalExtension::new("first"))
        .with_extension(InternalExtension::new("second"));
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let runtime = tokio::spawn(ferrule_engine::run_until(
        echo,
        options,
        env_for(&server),
        async move {
            let _ = stop_rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(200)).await;
    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), runtime)
        .await
        .expect("runtime did not stop after termination")
        .unwrap()
        .unwrap();

    let names: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == REGISTER)
        .filter_map(|r| {
            r.headers
                .get("lambda-extension-name")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}
