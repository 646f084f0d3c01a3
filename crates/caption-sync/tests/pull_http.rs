use std::io::Write;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use caption_sync::core::{PullRequest, PullResponse};
use caption_sync::transport::PullClient;
use caption_sync::{EngineConfig, OutputConfig};
use caption_sync_testkit::doubles::MemoryBackend;
use caption_sync_testkit::fixtures::EngineFixture;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn output(
    State(backend): State<MemoryBackend>,
    Json(request): Json<PullRequest>,
) -> Result<Json<PullResponse>, StatusCode> {
    backend
        .fetch(&request)
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

/// Serve `backend` at `/output`. Cancel the token to stop the server.
async fn serve(backend: MemoryBackend) -> (String, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/output", post(output))
        .with_state(backend);

    let shutdown = CancellationToken::new();
    let stopped = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stopped.cancelled().await })
            .await
            .unwrap();
    });

    (format!("http://{addr}/output"), shutdown)
}

fn fast_poll(endpoint: &str) -> EngineConfig {
    EngineConfig::default()
        .endpoint(endpoint)
        .poll_interval(Duration::from_millis(20))
        .pull_error_backoff(Duration::from_millis(100))
}

#[tokio::test]
async fn test_latest_final_reaches_target_once() {
    let backend = MemoryBackend::new();
    backend.publish("ai", "x", true);
    backend.publish("ai", "xy", true);
    let id = backend.publish("user", "hello", true);
    assert_eq!(id.get(), 3);

    let (endpoint, server) = serve(backend.clone()).await;
    let mut fixture = EngineFixture::with_config(fast_poll(&endpoint), &["user"]);
    fixture.engine.run().unwrap();

    let user = fixture.target("user");
    user.wait_for_renders(1, Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(user.texts(), vec!["hello"]);
    assert_eq!(fixture.engine.channel_cursor("user").unwrap().get(), 3);
    let (persisted_id, text) = fixture.engine.persisted("user").unwrap();
    assert_eq!((persisted_id.get(), text.as_str()), (3, "hello"));
    assert!(backend.request_count() > 1);

    fixture.engine.shutdown().await.unwrap();
    server.cancel();
}

#[tokio::test]
async fn test_outage_recovers() {
    let backend = MemoryBackend::new();
    backend.publish("user", "hel", false);

    let (endpoint, server) = serve(backend.clone()).await;
    let mut fixture = EngineFixture::with_config(fast_poll(&endpoint), &["user"]);
    fixture.engine.run().unwrap();

    let user = fixture.target("user");
    user.wait_for_renders(1, Duration::from_secs(5)).await;

    backend.fail_next(2);
    backend.publish("user", "hello", true);
    user.wait_for_renders(2, Duration::from_secs(5)).await;

    assert_eq!(user.texts(), vec!["（…hel…💭）", "hello"]);
    assert_eq!(fixture.engine.stats().failed_cycles, 2);
    assert!(fixture.engine.is_running());

    fixture.engine.shutdown().await.unwrap();
    server.cancel();
}

#[tokio::test]
async fn test_rejected_method_counts_failed_cycles() {
    let backend = MemoryBackend::new();
    backend.publish("user", "hello", true);

    let (endpoint, server) = serve(backend.clone()).await;
    let config = fast_poll(&endpoint).method("PUT");
    let mut fixture = EngineFixture::with_config(config, &["user"]);
    fixture.engine.run().unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(fixture.target("user").texts().is_empty());
    assert!(fixture.engine.stats().failed_cycles >= 1);
    assert_eq!(backend.request_count(), 0);

    fixture.engine.shutdown().await.unwrap();
    server.cancel();
}

#[tokio::test]
async fn test_config_file_drives_session() {
    let backend = MemoryBackend::new();
    backend.publish("ai", "reply", true);
    let (endpoint, server) = serve(backend).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"endpoint":"{endpoint}","channels":["ai"],"poll_interval_ms":20}}"#
    )
    .unwrap();

    let output = OutputConfig::load(file.path()).unwrap();
    assert_eq!(output.channels, vec!["ai"]);

    let mut fixture = EngineFixture::with_config(output.to_engine_config().unwrap(), &["ai"]);
    fixture.engine.run().unwrap();
    fixture
        .target("ai")
        .wait_for_renders(1, Duration::from_secs(5))
        .await;

    assert_eq!(fixture.target("ai").last_text().as_deref(), Some("reply"));
    fixture.engine.shutdown().await.unwrap();
    server.cancel();
}
