//! End-to-end: the event queue over `reqwest` against a real long-poll
//! endpoint served by `axum`.

#![allow(
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::unwrap_used,
    missing_docs,
    unreachable_pub
)]

use std::{
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use grid_core::{Dispatcher, MemoryTemplates};
use grid_event_queue::{
    Capability, CapabilityPost, EventQueueClient, EventQueueRole, EventQueueState,
    capability::PAYLOAD_CONTENT_TYPE, error::CapabilityError, http_client::ReqwestHttpClient,
};
use serde_json::{Value, json};
use testresult::TestResult;
use tokio::net::TcpListener;
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    static ONCE: OnceLock<()> = OnceLock::new();
    ONCE.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Serves one batch of events, then behaves like a proxy whose hold expired.
#[derive(Debug, Default)]
struct LongPollServer {
    requests: Mutex<Vec<Value>>,
}

async fn event_queue_get(
    State(server): State<Arc<LongPollServer>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) != Some(PAYLOAD_CONTENT_TYPE) {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    }

    let Ok(request) = serde_json::from_slice::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let seen = {
        let mut requests = server.requests.lock().unwrap();
        requests.push(request.clone());
        requests.len()
    };

    if request.get("done").is_some() {
        return StatusCode::OK.into_response();
    }

    if seen == 1 {
        let reply = json!({
            "id": 1,
            "events": [{
                "message": "EstablishAgentCommunication",
                "body": {"agent-id": "a1", "sim-ip-and-port": "127.0.0.1:13005"}
            }]
        });
        return (
            [(header::CONTENT_TYPE, "application/llsd+json")],
            reply.to_string(),
        )
            .into_response();
    }

    StatusCode::BAD_GATEWAY.into_response()
}

async fn held_forever() -> Response {
    tokio::time::sleep(Duration::from_secs(60)).await;
    StatusCode::OK.into_response()
}

async fn serve(server: Arc<LongPollServer>) -> TestResult<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/cap/event_queue", post(event_queue_get))
        .route("/cap/held", post(held_forever))
        .with_state(server);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "test server failed");
        }
    });

    Ok(Url::parse(&format!("http://{addr}/cap/event_queue"))?)
}

#[tokio::test]
async fn polls_dispatches_and_acknowledges_over_http() -> TestResult {
    init_tracing();
    let server = Arc::new(LongPollServer::default());
    let url = serve(server.clone()).await?;

    let capability = Capability::new(
        "EventQueueGet",
        url,
        ReqwestHttpClient::with_timeout(REQUEST_TIMEOUT)?,
    );
    let dispatcher = Dispatcher::new();
    let inbox = dispatcher.subscribe("EstablishAgentCommunication");

    let eq = EventQueueClient::builder(
        EventQueueRole::Region,
        capability,
        MemoryTemplates::new(),
        dispatcher,
    )
    .host("127.0.0.1:13005".parse()?)
    .poll_interval(POLL_INTERVAL)
    .build();

    let handle = eq.start()?;

    let message = tokio::time::timeout(REQUEST_TIMEOUT, inbox.recv())
        .await?
        .expect("subscription open");
    assert_eq!(message.event_queue_id(), Some(1));
    assert_eq!(
        message.variable("Message_Data", 0, "agent-id"),
        Some(&json!("a1"))
    );

    // A 502 is an empty poll, not a failure.
    tokio::time::sleep(POLL_INTERVAL * 4).await;
    assert!(eq.is_running());
    assert_eq!(eq.last_event_id(), Some(1));

    assert!(eq.stop()?.wait().await);
    handle.await?;
    assert_eq!(eq.state(), EventQueueState::Stopped);

    let requests = server.requests.lock().unwrap().clone();
    assert_eq!(requests[0], json!({}));
    assert!(requests[1..requests.len() - 1]
        .iter()
        .all(|r| *r == json!({"ack": 1})));
    assert_eq!(requests.last(), Some(&json!({"ack": 1, "done": true})));
    Ok(())
}

#[tokio::test]
async fn request_past_its_timeout_is_a_request_error() -> TestResult {
    init_tracing();
    let url = serve(Arc::new(LongPollServer::default())).await?;
    let held = url.join("held")?;

    let capability = Capability::new(
        "EventQueueGet",
        held,
        ReqwestHttpClient::with_timeout(Duration::from_millis(200))?,
    );

    let err = tokio::time::timeout(REQUEST_TIMEOUT, capability.post(json!({})))
        .await?
        .expect_err("held past the client timeout");
    match err {
        CapabilityError::Request(detail) => assert!(detail.contains("timed out"), "{detail}"),
        other => panic!("expected a request error, got {other}"),
    }
    Ok(())
}
