use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use pushlite_delivery::{
    CallbackNotifierConfig, HttpPushMessageSender, HttpPushSenderConfig, ImageResolvePolicy,
    PushDispatcherConfig,
};
use pushlite_gateway::{start_push_gateway_server, PushGatewayServerConfig};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const TOKEN: &str = "integration-secret";
const PNG_SIGNATURE_BASE64: &str = "iVBORw0KGgo=";

/// Stands in for both the platform bridge and the caller's callback endpoint.
#[derive(Clone, Default)]
struct CaptureServerState {
    bridge_payloads: Arc<Mutex<Vec<Value>>>,
    callbacks: Arc<Mutex<Vec<Value>>>,
}

impl CaptureServerState {
    fn bridge_payloads(&self) -> Vec<Value> {
        self.bridge_payloads
            .lock()
            .map(|payloads| payloads.clone())
            .unwrap_or_default()
    }

    fn callbacks(&self) -> Vec<Value> {
        self.callbacks
            .lock()
            .map(|callbacks| callbacks.clone())
            .unwrap_or_default()
    }
}

async fn capture_bridge_send(
    State(state): State<CaptureServerState>,
    Json(payload): Json<Value>,
) -> StatusCode {
    let rejected = payload["chain"][0]["text"] == "reject me";
    if let Ok(mut payloads) = state.bridge_payloads.lock() {
        payloads.push(payload);
    }
    if rejected {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn capture_callback(
    State(state): State<CaptureServerState>,
    Json(payload): Json<Value>,
) -> StatusCode {
    if let Ok(mut callbacks) = state.callbacks.lock() {
        callbacks.push(payload);
    }
    StatusCode::NO_CONTENT
}

async fn spawn_capture_server(
    state: CaptureServerState,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind capture listener")?;
    let addr = listener.local_addr().context("resolve capture addr")?;
    let app = Router::new()
        .route("/bridge/send", post(capture_bridge_send))
        .route("/callback", post(capture_callback))
        .with_state(state);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok((addr, handle))
}

fn gateway_config(capture_addr: SocketAddr, drain_timeout: Duration) -> PushGatewayServerConfig {
    let sender = HttpPushMessageSender::new(HttpPushSenderConfig {
        endpoint: format!("http://{capture_addr}/bridge/send"),
        auth_token: Some("bridge-secret".to_string()),
        timeout_ms: 2_000,
    })
    .expect("http sender");
    PushGatewayServerConfig {
        bind: "127.0.0.1:0".to_string(),
        auth_token: TOKEN.to_string(),
        target: "aiocqhttp:FriendMessage:10001".to_string(),
        health_requires_auth: false,
        max_body_bytes: 64 * 1024,
        image_policy: ImageResolvePolicy::default(),
        queue_capacity: 64,
        dispatcher: PushDispatcherConfig {
            workers: 1,
            send_timeout: Some(Duration::from_secs(5)),
            drain_timeout,
        },
        callback: CallbackNotifierConfig {
            timeout_ms: 2_000,
            max_in_flight: 4,
        },
        sender: Arc::new(sender),
    }
}

async fn send(client: &reqwest::Client, gateway: SocketAddr, body: Value) -> Value {
    let response = client
        .post(format!("http://{gateway}/send"))
        .bearer_auth(TOKEN)
        .json(&body)
        .send()
        .await
        .expect("send request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    response.json::<Value>().await.expect("send payload")
}

async fn wait_for<F>(description: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {description}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn integration_pipeline_delivers_message_chains_and_reports_outcomes() {
    let capture = CaptureServerState::default();
    let (capture_addr, capture_handle) = spawn_capture_server(capture.clone())
        .await
        .expect("spawn capture server");
    let gateway = start_push_gateway_server(gateway_config(capture_addr, Duration::from_secs(2)))
        .await
        .expect("start gateway");
    let client = reqwest::Client::new();
    let callback_url = format!("http://{capture_addr}/callback");

    let delivered = send(
        &client,
        gateway.local_addr(),
        json!({
            "content": "hello",
            "image": "https://example.com/cat.png",
            "callback_url": callback_url,
        }),
    )
    .await;
    let rejected = send(
        &client,
        gateway.local_addr(),
        json!({"content": "reject me", "callback_url": callback_url}),
    )
    .await;
    let not_an_image = send(
        &client,
        gateway.local_addr(),
        json!({"image": "aGVsbG8=", "callback_url": callback_url}),
    )
    .await;
    let silent = send(
        &client,
        gateway.local_addr(),
        json!({"image": PNG_SIGNATURE_BASE64}),
    )
    .await;
    assert_eq!(delivered["status"], "queued");
    assert_eq!(not_an_image["status"], "queued");

    wait_for("three callbacks", || capture.callbacks().len() == 3).await;
    wait_for("three bridge sends", || capture.bridge_payloads().len() == 3).await;
    gateway.shutdown().await.expect("gateway shutdown");

    let payloads = capture.bridge_payloads();
    assert_eq!(
        payloads[0],
        json!({
            "target": "aiocqhttp:FriendMessage:10001",
            "chain": [
                {"type": "plain", "text": "hello"},
                {"type": "image", "url": "https://example.com/cat.png"},
            ]
        })
    );
    assert_eq!(payloads.len(), 3);
    assert_eq!(
        payloads[2]["chain"],
        json!([{"type": "image", "base64": PNG_SIGNATURE_BASE64, "mime_type": "image/png"}])
    );
    assert!(payloads
        .iter()
        .all(|payload| payload["chain"][0]["base64"] != "aGVsbG8="));

    let callbacks = capture.callbacks();
    let callback_for = |response: &Value| {
        callbacks
            .iter()
            .find(|callback| callback["message_id"] == response["message_id"])
            .cloned()
            .expect("callback for message")
    };
    let delivered_id = delivered["message_id"].clone();
    assert_eq!(
        callback_for(&delivered),
        json!({"message_id": delivered_id, "success": true})
    );
    let rejected_callback = callback_for(&rejected);
    assert_eq!(rejected_callback["success"], false);
    assert!(rejected_callback["error"]
        .as_str()
        .is_some_and(|error| error.starts_with("backend responded with status 503")));
    let not_an_image_id = not_an_image["message_id"].clone();
    assert_eq!(
        callback_for(&not_an_image),
        json!({
            "message_id": not_an_image_id,
            "success": false,
            "error": "unsupported image format",
        })
    );
    assert!(callbacks
        .iter()
        .all(|callback| callback["message_id"] != silent["message_id"]));

    capture_handle.abort();
}

#[tokio::test]
async fn integration_single_worker_preserves_admission_order() {
    let capture = CaptureServerState::default();
    let (capture_addr, capture_handle) = spawn_capture_server(capture.clone())
        .await
        .expect("spawn capture server");
    let gateway = start_push_gateway_server(gateway_config(capture_addr, Duration::from_secs(2)))
        .await
        .expect("start gateway");
    let client = reqwest::Client::new();

    for index in 0..15 {
        send(
            &client,
            gateway.local_addr(),
            json!({"content": format!("ordered-{index}")}),
        )
        .await;
    }
    wait_for("fifteen bridge sends", || capture.bridge_payloads().len() == 15).await;
    gateway.shutdown().await.expect("gateway shutdown");

    let texts = capture
        .bridge_payloads()
        .iter()
        .map(|payload| payload["chain"][0]["text"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    let expected = (0..15)
        .map(|index| format!("ordered-{index}"))
        .collect::<Vec<_>>();
    assert_eq!(texts, expected);

    capture_handle.abort();
}

#[tokio::test]
async fn integration_shutdown_drains_pending_jobs_before_exit() {
    let capture = CaptureServerState::default();
    let (capture_addr, capture_handle) = spawn_capture_server(capture.clone())
        .await
        .expect("spawn capture server");
    let gateway = start_push_gateway_server(gateway_config(capture_addr, Duration::from_secs(5)))
        .await
        .expect("start gateway");
    let client = reqwest::Client::new();
    let addr = gateway.local_addr();
    let callback_url = format!("http://{capture_addr}/callback");

    let mut message_ids = Vec::new();
    for index in 0..5 {
        let response = send(
            &client,
            addr,
            json!({"content": format!("drain-{index}"), "callback_url": callback_url}),
        )
        .await;
        message_ids.push(response["message_id"].clone());
    }
    gateway.shutdown().await.expect("gateway shutdown");

    assert_eq!(capture.bridge_payloads().len(), 5);
    let callbacks = capture.callbacks();
    assert_eq!(callbacks.len(), 5);
    for message_id in &message_ids {
        assert!(callbacks
            .iter()
            .any(|callback| &callback["message_id"] == message_id && callback["success"] == true));
    }
    let late = reqwest::Client::new()
        .post(format!("http://{addr}/send"))
        .bearer_auth(TOKEN)
        .json(&json!({"content": "late"}))
        .send()
        .await;
    assert!(late.is_err(), "listener should be closed after shutdown");

    capture_handle.abort();
}
