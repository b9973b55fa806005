use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pushlite_delivery::{
    CallbackNotifier, CallbackNotifierConfig, DeliveryQueue, DeliveryQueueError,
    ImageResolvePolicy, PushDeliveryStats, PushDispatchContext, PushDispatcherConfig,
    PushMessageSender,
};
use serde_json::json;
use tokio::net::TcpListener;

mod admission_runtime;
mod auth_runtime;
mod endpoints;
mod request_validation;
mod server_bootstrap;
mod status_runtime;
mod types;

use admission_runtime::{PushAdmissionRejection, PushAdmissionRuntimeState};
use auth_runtime::authorize_push_request;
use endpoints::{HEALTH_ENDPOINT, SEND_ENDPOINT, STATUS_ENDPOINT};
use request_validation::admit_push_request;
use status_runtime::handle_push_gateway_status;
use types::{PushGatewayApiError, PushHealthResponse, PushSendResponse};

pub use server_bootstrap::{
    run_push_gateway_server, start_push_gateway_server, PushGatewayServerHandle,
};

#[derive(Clone)]
/// Public struct `PushGatewayServerConfig` used across pushlite components.
pub struct PushGatewayServerConfig {
    pub bind: String,
    pub auth_token: String,
    /// Session identifier every admitted job is delivered to.
    pub target: String,
    pub health_requires_auth: bool,
    pub max_body_bytes: usize,
    pub image_policy: ImageResolvePolicy,
    /// Pending-job bound; `0` means unbounded.
    pub queue_capacity: usize,
    pub dispatcher: PushDispatcherConfig,
    pub callback: CallbackNotifierConfig,
    pub sender: Arc<dyn PushMessageSender>,
}

struct PushGatewayServerState {
    config: PushGatewayServerConfig,
    queue: Arc<DeliveryQueue>,
    stats: Arc<PushDeliveryStats>,
    notifier: CallbackNotifier,
    admission_runtime: Arc<Mutex<PushAdmissionRuntimeState>>,
}

impl PushGatewayServerState {
    fn new(config: PushGatewayServerConfig) -> Result<Self> {
        let stats = Arc::new(PushDeliveryStats::default());
        let notifier = CallbackNotifier::new(config.callback, Arc::clone(&stats))
            .context("failed to initialize callback notifier")?;
        Ok(Self {
            queue: Arc::new(DeliveryQueue::new(config.queue_capacity)),
            config,
            stats,
            notifier,
            admission_runtime: Arc::new(Mutex::new(PushAdmissionRuntimeState::default())),
        })
    }

    fn dispatch_context(&self) -> PushDispatchContext {
        PushDispatchContext {
            sender: Arc::clone(&self.config.sender),
            notifier: self.notifier.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    fn record_rejection(&self, rejection: PushAdmissionRejection) {
        if let Ok(mut runtime) = self.admission_runtime.lock() {
            runtime.record_rejection(rejection);
        }
    }

    fn record_accepted(&self) {
        if let Ok(mut runtime) = self.admission_runtime.lock() {
            runtime.record_accepted();
        }
    }
}

async fn handle_push_send(
    State(state): State<Arc<PushGatewayServerState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if let Err(error) = authorize_push_request(&state, &headers) {
        return error.into_response();
    }

    let body = match to_bytes(body, state.config.max_body_bytes).await {
        Ok(body) => body,
        Err(_) => {
            state.record_rejection(PushAdmissionRejection::Validation("payload_too_large"));
            return PushGatewayApiError::payload_too_large(format!(
                "request body exceeds {} bytes",
                state.config.max_body_bytes
            ))
            .into_response();
        }
    };

    let job = match admit_push_request(&body, &state.config) {
        Ok(job) => job,
        Err(error) => {
            state.record_rejection(PushAdmissionRejection::Validation(error.code));
            tracing::warn!(code = error.code, reason = %error.message, "push request rejected");
            return error.into_response();
        }
    };

    let message_id = job.message_id().to_string();
    let has_callback = job.callback_url().is_some();
    match state.queue.enqueue(job) {
        Ok(queue_size) => {
            state.record_accepted();
            tracing::info!(
                message_id = message_id.as_str(),
                queue_size,
                has_callback,
                "push message queued"
            );
            (
                StatusCode::OK,
                Json(PushSendResponse {
                    status: "queued",
                    message_id,
                    queue_size,
                }),
            )
                .into_response()
        }
        Err(error) => {
            let api_error = match error {
                DeliveryQueueError::Full { .. } => PushGatewayApiError::queue_full(error.to_string()),
                DeliveryQueueError::Closed => PushGatewayApiError::shutting_down(),
            };
            state.record_rejection(PushAdmissionRejection::Capacity(api_error.code));
            tracing::warn!(error = %error, "push message not queued");
            api_error.into_response()
        }
    }
}

async fn handle_push_health(
    State(state): State<Arc<PushGatewayServerState>>,
    headers: HeaderMap,
) -> Response {
    if state.config.health_requires_auth {
        if let Err(error) = authorize_push_request(&state, &headers) {
            return error.into_response();
        }
    }
    (
        StatusCode::OK,
        Json(PushHealthResponse {
            status: "ok",
            queue_size: state.queue.size(),
        }),
    )
        .into_response()
}
