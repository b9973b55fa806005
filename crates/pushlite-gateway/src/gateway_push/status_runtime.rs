//! Gateway status endpoint runtime helpers.

use pushlite_core::duration_to_ms;

use super::*;

pub(super) async fn handle_push_gateway_status(
    State(state): State<Arc<PushGatewayServerState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(error) = authorize_push_request(&state, &headers) {
        return error.into_response();
    }

    let admission = match state.admission_runtime.lock() {
        Ok(runtime) => runtime.report(),
        Err(_) => {
            return PushGatewayApiError::internal("gateway admission state lock poisoned")
                .into_response();
        }
    };
    let dispatcher = &state.config.dispatcher;

    (
        StatusCode::OK,
        Json(json!({
            "queue": {
                "size": state.queue.size(),
                "capacity": state.queue.capacity(),
                "closed": state.queue.is_closed(),
            },
            "admission": admission,
            "delivery": state.stats.snapshot(),
            "callbacks": {
                "in_flight": state.notifier.in_flight(),
                "max_in_flight": state.notifier.max_in_flight(),
                "timeout_ms": state.config.callback.timeout_ms,
            },
            "dispatcher": {
                "workers": dispatcher.workers,
                "send_timeout_ms": dispatcher.send_timeout.map(duration_to_ms),
                "drain_timeout_ms": duration_to_ms(dispatcher.drain_timeout),
            },
            "gateway": {
                "send_endpoint": SEND_ENDPOINT,
                "health_endpoint": HEALTH_ENDPOINT,
                "status_endpoint": STATUS_ENDPOINT,
                "health_requires_auth": state.config.health_requires_auth,
                "max_body_bytes": state.config.max_body_bytes,
                "max_inline_image_bytes": state.config.image_policy.max_inline_bytes,
            },
        })),
    )
        .into_response()
}
