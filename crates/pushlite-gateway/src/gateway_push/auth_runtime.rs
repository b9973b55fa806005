//! Bearer-token auth gate for the push gateway.
use pushlite_core::bearer_token_matches;

use super::*;

fn bearer_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?;
    let raw = header.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Pure predicate over the request headers and the configured secret.
pub(super) fn push_request_is_authorized(headers: &HeaderMap, expected_token: &str) -> bool {
    let expected = expected_token.trim();
    if expected.is_empty() {
        return false;
    }
    bearer_token_from_headers(headers)
        .is_some_and(|observed| bearer_token_matches(&observed, expected))
}

pub(super) fn authorize_push_request(
    state: &PushGatewayServerState,
    headers: &HeaderMap,
) -> Result<(), PushGatewayApiError> {
    if push_request_is_authorized(headers, &state.config.auth_token) {
        return Ok(());
    }
    state.record_rejection(PushAdmissionRejection::Auth);
    Err(PushGatewayApiError::invalid_token())
}
