//! `POST /send` body validation and job admission.
use pushlite_delivery::{resolve_push_image, PushJob, PushJobError, PushMessage};
use serde_json::Value;
use url::Url;

use super::types::PushSendRequest;
use super::*;

pub(super) fn parse_push_send_request(body: &[u8]) -> Result<PushSendRequest, PushGatewayApiError> {
    let value = serde_json::from_slice::<Value>(body).map_err(|error| {
        PushGatewayApiError::bad_request("malformed_json", format!("invalid JSON body: {error}"))
    })?;
    if !value.is_object() {
        return Err(PushGatewayApiError::bad_request(
            "malformed_json",
            "request body must be a JSON object",
        ));
    }
    serde_json::from_value::<PushSendRequest>(value).map_err(|error| {
        PushGatewayApiError::bad_request("malformed_json", format!("invalid request field: {error}"))
    })
}

pub(super) fn validate_callback_url(raw: Option<&str>) -> Result<Option<String>, PushGatewayApiError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    let url = Url::parse(raw).map_err(|error| {
        PushGatewayApiError::bad_request(
            "invalid_callback_url",
            format!("callback_url is not a valid absolute url: {error}"),
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(PushGatewayApiError::bad_request(
            "invalid_callback_url",
            "callback_url must be an absolute http or https url",
        ));
    }
    Ok(Some(url.to_string()))
}

/// Turns a raw request body into an admitted job for the configured target.
pub(super) fn admit_push_request(
    body: &[u8],
    config: &PushGatewayServerConfig,
) -> Result<PushJob, PushGatewayApiError> {
    let request = parse_push_send_request(body)?;
    let content = request.content.filter(|content| !content.is_empty());
    let raw_image = request.image.unwrap_or_default();
    if content.is_none() && raw_image.trim().is_empty() {
        return Err(PushGatewayApiError::bad_request(
            "missing_content",
            PushJobError::MissingContent.to_string(),
        ));
    }

    let image = resolve_push_image(&raw_image, config.image_policy)
        .map_err(|error| PushGatewayApiError::bad_request("invalid_image", error.to_string()))?;
    let callback_url = validate_callback_url(request.callback_url.as_deref())?;

    PushJob::admit(
        config.target.as_str(),
        PushMessage { content, image },
        callback_url,
    )
    .map_err(|error| match error {
        PushJobError::MissingContent => {
            PushGatewayApiError::bad_request("missing_content", error.to_string())
        }
        PushJobError::MissingTarget => PushGatewayApiError::internal(error.to_string()),
    })
}
