//! Endpoint path constants for the push gateway.

pub(super) const SEND_ENDPOINT: &str = "/send";
pub(super) const HEALTH_ENDPOINT: &str = "/health";
pub(super) const STATUS_ENDPOINT: &str = "/status";
