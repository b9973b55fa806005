use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::CliPushSenderMode;

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "pushlite",
    about = "Authenticated HTTP push gateway with asynchronous delivery and outcome callbacks",
    version
)]
/// Public struct `Cli` used across pushlite components.
pub struct Cli {
    #[arg(
        long,
        env = "PUSHLITE_BIND",
        default_value = "0.0.0.0:9966",
        help = "Socket address the push gateway listens on"
    )]
    pub bind: String,

    #[arg(
        long = "auth-token",
        env = "PUSHLITE_AUTH_TOKEN",
        hide_env_values = true,
        help = "Bearer token required on /send. A random token is generated and printed when omitted"
    )]
    pub auth_token: Option<String>,

    #[arg(
        long = "auth-token-file",
        env = "PUSHLITE_AUTH_TOKEN_FILE",
        help = "File holding the bearer token when --auth-token is omitted. A generated token is written here and reused on restart"
    )]
    pub auth_token_file: Option<PathBuf>,

    #[arg(
        long,
        env = "PUSHLITE_TARGET",
        help = "Chat session identifier (umo) every admitted message is delivered to"
    )]
    pub target: String,

    #[arg(
        long = "queue-capacity",
        env = "PUSHLITE_QUEUE_CAPACITY",
        default_value_t = 1_024,
        help = "Maximum pending messages before /send answers 503 (0 = unbounded)"
    )]
    pub queue_capacity: usize,

    #[arg(
        long = "dispatcher-workers",
        env = "PUSHLITE_DISPATCHER_WORKERS",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Concurrent dispatcher workers. 1 keeps strict FIFO delivery order"
    )]
    pub dispatcher_workers: usize,

    #[arg(
        long = "send-timeout-ms",
        env = "PUSHLITE_SEND_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Upper bound for a single send attempt in milliseconds (0 = no bound)"
    )]
    pub send_timeout_ms: u64,

    #[arg(
        long = "callback-timeout-ms",
        env = "PUSHLITE_CALLBACK_TIMEOUT_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each outcome callback POST in milliseconds"
    )]
    pub callback_timeout_ms: u64,

    #[arg(
        long = "callback-max-in-flight",
        env = "PUSHLITE_CALLBACK_MAX_IN_FLIGHT",
        default_value_t = 16,
        help = "Maximum concurrently running outcome callbacks (0 = post inline from the dispatcher)"
    )]
    pub callback_max_in_flight: usize,

    #[arg(
        long = "health-requires-auth",
        env = "PUSHLITE_HEALTH_REQUIRES_AUTH",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Require the bearer token on /health as well"
    )]
    pub health_requires_auth: bool,

    #[arg(
        long = "max-body-bytes",
        env = "PUSHLITE_MAX_BODY_BYTES",
        default_value_t = 16 * 1024 * 1024,
        value_parser = parse_positive_usize,
        help = "Maximum accepted /send request body size in bytes"
    )]
    pub max_body_bytes: usize,

    #[arg(
        long = "max-image-bytes",
        env = "PUSHLITE_MAX_IMAGE_BYTES",
        default_value_t = 10 * 1024 * 1024,
        value_parser = parse_positive_usize,
        help = "Maximum decoded size of an inline (base64 or data URI) image in bytes"
    )]
    pub max_image_bytes: usize,

    #[arg(
        long = "shutdown-drain-timeout-ms",
        env = "PUSHLITE_SHUTDOWN_DRAIN_TIMEOUT_MS",
        default_value_t = 5_000,
        help = "How long shutdown waits for pending deliveries before dropping them"
    )]
    pub shutdown_drain_timeout_ms: u64,

    #[arg(
        long = "sender-mode",
        env = "PUSHLITE_SENDER_MODE",
        value_enum,
        default_value_t = CliPushSenderMode::Http,
        help = "Send primitive used by dispatcher workers"
    )]
    pub sender_mode: CliPushSenderMode,

    #[arg(
        long = "backend-url",
        env = "PUSHLITE_BACKEND_URL",
        help = "Platform bridge endpoint receiving message chains (required for --sender-mode=http)"
    )]
    pub backend_url: Option<String>,

    #[arg(
        long = "backend-token",
        env = "PUSHLITE_BACKEND_TOKEN",
        hide_env_values = true,
        help = "Optional bearer token sent to --backend-url"
    )]
    pub backend_token: Option<String>,

    #[arg(
        long = "backend-timeout-ms",
        env = "PUSHLITE_BACKEND_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "HTTP client timeout for backend requests in milliseconds"
    )]
    pub backend_timeout_ms: u64,
}
