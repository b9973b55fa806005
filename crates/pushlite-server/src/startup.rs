//! Turns validated CLI flags into a running push gateway.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pushlite_cli::{validate_cli, Cli, CliPushSenderMode};
use pushlite_core::generate_bearer_token;
use pushlite_delivery::{
    CallbackNotifierConfig, DryRunPushMessageSender, HttpPushMessageSender, HttpPushSenderConfig,
    ImageResolvePolicy, PushDispatcherConfig, PushMessageSender,
};
use pushlite_gateway::{run_push_gateway_server, PushGatewayServerConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedAuthToken {
    pub(crate) token: String,
    pub(crate) generated: bool,
    pub(crate) persisted_to: Option<PathBuf>,
}

/// Picks the bearer token: the configured value, then a token stored in
/// `token_file`, then a fresh one (written to `token_file` when given).
pub(crate) fn resolve_auth_token(
    configured: Option<&str>,
    token_file: Option<&Path>,
) -> Result<ResolvedAuthToken> {
    if let Some(token) = non_blank(configured) {
        return Ok(ResolvedAuthToken {
            token: token.to_string(),
            generated: false,
            persisted_to: None,
        });
    }
    let Some(path) = token_file else {
        return Ok(ResolvedAuthToken {
            token: generate_bearer_token(),
            generated: true,
            persisted_to: None,
        });
    };

    if path.exists() {
        let stored = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read auth token file {}", path.display()))?;
        if let Some(token) = non_blank(Some(stored.as_str())) {
            return Ok(ResolvedAuthToken {
                token: token.to_string(),
                generated: false,
                persisted_to: None,
            });
        }
    }
    let token = generate_bearer_token();
    persist_auth_token(path, &token)?;
    Ok(ResolvedAuthToken {
        token,
        generated: true,
        persisted_to: Some(path.to_path_buf()),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|token| !token.is_empty())
}

fn persist_auth_token(path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, format!("{token}\n"))
        .with_context(|| format!("failed to write auth token file {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict {}", path.display()))?;
    }
    Ok(())
}

pub(crate) fn build_push_sender(cli: &Cli) -> Result<Arc<dyn PushMessageSender>> {
    match cli.sender_mode {
        CliPushSenderMode::DryRun => Ok(Arc::new(DryRunPushMessageSender)),
        CliPushSenderMode::Http => {
            let sender = HttpPushMessageSender::new(HttpPushSenderConfig {
                endpoint: cli.backend_url.clone().unwrap_or_default(),
                auth_token: cli.backend_token.clone(),
                timeout_ms: cli.backend_timeout_ms,
            })
            .context("failed to configure http push sender")?;
            Ok(Arc::new(sender))
        }
    }
}

pub(crate) fn build_push_gateway_config(
    cli: &Cli,
    auth_token: String,
) -> Result<PushGatewayServerConfig> {
    Ok(PushGatewayServerConfig {
        bind: cli.bind.clone(),
        auth_token,
        target: cli.target.trim().to_string(),
        health_requires_auth: cli.health_requires_auth,
        max_body_bytes: cli.max_body_bytes,
        image_policy: ImageResolvePolicy {
            max_inline_bytes: cli.max_image_bytes,
        },
        queue_capacity: cli.queue_capacity,
        dispatcher: PushDispatcherConfig {
            workers: cli.dispatcher_workers,
            send_timeout: (cli.send_timeout_ms > 0)
                .then(|| Duration::from_millis(cli.send_timeout_ms)),
            drain_timeout: Duration::from_millis(cli.shutdown_drain_timeout_ms),
        },
        callback: CallbackNotifierConfig {
            timeout_ms: cli.callback_timeout_ms,
            max_in_flight: cli.callback_max_in_flight,
        },
        sender: build_push_sender(cli)?,
    })
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    validate_cli(&cli)?;
    let auth = resolve_auth_token(cli.auth_token.as_deref(), cli.auth_token_file.as_deref())?;
    if auth.generated {
        println!("push gateway auth token generated: {}", auth.token);
    }
    if let Some(path) = auth.persisted_to.as_deref() {
        println!("push gateway auth token saved to {}", path.display());
    }
    let config = build_push_gateway_config(&cli, auth.token)?;
    tracing::info!(
        sender_mode = cli.sender_mode.as_str(),
        workers = config.dispatcher.workers,
        "starting push gateway"
    );
    run_push_gateway_server(config).await
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pushlite_core::GENERATED_TOKEN_LEN;
    use tempfile::tempdir;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["pushlite", "--target", " umo:1 "];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse cli")
    }

    #[test]
    fn unit_resolve_auth_token_prefers_configured_value() {
        let temp = tempdir().expect("tempdir");
        let token_file = temp.path().join("token");
        assert_eq!(
            resolve_auth_token(Some(" secret "), Some(&token_file)).expect("resolve"),
            ResolvedAuthToken {
                token: "secret".to_string(),
                generated: false,
                persisted_to: None,
            }
        );
        assert!(!token_file.exists());

        let generated = resolve_auth_token(Some("   "), None).expect("resolve");
        assert!(generated.generated);
        assert_eq!(generated.persisted_to, None);
        assert_eq!(generated.token.len(), GENERATED_TOKEN_LEN);
        let other = resolve_auth_token(None, None).expect("resolve");
        assert_ne!(other.token, generated.token);
    }

    #[test]
    fn regression_generated_token_survives_restart_via_token_file() {
        let temp = tempdir().expect("tempdir");
        let token_file = temp.path().join("state").join("auth-token");

        let first = resolve_auth_token(None, Some(&token_file)).expect("first start");
        assert!(first.generated);
        assert_eq!(first.persisted_to.as_deref(), Some(token_file.as_path()));
        let stored = std::fs::read_to_string(&token_file).expect("token file");
        assert_eq!(stored.trim(), first.token);

        let restarted = resolve_auth_token(None, Some(&token_file)).expect("restart");
        assert_eq!(restarted.token, first.token);
        assert!(!restarted.generated);
        assert_eq!(restarted.persisted_to, None);
    }

    #[test]
    fn regression_blank_token_file_is_replaced_with_generated_token() {
        let temp = tempdir().expect("tempdir");
        let token_file = temp.path().join("auth-token");
        std::fs::write(&token_file, "  \n").expect("seed blank file");

        let resolved = resolve_auth_token(None, Some(&token_file)).expect("resolve");
        assert!(resolved.generated);
        let stored = std::fs::read_to_string(&token_file).expect("token file");
        assert_eq!(stored.trim(), resolved.token);
    }

    #[test]
    fn functional_build_push_gateway_config_maps_cli_flags() {
        let cli = parse(&[
            "--sender-mode",
            "dry-run",
            "--send-timeout-ms",
            "0",
            "--dispatcher-workers",
            "3",
            "--max-image-bytes",
            "2048",
            "--callback-max-in-flight",
            "0",
        ]);
        let config = build_push_gateway_config(&cli, "secret".to_string()).expect("config");
        assert_eq!(config.target, "umo:1");
        assert_eq!(config.auth_token, "secret");
        assert_eq!(config.dispatcher.workers, 3);
        assert_eq!(config.dispatcher.send_timeout, None);
        assert_eq!(config.dispatcher.drain_timeout, Duration::from_secs(5));
        assert_eq!(config.image_policy.max_inline_bytes, 2_048);
        assert_eq!(config.callback.max_in_flight, 0);
        assert_eq!(config.queue_capacity, 1_024);
    }

    #[test]
    fn regression_http_sender_mode_requires_valid_backend_url() {
        assert!(build_push_sender(&parse(&[])).is_err());
        assert!(build_push_sender(&parse(&["--backend-url", "http://127.0.0.1:9/send"])).is_ok());
    }
}
