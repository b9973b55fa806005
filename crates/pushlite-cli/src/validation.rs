use std::net::SocketAddr;

use anyhow::{anyhow, bail, Context, Result};
use url::Url;

use crate::{Cli, CliPushSenderMode};

/// Validates cross-flag constraints clap cannot express on its own.
pub fn validate_cli(cli: &Cli) -> Result<()> {
    cli.bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", cli.bind))?;

    if cli.target.trim().is_empty() {
        bail!("--target cannot be empty");
    }

    if let Some(token) = cli.auth_token.as_deref() {
        if token.trim().is_empty() {
            bail!("--auth-token cannot be blank; omit it to generate a token");
        }
    }

    validate_backend_flags(cli)
}

fn validate_backend_flags(cli: &Cli) -> Result<()> {
    match cli.sender_mode {
        CliPushSenderMode::DryRun => Ok(()),
        CliPushSenderMode::Http => {
            let raw = cli
                .backend_url
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| anyhow!("--sender-mode=http requires --backend-url"))?;
            let url =
                Url::parse(raw).with_context(|| format!("invalid --backend-url '{raw}'"))?;
            if !matches!(url.scheme(), "http" | "https") {
                bail!(
                    "--backend-url must use http or https, got '{}'",
                    url.scheme()
                );
            }
            Ok(())
        }
    }
}
