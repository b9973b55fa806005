use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
/// Selects the send primitive dispatcher workers deliver through.
pub enum CliPushSenderMode {
    /// POST message chains to `--backend-url`.
    Http,
    /// Log each message and report success.
    DryRun,
}

impl CliPushSenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::DryRun => "dry-run",
        }
    }
}
