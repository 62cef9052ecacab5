use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

pub fn init_logging() -> Result<()> {
    let level = std::env::var("WTX_LOG")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "info".to_string());

    let filter = EnvFilter::try_new(&level)
        .with_context(|| format!("invalid WTX_LOG filter `{level}`"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("{err}"))
        .context("failed to initialize logging")
}
