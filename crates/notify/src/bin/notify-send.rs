//! notify-send — deliver one alert through the channels of a ponghub config.
//!
//! Loads the YAML config (parameters resolved, notification defaults
//! applied), builds the notification manager and broadcasts either the given
//! title/message or a fixed test alert.

use clap::Parser;
use tracing::info;

use ponghub_core::config::{load_dotenv, Config};
use ponghub_notify::NotificationManager;

// ── CLI ─────────────────────────────────────────────────────────────

/// Send a ponghub alert through the configured notification channels.
#[derive(Parser, Debug)]
#[command(name = "notify-send", version, about)]
struct Cli {
    /// Path to the ponghub YAML config file.
    #[arg(long, env = "PONGHUB_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Alert title.
    #[arg(long, default_value = "[TEST] PongHub Notification Test")]
    title: String,

    /// Alert message.
    #[arg(long, default_value = "This is a test notification from PongHub.")]
    message: String,

    /// Exit non-zero when any channel fails.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)?;
    let manager = NotificationManager::new(config.notifications);

    if !manager.is_enabled() {
        info!("notifications are disabled, nothing to send");
        return Ok(());
    }

    info!(channels = ?manager.channel_names(), "dispatching alert");
    let results = manager.send_notification(&cli.title, &cli.message).await;

    let failed: Vec<&str> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.channel.as_str())
        .collect();

    if cli.strict && !failed.is_empty() {
        anyhow::bail!("notification failed for: {}", failed.join(", "));
    }

    info!(sent = results.len() - failed.len(), failed = failed.len(), "notify-send finished");
    Ok(())
}
