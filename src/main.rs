use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;

use mail_notify::channels::{Deliver, DryRun, SlackWebhook};
use mail_notify::config::{Config, Overrides};
use mail_notify::mail::ParsedMail;
use mail_notify::pipeline::Notifier;

/// Post an email read from stdin to a Slack incoming webhook.
#[derive(Debug, Parser)]
#[command(name = "mail-notify", version)]
struct Args {
    /// Configuration file (must exist when given)
    #[arg(short = 'f', long, env = "MAIL_NOTIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Default incoming-webhook URL
    #[arg(short, long, env = "MAIL_NOTIFY_SLACK", hide_env_values = true)]
    slack: Option<String>,

    /// Default team (webhook name)
    #[arg(short, long, env = "MAIL_NOTIFY_TEAM")]
    team: Option<String>,

    /// Default channel
    #[arg(short, long, env = "MAIL_NOTIFY_CHANNEL")]
    channel: Option<String>,

    /// Print messages instead of posting them
    #[arg(short, long, env = "MAIL_NOTIFY_DEBUG")]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // stdout carries dry-run output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let overrides = Overrides {
        slack: args.slack,
        team: args.team,
        channel: args.channel,
    };
    let routes = config
        .routing_table(&overrides)
        .context("Invalid routing configuration")?;

    let deliverer: Arc<dyn Deliver> = if args.debug {
        Arc::new(DryRun::new())
    } else {
        Arc::new(SlackWebhook::new().context("Failed to create HTTP client")?)
    };

    let mut raw = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut raw)
        .await
        .context("Failed to read message from stdin")?;
    let mail = ParsedMail::parse(&raw).context("Failed to parse message")?;

    let notifier = Notifier::new(routes, config.settings(), deliverer);
    let sent = notifier.notify(&mail).await?;
    tracing::debug!(sent, "Finished");

    Ok(())
}
