//! `pubsub-publish`: publish messages through the load-test adapter
//!
//! Stands in for the load-test host. Reads the publish configuration from a
//! file, the environment and `--set` flags, then publishes `--count`
//! messages with at most `--concurrency` in flight and prints one outcome
//! per line as JSON.

mod settings;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pubsub_loadtest_core::config::PublishConfig;
use pubsub_loadtest_core::message::{OutgoingMessage, PublishOutcome};
use pubsub_loadtest_service::module::announce;
use pubsub_loadtest_service::{PubSubModule, PublishTelemetry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "pubsub-publish", version, about = "Publish messages to a Pub/Sub topic")]
struct Cli {
    /// Topic name within the configured project
    #[arg(short, long, env = "PUBSUB_TOPIC")]
    topic: String,

    /// Message payload
    #[arg(short, long)]
    message: String,

    /// Configuration file (toml, yaml or json)
    #[arg(short, long, env = "PUBSUB_CONFIG")]
    config: Option<PathBuf>,

    /// Override a configuration key, e.g. `--set project_id=my-project`
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = settings::parse_key_value)]
    overrides: Vec<(String, String)>,

    /// Attach a message attribute
    #[arg(short, long = "attribute", value_name = "KEY=VALUE", value_parser = settings::parse_key_value)]
    attributes: Vec<(String, String)>,

    /// Number of messages to publish
    #[arg(long, default_value_t = 1)]
    count: usize,

    /// Maximum publishes in flight
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "PUBSUB_LOG_FORMAT")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pubsub-publish failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(true))
            .init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = settings::load(cli.config.as_deref(), &cli.overrides, settings::ENV_PREFIX)?;

    let telemetry = Arc::new(PublishTelemetry::default());
    let module = PubSubModule::new().with_telemetry(telemetry.clone());
    announce();

    let message = cli
        .attributes
        .iter()
        .fold(OutgoingMessage::from(cli.message.as_str()), |message, (key, value)| {
            message.with_attribute(key, value)
        });

    let summary = publish_all(
        &module,
        &config,
        &cli.topic,
        &message,
        cli.count,
        cli.concurrency,
    )
    .await?;

    for outcome in &summary.outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    telemetry.flush().await;
    telemetry.report().await;

    if summary.failures > 0 {
        anyhow::bail!("{} of {} publishes failed", summary.failures, summary.attempts);
    }
    Ok(())
}

/// Result of a publish run
#[derive(Debug, Default)]
struct RunSummary {
    attempts: usize,
    outcomes: Vec<PublishOutcome>,
    failures: usize,
}

/// Publish `count` copies of `message` with at most `concurrency` in flight,
/// then wait for any fire-and-forget sends to finish
async fn publish_all(
    module: &PubSubModule,
    config: &PublishConfig,
    topic: &str,
    message: &OutgoingMessage,
    count: usize,
    concurrency: usize,
) -> anyhow::Result<RunSummary> {
    let count = count.max(1);
    let concurrency = concurrency.clamp(1, count);
    info!(topic = %topic, count, concurrency, delivery = ?config.delivery, "Publishing");

    let permits = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for _ in 0..count {
        let permit = permits.clone().acquire_owned().await?;
        let module = module.clone();
        let config = config.clone();
        let topic = topic.to_string();
        let message = message.clone();

        tasks.spawn(async move {
            let _permit = permit;
            module.publish_message(&topic, message, &config).await
        });
    }

    let mut summary = RunSummary {
        attempts: count,
        ..RunSummary::default()
    };

    while let Some(joined) = tasks.join_next().await {
        match joined.context("publish task panicked")? {
            Ok(outcome) => summary.outcomes.push(outcome),
            Err(e) => {
                summary.failures += 1;
                eprintln!("{} error: {}", e.kind(), e);
            }
        }
    }

    let drained = module.drain().await;
    if drained > 0 {
        info!(drained, "Background sends finished");
    }

    Ok(summary)
}
