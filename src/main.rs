//! trailwatch: CloudTrail security alerting
//!
//! Classifies CloudTrail activity delivered by EventBridge and publishes
//! security alerts to SNS. Runs as an AWS Lambda function or as a local CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use trailwatch::config::{AppConfig, LogFormat};
use trailwatch::engine::{EventHandler, InvocationStatus, PublishStatus, RuleSet};
use trailwatch::notifier::{ConsoleNotifier, Notifier, SnsNotifier};

const TARGET_MAIN: &str = "trailwatch";

#[derive(Parser)]
#[command(name = "trailwatch")]
#[command(about = "CloudTrail security alerting for AWS Lambda", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Override logging level (e.g., error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    /// Configuration file (defaults to ./trailwatch.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as the Lambda function handler (default)
    Serve,
    /// Classify events from a JSON file ("-" for stdin) and print the alerts
    Classify {
        /// A single event object or an array of events
        input: PathBuf,
        /// Publish to the configured SNS topic instead of printing
        #[arg(long)]
        publish: bool,
    },
    /// List the built-in rules
    Rules,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        if !level.trim().is_empty() {
            cfg.logging.level = level;
        }
    }
    init_logging(&cfg);

    let rules = Arc::new(RuleSet::builtin());

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cfg, rules).await,
        Commands::Classify { input, publish } => classify(&cfg, rules, &input, publish).await,
        Commands::Rules => {
            print_rules(&rules);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let loaded = match path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::new(),
    };
    match loaded {
        Ok(cfg) => Ok(cfg),
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            eprintln!("Hint: check trailwatch.toml and TRAILWATCH__* environment overrides.");
            Err(anyhow::anyhow!("Failed to load configuration: {}", err))
        }
    }
}

/// Initialize structured logging on stderr.
/// JSON lines for CloudWatch by default, compact text for local runs.
fn init_logging(cfg: &AppConfig) {
    let json_layer = (cfg.logging.format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&cfg.logging.level))
    });

    let compact_layer = (cfg.logging.format == LogFormat::Compact).then(|| {
        fmt::layer()
            .compact()
            .with_ansi(false)
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter(&cfg.logging.level))
    });

    tracing_subscriber::registry()
        .with(json_layer)
        .with(compact_layer)
        .init();
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|err| {
        eprintln!("Invalid log level {:?} ({}), falling back to info", level, err);
        EnvFilter::new("info")
    })
}

async fn sns_notifier(cfg: &AppConfig) -> Result<Arc<dyn Notifier>> {
    let topic = cfg
        .require_topic()
        .context("A destination topic is required to publish alerts")?;
    Ok(Arc::new(
        SnsNotifier::from_env(topic, cfg.publish_timeout()).await,
    ))
}

async fn serve(cfg: &AppConfig, rules: Arc<RuleSet>) -> Result<()> {
    let notifier = sns_notifier(cfg).await?;

    info!(
        target: TARGET_MAIN,
        topic = %notifier.destination(),
        rules = rules.len(),
        policy = ?cfg.alerts.policy,
        min_severity = %cfg.alerts.min_severity,
        event_sources = ?cfg.filter.event_sources,
        "Lambda handler starting"
    );

    let handler = Arc::new(EventHandler::from_config(cfg, rules, notifier));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        async move {
            let span = info_span!("invocation", request_id = %event.context.request_id);
            let outcome = handler.handle(&event.payload).instrument(span).await;
            Ok::<_, lambda_runtime::Error>(outcome)
        }
    }))
    .await
    .map_err(|err| anyhow::anyhow!("Lambda runtime failed: {}", err))
}

async fn classify(cfg: &AppConfig, rules: Arc<RuleSet>, input: &Path, publish: bool) -> Result<()> {
    let text = if input == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read events from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?
    };

    let parsed: Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in {}", input.display()))?;
    let events = match parsed {
        Value::Array(items) => items,
        other => vec![other],
    };

    let notifier: Arc<dyn Notifier> = if publish {
        sns_notifier(cfg).await?
    } else {
        Arc::new(ConsoleNotifier::new())
    };
    let handler = EventHandler::from_config(cfg, rules, notifier);

    let mut alerted = 0usize;
    let mut failed = 0usize;
    for raw in &events {
        let outcome = handler.handle(raw).await;
        if outcome.status == InvocationStatus::Alerted {
            alerted += 1;
        }
        if matches!(outcome.publish, PublishStatus::Failure | PublishStatus::Partial) {
            failed += 1;
        }
    }

    info!(
        target: TARGET_MAIN,
        events = events.len(),
        alerted,
        failed,
        "Classification finished"
    );
    Ok(())
}

fn print_rules(rules: &RuleSet) {
    println!("{:<28} {:<22} {:<9}", "RULE", "CATEGORY", "SEVERITY");
    for rule in rules.rules() {
        println!(
            "{:<28} {:<22} {:<9}",
            rule.name,
            rule.category.label(),
            rule.severity.as_str()
        );
    }
}
