//! Configuration module
//!
//! Provides structured configuration for the trailwatch handler.
//! Configuration can be loaded from:
//! 1. Default values (hardcoded)
//! 2. trailwatch.toml file (optional)
//! 3. Environment variables with TRAILWATCH__ prefix
//! 4. ALERT_SNS_ARN, which overrides the topic
//!
//! Example environment variable override:
//! TRAILWATCH__NOTIFIER__TOPIC_ARN=arn:aws:sns:us-east-1:123456789012:security-alerts
//! TRAILWATCH__FILTER__EVENT_SOURCES=iam.amazonaws.com,signin.amazonaws.com

use crate::engine::AlertPolicy;
use crate::models::AlertSeverity;
use config::{Config, ConfigError, Environment, File, FileFormat, FileSourceFile};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Topic variable used by existing deployments
const LEGACY_TOPIC_VAR: &str = "ALERT_SNS_ARN";

/// Event sources forwarded by the upstream EventBridge rule
pub const DEFAULT_EVENT_SOURCES: &[&str] = &[
    "signin.amazonaws.com",
    "iam.amazonaws.com",
    "ec2.amazonaws.com",
    "s3.amazonaws.com",
    "cloudtrail.amazonaws.com",
    "kms.amazonaws.com",
];

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub notifier: NotifierConfig,
    pub filter: FilterConfig,
    pub alerts: AlertConfig,
    pub logging: LogConfig,
}

/// Notification destination
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// SNS topic ARN; required when serving
    pub topic_arn: String,
    /// Upper bound on a single publish attempt
    pub publish_timeout_ms: u64,
}

/// Pre-filter applied before rule evaluation
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Allowed event sources; empty disables the filter
    pub event_sources: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    pub policy: AlertPolicy,
    /// Alerts below this severity are logged but not published
    pub min_severity: AlertSeverity,
}

/// Operational logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line (CloudWatch Logs Insights)
    Json,
    /// Human readable single-line output
    Compact,
}

impl AppConfig {
    /// Load configuration from defaults, trailwatch.toml, and environment variables
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(File::with_name("trailwatch").required(false))
    }

    /// Load configuration with an explicit config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(File::from(path).required(true))
    }

    fn load(file: File<FileSourceFile, FileFormat>) -> Result<Self, ConfigError> {
        let default_sources: Vec<String> =
            DEFAULT_EVENT_SOURCES.iter().map(|s| s.to_string()).collect();

        let legacy_topic = std::env::var(LEGACY_TOPIC_VAR)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let s = Config::builder()
            // --- Defaults ---
            // Notifier
            .set_default("notifier.topic_arn", "")?
            .set_default("notifier.publish_timeout_ms", 5000)?
            // Filter
            .set_default("filter.event_sources", default_sources)?
            // Alerts
            .set_default("alerts.policy", "first_match")?
            .set_default("alerts.min_severity", "low")?
            // Logging
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            // --- Sources ---
            .add_source(file)
            .add_source(
                Environment::with_prefix("TRAILWATCH")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("filter.event_sources")
                    .try_parsing(true),
            )
            .set_override_option("notifier.topic_arn", legacy_topic)?
            .build()?;

        s.try_deserialize()
    }

    /// Topic ARN, or an error when none is configured
    pub fn require_topic(&self) -> Result<&str, ConfigError> {
        let topic = self.notifier.topic_arn.trim();
        if topic.is_empty() {
            return Err(ConfigError::Message(format!(
                "notifier.topic_arn is not set (use TRAILWATCH__NOTIFIER__TOPIC_ARN or {})",
                LEGACY_TOPIC_VAR
            )));
        }
        Ok(topic)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.notifier.publish_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notifier: NotifierConfig {
                topic_arn: String::new(),
                publish_timeout_ms: 5000,
            },
            filter: FilterConfig {
                event_sources: DEFAULT_EVENT_SOURCES.iter().map(|s| s.to_string()).collect(),
            },
            alerts: AlertConfig {
                policy: AlertPolicy::FirstMatch,
                min_severity: AlertSeverity::Low,
            },
            logging: LogConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
            },
        }
    }
}
