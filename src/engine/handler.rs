//! Invocation handler
//!
//! Runs one raw event through normalize → filter → evaluate → format →
//! publish, and reports what happened. Every failure stays inside the
//! invocation; the outcome always reports `ok`.

use crate::alerts::format_alert;
use crate::config::AppConfig;
use crate::engine::{AlertPolicy, RuleSet};
use crate::models::{ActivityEvent, AlertSeverity};
use crate::normalizer::normalize;
use crate::notifier::Notifier;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Target name for handler operational logs
const TARGET_HANDLER: &str = "handler";

const NO_MATCH: &str = "no match";

/// How the event itself was processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    /// At least one rule matched
    Alerted,
    NoMatch,
    /// Event source not in the allow-list
    Filtered,
    /// Required fields missing
    Malformed,
}

/// Aggregate result of the publish calls for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Success,
    Failure,
    Partial,
    /// Every alert was below the minimum severity
    Suppressed,
    /// Nothing to publish
    Skipped,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Success => "success",
            PublishStatus::Failure => "failure",
            PublishStatus::Partial => "partial",
            PublishStatus::Suppressed => "suppressed",
            PublishStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery result for a single alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertDelivery {
    pub rule: String,
    pub category: String,
    pub severity: AlertSeverity,
    pub subject: String,
    pub delivered: bool,
    pub suppressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result returned to the host for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationOutcome {
    /// Always true: event processing never fails the invocation
    pub ok: bool,
    pub status: InvocationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Categories of every rule that matched, in rule order
    pub matched: Vec<String>,
    /// Categories selected for alerting by the policy
    pub categories: Vec<String>,
    pub publish: PublishStatus,
    pub alerts: Vec<AlertDelivery>,
}

impl InvocationOutcome {
    fn without_alerts(status: InvocationStatus, reason: Option<String>) -> Self {
        Self {
            ok: true,
            status,
            reason,
            matched: Vec::new(),
            categories: Vec::new(),
            publish: PublishStatus::Skipped,
            alerts: Vec::new(),
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.alerts.iter().filter(|a| a.delivered).count()
    }
}

/// Classifies events and publishes alerts.
///
/// Holds only immutable state, so one instance can serve concurrent
/// invocations.
pub struct EventHandler {
    rules: Arc<RuleSet>,
    notifier: Arc<dyn Notifier>,
    allowed_sources: Vec<String>,
    policy: AlertPolicy,
    min_severity: AlertSeverity,
}

impl EventHandler {
    /// Handler with no source filter, first-match policy and no severity floor
    pub fn new(rules: Arc<RuleSet>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            rules,
            notifier,
            allowed_sources: Vec::new(),
            policy: AlertPolicy::FirstMatch,
            min_severity: AlertSeverity::Low,
        }
    }

    pub fn from_config(cfg: &AppConfig, rules: Arc<RuleSet>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(rules, notifier)
            .with_event_sources(cfg.filter.event_sources.clone())
            .with_policy(cfg.alerts.policy)
            .with_min_severity(cfg.alerts.min_severity)
    }

    /// Restrict processing to these event sources; empty allows all
    pub fn with_event_sources(mut self, sources: Vec<String>) -> Self {
        self.allowed_sources = sources
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_policy(mut self, policy: AlertPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_min_severity(mut self, min_severity: AlertSeverity) -> Self {
        self.min_severity = min_severity;
        self
    }

    /// Process one raw event payload
    pub async fn handle(&self, raw: &Value) -> InvocationOutcome {
        match normalize(raw) {
            Ok(event) => self.handle_event(&event).await,
            Err(err) => {
                warn!(
                    target: TARGET_HANDLER,
                    status = "malformed",
                    error = %err,
                    "Dropping malformed event"
                );
                log_malformed(raw);
                InvocationOutcome::without_alerts(InvocationStatus::Malformed, Some(err.to_string()))
            }
        }
    }

    /// Process one normalized event
    pub async fn handle_event(&self, event: &ActivityEvent) -> InvocationOutcome {
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Ok(json) = serde_json::to_string(event) {
                tracing::trace!(target: TARGET_HANDLER, event_json = %json, "Normalized event");
            }
        }

        if !self.source_allowed(&event.event_source) {
            debug!(
                target: TARGET_HANDLER,
                event_source = %event.event_source,
                "Event source not in allow-list"
            );
            self.log_invocation(event, NO_MATCH, PublishStatus::Skipped);
            return InvocationOutcome::without_alerts(InvocationStatus::Filtered, None);
        }

        let matched = self.rules.evaluate(event);
        let selected = self.policy.select(&matched);
        if selected.is_empty() {
            self.log_invocation(event, NO_MATCH, PublishStatus::Skipped);
            return InvocationOutcome::without_alerts(InvocationStatus::NoMatch, None);
        }
        let matched_categories: Vec<String> = matched
            .iter()
            .map(|rule| rule.category.label().to_string())
            .collect();

        let mut deliveries = Vec::with_capacity(selected.len());
        for rule in &selected {
            let alert = format_alert(event, rule);
            let mut delivery = AlertDelivery {
                rule: alert.rule_name.clone(),
                category: alert.category.label().to_string(),
                severity: alert.severity,
                subject: alert.subject.clone(),
                delivered: false,
                suppressed: false,
                message_id: None,
                error: None,
            };

            if alert.severity < self.min_severity {
                debug!(
                    target: TARGET_HANDLER,
                    rule = %alert.rule_name,
                    severity = %alert.severity,
                    min_severity = %self.min_severity,
                    "Alert below minimum severity, not published"
                );
                delivery.suppressed = true;
                deliveries.push(delivery);
                continue;
            }

            match self.notifier.publish(&alert.subject, &alert.body).await {
                Ok(receipt) => {
                    delivery.delivered = true;
                    delivery.message_id = receipt.message_id;
                }
                Err(err) => {
                    error!(
                        target: TARGET_HANDLER,
                        destination = %self.notifier.destination(),
                        rule = %alert.rule_name,
                        event_name = %event.event_name,
                        error = %err,
                        "Alert delivery failed"
                    );
                    delivery.error = Some(err.to_string());
                }
            }
            deliveries.push(delivery);
        }

        let publish = publish_status(&deliveries);
        let categories: Vec<String> = deliveries.iter().map(|d| d.category.clone()).collect();
        self.log_invocation(event, &categories.join(", "), publish);

        InvocationOutcome {
            ok: true,
            status: InvocationStatus::Alerted,
            reason: None,
            matched: matched_categories,
            categories,
            publish,
            alerts: deliveries,
        }
    }

    fn source_allowed(&self, source: &str) -> bool {
        self.allowed_sources.is_empty() || self.allowed_sources.iter().any(|s| s == source)
    }

    /// The one structured line every invocation emits
    fn log_invocation(&self, event: &ActivityEvent, category: &str, publish: PublishStatus) {
        info!(
            target: TARGET_HANDLER,
            category = %category,
            event_name = %event.event_name,
            event_source = %event.event_source,
            event_id = event.event_id.as_deref().unwrap_or(""),
            user = event.principal().unwrap_or(""),
            source_ip = event.source_ip_address.as_deref().unwrap_or(""),
            region = event.aws_region.as_deref().unwrap_or(""),
            time = event.event_time.as_deref().unwrap_or(""),
            error_code = event.error_code.as_deref().unwrap_or(""),
            publish = %publish,
            "Event processed"
        );
    }
}

/// Invocation line for input that did not normalize, with whatever raw fields exist
fn log_malformed(raw: &Value) {
    let record = raw.get("detail").filter(|d| d.is_object()).unwrap_or(raw);
    info!(
        target: TARGET_HANDLER,
        category = NO_MATCH,
        event_name = raw_field(record, "eventName"),
        event_source = raw_field(record, "eventSource"),
        event_id = raw_field(record, "eventID"),
        publish = %PublishStatus::Skipped,
        "Event processed"
    );
}

fn raw_field<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or("")
}

fn publish_status(deliveries: &[AlertDelivery]) -> PublishStatus {
    let attempted: Vec<&AlertDelivery> = deliveries.iter().filter(|d| !d.suppressed).collect();
    if attempted.is_empty() {
        return if deliveries.is_empty() {
            PublishStatus::Skipped
        } else {
            PublishStatus::Suppressed
        };
    }

    let delivered = attempted.iter().filter(|d| d.delivered).count();
    if delivered == attempted.len() {
        PublishStatus::Success
    } else if delivered == 0 {
        PublishStatus::Failure
    } else {
        PublishStatus::Partial
    }
}
