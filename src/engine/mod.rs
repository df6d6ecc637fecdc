//! Detection engine module
//!
//! Holds the immutable, ordered rule set and evaluates ActivityEvents
//! against it. Evaluation is pure: no I/O, no shared state.

mod handler;
pub mod rules;

pub use handler::{AlertDelivery, EventHandler, InvocationOutcome, InvocationStatus, PublishStatus};

use crate::models::{ActivityEvent, AlertCategory, AlertSeverity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named predicate over an ActivityEvent plus its category label
#[derive(Clone)]
pub struct AlertRule {
    pub name: &'static str,
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    predicate: fn(&ActivityEvent) -> bool,
}

impl AlertRule {
    pub const fn new(
        name: &'static str,
        category: AlertCategory,
        severity: AlertSeverity,
        predicate: fn(&ActivityEvent) -> bool,
    ) -> Self {
        Self {
            name,
            category,
            severity,
            predicate,
        }
    }

    pub fn matches(&self, event: &ActivityEvent) -> bool {
        (self.predicate)(event)
    }
}

impl fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .finish()
    }
}

/// Which matched rules turn into alerts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// At most one alert per event: the first matching rule wins
    #[default]
    FirstMatch,
    /// One alert per matching rule
    AllMatches,
}

impl AlertPolicy {
    pub fn select<'a>(&self, matched: &[&'a AlertRule]) -> Vec<&'a AlertRule> {
        match self {
            AlertPolicy::FirstMatch => matched.iter().take(1).copied().collect(),
            AlertPolicy::AllMatches => matched.to_vec(),
        }
    }
}

/// Ordered collection of rules, built once at startup
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<AlertRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    /// The built-in rule table, in evaluation order
    pub fn builtin() -> Self {
        Self::new(vec![
            AlertRule::new(
                "IAM change",
                AlertCategory::IamChange,
                AlertSeverity::High,
                rules::is_iam_change,
            ),
            AlertRule::new(
                "CloudTrail tampering",
                AlertCategory::CloudTrailTampering,
                AlertSeverity::Critical,
                rules::is_cloudtrail_tampering,
            ),
            AlertRule::new(
                "World-open Security Group",
                AlertCategory::OpenSecurityGroup,
                AlertSeverity::High,
                rules::is_world_open_security_group,
            ),
            AlertRule::new(
                "Console login issue",
                AlertCategory::ConsoleLogin,
                AlertSeverity::Medium,
                rules::is_console_login_issue,
            ),
            AlertRule::new(
                "Access denied",
                AlertCategory::AccessDenied,
                AlertSeverity::Medium,
                rules::is_access_denied,
            ),
        ])
    }

    /// Every rule whose predicate holds, in rule order
    pub fn evaluate(&self, event: &ActivityEvent) -> Vec<&AlertRule> {
        self.rules.iter().filter(|rule| rule.matches(event)).collect()
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}
