//! Data models module
//!
//! Defines core data structures like ActivityEvent and Alert.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single CloudTrail API activity record.
///
/// Only `event_source` and `event_name` are guaranteed; every other field is
/// optional and rules treat an absent field as "predicate not satisfied".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Service that received the call (e.g. "iam.amazonaws.com")
    pub event_source: String,
    /// API action (e.g. "CreateUser")
    pub event_name: String,
    #[serde(rename = "eventID", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Raw event time as delivered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_region: Option<String>,
    #[serde(rename = "sourceIPAddress", skip_serializing_if = "Option::is_none")]
    pub source_ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_identity: Option<UserIdentity>,
    /// Opaque request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_parameters: Option<Value>,
    /// Opaque response elements (ConsoleLogin status lives here)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_elements: Option<Value>,
    /// Opaque additional data (MFAUsed lives here)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_event_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_account_id: Option<String>,
}

impl ActivityEvent {
    pub fn new(event_source: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            event_source: event_source.into(),
            event_name: event_name.into(),
            ..Self::default()
        }
    }

    /// Look up a top-level request parameter.
    pub fn request_param(&self, key: &str) -> Option<&Value> {
        self.request_parameters.as_ref()?.get(key)
    }

    pub fn response_element(&self, key: &str) -> Option<&Value> {
        self.response_elements.as_ref()?.get(key)
    }

    pub fn additional_data(&self, key: &str) -> Option<&Value> {
        self.additional_event_data.as_ref()?.get(key)
    }

    /// Best available principal for display: ARN, then principal id, then user name.
    pub fn principal(&self) -> Option<&str> {
        self.user_identity.as_ref().and_then(UserIdentity::principal)
    }
}

/// Caller identity attached to a CloudTrail record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl UserIdentity {
    pub fn principal(&self) -> Option<&str> {
        self.arn
            .as_deref()
            .or(self.principal_id.as_deref())
            .or(self.user_name.as_deref())
    }
}

/// Alert category labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    IamChange,
    CloudTrailTampering,
    OpenSecurityGroup,
    ConsoleLogin,
    AccessDenied,
}

impl AlertCategory {
    /// Human-readable label used in subjects and logs
    pub fn label(&self) -> &'static str {
        match self {
            AlertCategory::IamChange => "IAM change",
            AlertCategory::CloudTrailTampering => "CloudTrail tampering",
            AlertCategory::OpenSecurityGroup => "Open Security Group",
            AlertCategory::ConsoleLogin => "Login failure/No MFA",
            AlertCategory::AccessDenied => "Access denied",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formatted alert ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Rule name that triggered
    pub rule_name: String,
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub subject: String,
    pub body: String,
}
