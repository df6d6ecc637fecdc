//! Alert formatter.
//!
//! Renders a matched (event, rule) pair into a subject line and a plain-text
//! body. Output depends only on the inputs, so the same pair always renders
//! byte-identically.

use crate::engine::rules;
use crate::engine::AlertRule;
use crate::models::{ActivityEvent, Alert, AlertCategory};
use crate::utils::to_utc_timestamp;
use serde_json::Value;

const UNKNOWN: &str = "unknown";
const NO_PARAMETERS: &str = "none";

const IAM_KEYS: &[&str] = &[
    "userName",
    "roleName",
    "groupName",
    "policyName",
    "policyArn",
    "accessKeyId",
    "status",
];
const TRAIL_KEYS: &[&str] = &["name", "trailName", "s3BucketName"];
const SECURITY_GROUP_KEYS: &[&str] = &["groupId", "groupName"];

/// Build the alert for one matched rule.
pub fn format_alert(event: &ActivityEvent, rule: &AlertRule) -> Alert {
    Alert {
        rule_name: rule.name.to_string(),
        category: rule.category,
        severity: rule.severity,
        subject: format_subject(event, rule.category),
        body: format_body(event, rule),
    }
}

/// `[<category>] <eventName> @ <eventSource>`
pub fn format_subject(event: &ActivityEvent, category: AlertCategory) -> String {
    format!(
        "[{}] {} @ {}",
        category.label(),
        event.event_name,
        event.event_source
    )
}

pub fn format_body(event: &ActivityEvent, rule: &AlertRule) -> String {
    let time = match event.event_time.as_deref() {
        Some(raw) => to_utc_timestamp(raw).unwrap_or_else(|| raw.to_string()),
        None => UNKNOWN.to_string(),
    };

    let mut lines = vec![
        format!("Account: {}", or_unknown(event.recipient_account_id.as_deref())),
        format!("Region: {}", or_unknown(event.aws_region.as_deref())),
        format!("Identity: {}", or_unknown(event.principal())),
        format!("Source IP: {}", or_unknown(event.source_ip_address.as_deref())),
        format!("Time: {}", time),
        format!("Request: {}", render_request(event, rule.category)),
        format!("Severity: {}", rule.severity),
    ];

    if let Some(id) = &event.event_id {
        lines.push(format!("Event ID: {}", id));
    }
    if let Some(agent) = &event.user_agent {
        lines.push(format!("User agent: {}", agent));
    }
    match (&event.error_code, &event.error_message) {
        (Some(code), Some(message)) => lines.push(format!("Error: {}: {}", code, message)),
        (Some(code), None) => lines.push(format!("Error: {}", code)),
        (None, Some(message)) => lines.push(format!("Error: {}", message)),
        (None, None) => {}
    }

    lines.join("\n")
}

/// Compact `key: value` rendering of the parameters relevant to `category`.
fn render_request(event: &ActivityEvent, category: AlertCategory) -> String {
    let mut pairs = match category {
        AlertCategory::IamChange => picked_params(event, IAM_KEYS),
        AlertCategory::CloudTrailTampering => picked_params(event, TRAIL_KEYS),
        AlertCategory::OpenSecurityGroup => {
            let mut pairs = picked_params(event, SECURITY_GROUP_KEYS);
            if let Some(params) = &event.request_parameters {
                for cidr in rules::world_open_cidrs(params) {
                    pairs.push(("cidr".to_string(), cidr));
                }
            }
            pairs
        }
        AlertCategory::ConsoleLogin => vec![
            (
                "ConsoleLogin".to_string(),
                event
                    .response_element("ConsoleLogin")
                    .map(render_value)
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            (
                "MFAUsed".to_string(),
                event
                    .additional_data("MFAUsed")
                    .map(render_value)
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
        ],
        AlertCategory::AccessDenied => Vec::new(),
    };

    if pairs.is_empty() {
        pairs = all_params(event);
    }
    if pairs.is_empty() {
        return NO_PARAMETERS.to_string();
    }

    pairs
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn picked_params(event: &ActivityEvent, keys: &[&str]) -> Vec<(String, String)> {
    keys.iter()
        .filter_map(|key| {
            event
                .request_param(key)
                .filter(|value| !value.is_null())
                .map(|value| (key.to_string(), render_value(value)))
        })
        .collect()
}

/// Every top-level parameter, sorted by key.
fn all_params(event: &ActivityEvent) -> Vec<(String, String)> {
    let Some(params) = event.request_parameters.as_ref() else {
        return Vec::new();
    };
    match params.as_object() {
        Some(map) => {
            let mut pairs: Vec<(String, String)> = map
                .iter()
                .map(|(key, value)| (key.clone(), render_value(value)))
                .collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            pairs
        }
        None => vec![("parameters".to_string(), render_value(params))],
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or(UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RuleSet;
    use crate::normalizer::normalize;
    use serde_json::json;

    fn rule_for(category: AlertCategory) -> AlertRule {
        RuleSet::builtin()
            .rules()
            .iter()
            .find(|rule| rule.category == category)
            .cloned()
            .unwrap()
    }

    fn create_user_event() -> ActivityEvent {
        normalize(&json!({
            "eventSource": "iam.amazonaws.com",
            "eventName": "CreateUser",
            "awsRegion": "us-east-1",
            "recipientAccountId": "123456789012",
            "userIdentity": { "arn": "arn:aws:iam::123456789012:root" },
            "sourceIPAddress": "104.174.1.1",
            "eventTime": "2025-08-24T02:38:47Z",
            "requestParameters": { "userName": "tim" }
        }))
        .unwrap()
    }

    #[test]
    fn test_create_user_alert() {
        let alert = format_alert(&create_user_event(), &rule_for(AlertCategory::IamChange));

        assert_eq!(alert.subject, "[IAM change] CreateUser @ iam.amazonaws.com");
        assert_eq!(alert.category, AlertCategory::IamChange);
        assert_eq!(
            alert.body,
            "Account: 123456789012\n\
             Region: us-east-1\n\
             Identity: arn:aws:iam::123456789012:root\n\
             Source IP: 104.174.1.1\n\
             Time: 2025-08-24T02:38:47Z\n\
             Request: userName: tim\n\
             Severity: high"
        );
    }

    #[test]
    fn test_formatting_is_deterministic() {
        let event = normalize(&json!({
            "eventSource": "ec2.amazonaws.com",
            "eventName": "AuthorizeSecurityGroupIngress",
            "requestParameters": {
                "groupId": "sg-1",
                "ipPermissions": [ { "ipRanges": [ { "cidrIp": "0.0.0.0/0" } ],
                                     "ipv6Ranges": [ { "cidrIpv6": "::/0" } ] } ]
            }
        }))
        .unwrap();
        let rule = rule_for(AlertCategory::OpenSecurityGroup);

        let first = format_alert(&event, &rule);
        let second = format_alert(&event, &rule);
        assert_eq!(first.subject.as_bytes(), second.subject.as_bytes());
        assert_eq!(first.body.as_bytes(), second.body.as_bytes());
    }

    #[test]
    fn test_security_group_request_lists_cidrs() {
        let event = normalize(&json!({
            "eventSource": "ec2.amazonaws.com",
            "eventName": "AuthorizeSecurityGroupIngress",
            "requestParameters": {
                "groupId": "sg-0abc",
                "ipPermissions": { "items": [ {
                    "ipRanges": { "items": [ { "cidrIp": "0.0.0.0/0" }, { "cidrIp": "10.1.0.0/16" } ] }
                } ] }
            }
        }))
        .unwrap();

        let body = format_body(&event, &rule_for(AlertCategory::OpenSecurityGroup));
        assert!(body.contains("Request: groupId: sg-0abc, cidr: 0.0.0.0/0\n"));
    }

    #[test]
    fn test_trail_name_rendered() {
        let event = normalize(&json!({
            "eventSource": "cloudtrail.amazonaws.com",
            "eventName": "StopLogging",
            "requestParameters": { "name": "org-trail" }
        }))
        .unwrap();

        let alert = format_alert(&event, &rule_for(AlertCategory::CloudTrailTampering));
        assert_eq!(alert.subject, "[CloudTrail tampering] StopLogging @ cloudtrail.amazonaws.com");
        assert!(alert.body.contains("Request: name: org-trail"));
        assert!(alert.body.contains("Severity: critical"));
    }

    #[test]
    fn test_console_login_request() {
        let event = normalize(&json!({
            "eventSource": "signin.amazonaws.com",
            "eventName": "ConsoleLogin",
            "responseElements": { "ConsoleLogin": "Failure" },
            "additionalEventData": { "MFAUsed": "No" },
            "errorMessage": "Failed authentication"
        }))
        .unwrap();

        let body = format_body(&event, &rule_for(AlertCategory::ConsoleLogin));
        assert!(body.contains("Request: ConsoleLogin: Failure, MFAUsed: No"));
        assert!(body.contains("Error: Failed authentication"));
    }

    #[test]
    fn test_fallback_renders_all_params_sorted() {
        let event = normalize(&json!({
            "eventSource": "s3.amazonaws.com",
            "eventName": "PutBucketPolicy",
            "errorCode": "AccessDenied",
            "errorMessage": "Access Denied",
            "requestParameters": {
                "policy": { "Version": "2012-10-17" },
                "bucketName": "logs",
                "acl": true
            }
        }))
        .unwrap();

        let body = format_body(&event, &rule_for(AlertCategory::AccessDenied));
        assert!(body.contains(
            "Request: acl: true, bucketName: logs, policy: {\"Version\":\"2012-10-17\"}"
        ));
        assert!(body.contains("Error: AccessDenied: Access Denied"));
    }

    #[test]
    fn test_missing_fields_render_unknown() {
        let event = ActivityEvent::new("iam.amazonaws.com", "DeleteUser");
        let body = format_body(&event, &rule_for(AlertCategory::IamChange));
        assert_eq!(
            body,
            "Account: unknown\n\
             Region: unknown\n\
             Identity: unknown\n\
             Source IP: unknown\n\
             Time: unknown\n\
             Request: none\n\
             Severity: high"
        );
    }

    #[test]
    fn test_unparseable_time_kept_verbatim() {
        let mut event = create_user_event();
        event.event_time = Some("last tuesday".to_string());
        event.event_id = Some("0f1e".to_string());
        event.user_agent = Some("aws-cli/2.15".to_string());

        let body = format_body(&event, &rule_for(AlertCategory::IamChange));
        assert!(body.contains("Time: last tuesday\n"));
        assert!(body.ends_with("Event ID: 0f1e\nUser agent: aws-cli/2.15"));
    }

    #[test]
    fn test_iam_without_relevant_keys_falls_back() {
        let mut event = ActivityEvent::new("iam.amazonaws.com", "CreatePolicyVersion");
        event.request_parameters = Some(json!({ "setAsDefault": true }));
        let body = format_body(&event, &rule_for(AlertCategory::IamChange));
        assert!(body.contains("Request: setAsDefault: true"));
    }
}
