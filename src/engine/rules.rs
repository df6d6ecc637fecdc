//! Built-in detection predicates
//!
//! Each predicate is a pure function of one ActivityEvent. A field the
//! predicate needs but cannot find makes it return false.

use crate::models::ActivityEvent;
use ipnetwork::IpNetwork;
use serde_json::Value;

pub const IAM_SOURCE: &str = "iam.amazonaws.com";
pub const CLOUDTRAIL_SOURCE: &str = "cloudtrail.amazonaws.com";
pub const EC2_SOURCE: &str = "ec2.amazonaws.com";
pub const SIGNIN_SOURCE: &str = "signin.amazonaws.com";

/// Mutating IAM calls on users, roles, groups, policies, access keys and login profiles
pub const IAM_MUTATING_EVENTS: &[&str] = &[
    "CreateUser",
    "DeleteUser",
    "UpdateUser",
    "CreateAccessKey",
    "DeleteAccessKey",
    "UpdateAccessKey",
    "CreateLoginProfile",
    "DeleteLoginProfile",
    "UpdateLoginProfile",
    "AttachUserPolicy",
    "DetachUserPolicy",
    "PutUserPolicy",
    "DeleteUserPolicy",
    "CreateRole",
    "DeleteRole",
    "UpdateRole",
    "AttachRolePolicy",
    "DetachRolePolicy",
    "PutRolePolicy",
    "DeleteRolePolicy",
    "UpdateAssumeRolePolicy",
    "UpdateRoleDescription",
    "CreateServiceLinkedRole",
    "DeleteServiceLinkedRole",
    "PutUserPermissionsBoundary",
    "DeleteUserPermissionsBoundary",
    "PutRolePermissionsBoundary",
    "DeleteRolePermissionsBoundary",
    "CreateGroup",
    "DeleteGroup",
    "UpdateGroup",
    "AddUserToGroup",
    "RemoveUserFromGroup",
    "AttachGroupPolicy",
    "DetachGroupPolicy",
    "PutGroupPolicy",
    "DeleteGroupPolicy",
    "CreatePolicy",
    "DeletePolicy",
    "CreatePolicyVersion",
    "DeletePolicyVersion",
    "SetDefaultPolicyVersion",
];

pub const CLOUDTRAIL_TAMPERING_EVENTS: &[&str] =
    &["StopLogging", "DeleteTrail", "UpdateTrail", "PutEventSelectors"];

pub const SECURITY_GROUP_AUTHORIZE_EVENTS: &[&str] =
    &["AuthorizeSecurityGroupIngress", "AuthorizeSecurityGroupEgress"];

const CONSOLE_LOGIN_EVENT: &str = "ConsoleLogin";
const FAILED_AUTHENTICATION: &str = "Failed authentication";

/// Request parameter keys that carry a CIDR block
const CIDR_KEYS: &[&str] = &["cidrIp", "cidrIpv4", "cidrIpv6"];

/// MFAUsed values meaning "no MFA"
const MFA_ABSENT_VALUES: &[&str] = &["no", "false", "none", ""];

pub fn is_iam_change(event: &ActivityEvent) -> bool {
    event.event_source == IAM_SOURCE && IAM_MUTATING_EVENTS.contains(&event.event_name.as_str())
}

pub fn is_cloudtrail_tampering(event: &ActivityEvent) -> bool {
    event.event_source == CLOUDTRAIL_SOURCE
        && CLOUDTRAIL_TAMPERING_EVENTS.contains(&event.event_name.as_str())
}

pub fn is_world_open_security_group(event: &ActivityEvent) -> bool {
    if event.event_source != EC2_SOURCE
        || !SECURITY_GROUP_AUTHORIZE_EVENTS.contains(&event.event_name.as_str())
    {
        return false;
    }

    match &event.request_parameters {
        Some(params) => !world_open_cidrs(params).is_empty(),
        None => false,
    }
}

pub fn is_console_login_issue(event: &ActivityEvent) -> bool {
    if event.event_source != SIGNIN_SOURCE || event.event_name != CONSOLE_LOGIN_EVENT {
        return false;
    }

    login_failed(event) || !mfa_used(event)
}

pub fn is_access_denied(event: &ActivityEvent) -> bool {
    let Some(code) = event.error_code.as_deref() else {
        return false;
    };
    let code = code.to_ascii_lowercase();
    code.contains("accessdenied") || code.contains("unauthorized")
}

/// `responseElements.ConsoleLogin == "Failure"` or the failed-authentication error message
pub(crate) fn login_failed(event: &ActivityEvent) -> bool {
    let status_failed = event
        .response_element("ConsoleLogin")
        .and_then(Value::as_str)
        .is_some_and(|status| status == "Failure");

    status_failed || event.error_message.as_deref() == Some(FAILED_AUTHENTICATION)
}

/// An absent MFAUsed indicator counts as no MFA.
pub(crate) fn mfa_used(event: &ActivityEvent) -> bool {
    match event.additional_data("MFAUsed") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(used)) => *used,
        Some(Value::String(value)) => {
            !MFA_ABSENT_VALUES.contains(&value.trim().to_ascii_lowercase().as_str())
        }
        Some(_) => false,
    }
}

/// Every CIDR under a CIDR key anywhere in `params` that covers the whole
/// address space, in encounter order, deduplicated.
pub(crate) fn world_open_cidrs(params: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_cidrs(params, &mut found);
    found.retain(|cidr| is_world_open(cidr));

    let mut unique: Vec<String> = Vec::with_capacity(found.len());
    for cidr in found {
        if !unique.contains(&cidr) {
            unique.push(cidr);
        }
    }
    unique
}

fn collect_cidrs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if CIDR_KEYS.contains(&key.as_str()) {
                    if let Some(cidr) = child.as_str() {
                        out.push(cidr.trim().to_string());
                        continue;
                    }
                }
                collect_cidrs(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_cidrs(item, out);
            }
        }
        _ => {}
    }
}

fn is_world_open(cidr: &str) -> bool {
    cidr.parse::<IpNetwork>()
        .map(|network| network.prefix() == 0)
        .unwrap_or(false)
}
