//! Event normalizer module
//!
//! Converts the raw JSON handed over by the event bus into an ActivityEvent.
//! Accepts either an EventBridge envelope (`{"detail": {...}, "account": ...}`)
//! or a bare CloudTrail record.

use crate::models::{ActivityEvent, UserIdentity};
use serde_json::{Map, Value};
use thiserror::Error;

/// Raw input that cannot be turned into an ActivityEvent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("event payload is not a JSON object")]
    NotAnObject,
    #[error("required field `{0}` is missing or not a non-empty string")]
    MissingField(&'static str),
}

/// Envelope-level values used when the record itself lacks them
#[derive(Default)]
struct EnvelopeDefaults {
    account: Option<String>,
    region: Option<String>,
    time: Option<String>,
}

/// Normalize one raw event into an ActivityEvent.
///
/// Only `eventSource` and `eventName` are required. Optional fields with an
/// unexpected JSON type are dropped rather than rejected.
pub fn normalize(raw: &Value) -> Result<ActivityEvent, MalformedEvent> {
    let root = raw.as_object().ok_or(MalformedEvent::NotAnObject)?;

    let (record, envelope) = match root.get("detail").and_then(Value::as_object) {
        Some(detail) => (
            detail,
            EnvelopeDefaults {
                account: string_field(root, "account"),
                region: string_field(root, "region"),
                time: string_field(root, "time"),
            },
        ),
        None => (root, EnvelopeDefaults::default()),
    };

    let event_source =
        string_field(record, "eventSource").ok_or(MalformedEvent::MissingField("eventSource"))?;
    let event_name =
        string_field(record, "eventName").ok_or(MalformedEvent::MissingField("eventName"))?;

    let user_identity = record
        .get("userIdentity")
        .and_then(Value::as_object)
        .map(user_identity);

    let recipient_account_id = string_field(record, "recipientAccountId")
        .or(envelope.account)
        .or_else(|| user_identity.as_ref().and_then(|u| u.account_id.clone()));

    Ok(ActivityEvent {
        event_source,
        event_name,
        event_id: string_field(record, "eventID"),
        event_time: string_field(record, "eventTime").or(envelope.time),
        aws_region: string_field(record, "awsRegion").or(envelope.region),
        source_ip_address: string_field(record, "sourceIPAddress"),
        user_agent: string_field(record, "userAgent"),
        user_identity,
        request_parameters: opaque_field(record, "requestParameters"),
        response_elements: opaque_field(record, "responseElements"),
        additional_event_data: opaque_field(record, "additionalEventData"),
        error_code: string_field(record, "errorCode"),
        error_message: string_field(record, "errorMessage"),
        recipient_account_id,
    })
}

fn user_identity(obj: &Map<String, Value>) -> UserIdentity {
    UserIdentity {
        principal_id: string_field(obj, "principalId"),
        arn: string_field(obj, "arn"),
        account_id: string_field(obj, "accountId"),
        user_name: string_field(obj, "userName"),
    }
}

/// Trimmed, non-empty string value of `key`; anything else is absent.
fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let value = obj.get(key)?.as_str()?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Opaque maps: `null` counts as absent.
fn opaque_field(obj: &Map<String, Value>, key: &str) -> Option<Value> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.clone()),
    }
}
