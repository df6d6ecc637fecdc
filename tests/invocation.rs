//! End-to-end invocation tests over recorded CloudTrail fixtures.

use serde_json::Value;
use std::sync::Arc;
use trailwatch::config::AppConfig;
use trailwatch::engine::{EventHandler, InvocationStatus, PublishStatus, RuleSet};
use trailwatch::notifier::{MockNotifier, NotifyError};

const TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:security-alerts";

fn fixture(name: &str) -> Value {
    let text = match name {
        "create_user" => include_str!("fixtures/create_user.json"),
        "open_security_group" => include_str!("fixtures/open_security_group.json"),
        "console_login_failure" => include_str!("fixtures/console_login_failure.json"),
        "stop_logging" => include_str!("fixtures/stop_logging.json"),
        "s3_get_object" => include_str!("fixtures/s3_get_object.json"),
        other => panic!("unknown fixture {other}"),
    };
    serde_json::from_str(text).unwrap()
}

fn default_handler(notifier: Arc<MockNotifier>) -> EventHandler {
    EventHandler::from_config(&AppConfig::default(), Arc::new(RuleSet::builtin()), notifier)
}

#[tokio::test]
async fn create_user_envelope_alerts_once() {
    let notifier = Arc::new(MockNotifier::new(TOPIC));
    let handler = default_handler(notifier.clone());

    let outcome = handler.handle(&fixture("create_user")).await;

    assert!(outcome.ok);
    assert_eq!(outcome.publish, PublishStatus::Success);
    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].destination, TOPIC);
    assert_eq!(calls[0].subject, "[IAM change] CreateUser @ iam.amazonaws.com");
    assert_eq!(
        calls[0].body,
        "Account: 123456789012\n\
         Region: us-east-1\n\
         Identity: arn:aws:iam::123456789012:root\n\
         Source IP: 104.174.1.1\n\
         Time: 2025-08-24T02:38:47Z\n\
         Request: userName: tim\n\
         Severity: high\n\
         Event ID: b1a6f7c0-0f3e-4f4a-8d8e-2f0c3c9a1e11\n\
         User agent: aws-cli/2.15.30"
    );
}

#[tokio::test]
async fn open_security_group_names_offending_cidr() {
    let notifier = Arc::new(MockNotifier::new(TOPIC));
    let handler = default_handler(notifier.clone());

    let outcome = handler.handle(&fixture("open_security_group")).await;

    assert_eq!(outcome.categories, vec!["Open Security Group".to_string()]);
    let calls = notifier.calls();
    assert_eq!(
        calls[0].subject,
        "[Open Security Group] AuthorizeSecurityGroupIngress @ ec2.amazonaws.com"
    );
    assert!(calls[0]
        .body
        .contains("Request: groupId: sg-0a1b2c3d, cidr: 0.0.0.0/0"));
    assert!(calls[0].body.contains("Account: 111122223333"));
}

#[tokio::test]
async fn console_login_failure_alerts() {
    let notifier = Arc::new(MockNotifier::new(TOPIC));
    let handler = default_handler(notifier.clone());

    let outcome = handler.handle(&fixture("console_login_failure")).await;

    assert_eq!(outcome.categories, vec!["Login failure/No MFA".to_string()]);
    let calls = notifier.calls();
    assert_eq!(
        calls[0].subject,
        "[Login failure/No MFA] ConsoleLogin @ signin.amazonaws.com"
    );
    assert!(calls[0].body.contains("ConsoleLogin: Failure, MFAUsed: No"));
}

#[tokio::test]
async fn stop_logging_bare_record_alerts() {
    let notifier = Arc::new(MockNotifier::new(TOPIC));
    let handler = default_handler(notifier.clone());

    let outcome = handler.handle(&fixture("stop_logging")).await;

    assert_eq!(outcome.categories, vec!["CloudTrail tampering".to_string()]);
    assert!(notifier.calls()[0]
        .body
        .contains("name: arn:aws:cloudtrail:us-west-2:444455556666:trail/org-trail"));
}

#[tokio::test]
async fn s3_read_is_silent() {
    let notifier = Arc::new(MockNotifier::new(TOPIC));
    let handler = default_handler(notifier.clone());

    let outcome = handler.handle(&fixture("s3_get_object")).await;

    assert!(outcome.ok);
    assert_eq!(outcome.status, InvocationStatus::NoMatch);
    assert_eq!(notifier.call_count(), 0);
}

#[tokio::test]
async fn unlisted_source_is_filtered_by_default_config() {
    let notifier = Arc::new(MockNotifier::new(TOPIC));
    let handler = default_handler(notifier.clone());

    let mut raw = fixture("s3_get_object");
    raw["detail"]["eventSource"] = Value::from("lambda.amazonaws.com");
    raw["detail"]["errorCode"] = Value::from("AccessDenied");

    let outcome = handler.handle(&raw).await;
    assert_eq!(outcome.status, InvocationStatus::Filtered);
    assert_eq!(notifier.call_count(), 0);
}

#[tokio::test]
async fn delivery_failure_still_succeeds() {
    let notifier = Arc::new(MockNotifier::failing(
        TOPIC,
        NotifyError::Rejected("AuthorizationError: not allowed to publish".to_string()),
    ));
    let handler = default_handler(notifier.clone());

    let outcome = handler.handle(&fixture("create_user")).await;

    assert!(outcome.ok);
    assert_eq!(outcome.status, InvocationStatus::Alerted);
    assert_eq!(outcome.publish, PublishStatus::Failure);
    assert_eq!(notifier.call_count(), 1);

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["publish"], "failure");
    assert!(json["alerts"][0]["error"]
        .as_str()
        .unwrap()
        .contains("not allowed to publish"));
}
