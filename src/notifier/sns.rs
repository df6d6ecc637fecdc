//! SNS topic notifier.

use super::{Notifier, NotifyError, PublishReceipt};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sns::config::retry::RetryConfig;
use aws_sdk_sns::config::timeout::TimeoutConfig;
use aws_sdk_sns::error::{DisplayErrorContext, SdkError};
use aws_sdk_sns::Client;
use std::time::Duration;
use tracing::debug;

const TARGET_NOTIFIER: &str = "notifier";

/// SNS rejects subjects longer than this many characters.
pub const SNS_SUBJECT_LIMIT: usize = 100;

/// Publishes alerts to a single SNS topic.
pub struct SnsNotifier {
    client: Client,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    /// Build a client from the ambient AWS environment.
    ///
    /// SDK retries are disabled so each alert is one attempt bounded by
    /// `publish_timeout`.
    pub async fn from_env(topic_arn: impl Into<String>, publish_timeout: Duration) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let sns_config = aws_sdk_sns::config::Builder::from(&sdk_config)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(publish_timeout)
                    .build(),
            )
            .build();
        Self::new(Client::from_conf(sns_config), topic_arn)
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    fn destination(&self) -> &str {
        &self.topic_arn
    }

    async fn publish(&self, subject: &str, body: &str) -> Result<PublishReceipt, NotifyError> {
        if self.topic_arn.trim().is_empty() {
            return Err(NotifyError::InvalidDestination(
                "topic ARN is empty".to_string(),
            ));
        }

        let subject = truncate_subject(subject);
        debug!(
            target: TARGET_NOTIFIER,
            topic = %self.topic_arn,
            subject = %subject,
            "Publishing alert to SNS"
        );

        let result = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(subject)
            .message(body)
            .send()
            .await;

        match result {
            Ok(output) => Ok(PublishReceipt {
                message_id: output.message_id().map(str::to_string),
            }),
            Err(err) => Err(publish_error(&err)),
        }
    }
}

/// Map an SDK failure: the service answering with an error is a rejection,
/// anything that kept the request from completing is transport.
fn publish_error<E, R>(err: &SdkError<E, R>) -> NotifyError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let reason = DisplayErrorContext(err).to_string();
    match err {
        SdkError::ServiceError(_) => NotifyError::Rejected(reason),
        _ => NotifyError::Transport(reason),
    }
}

/// Fit a subject into SNS limits: single line, at most [`SNS_SUBJECT_LIMIT`] characters.
pub fn truncate_subject(subject: &str) -> String {
    subject
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(SNS_SUBJECT_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sns::operation::publish::PublishError;
    use aws_sdk_sns::types::error::AuthorizationErrorException;

    #[test]
    fn test_service_error_is_rejected() {
        let err: SdkError<PublishError, ()> = SdkError::service_error(
            PublishError::AuthorizationErrorException(
                AuthorizationErrorException::builder()
                    .message("not allowed to publish")
                    .build(),
            ),
            (),
        );

        match publish_error(&err) {
            NotifyError::Rejected(reason) => assert!(reason.contains("not allowed to publish")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_is_transport() {
        let err: SdkError<PublishError, ()> = SdkError::timeout_error("publish timed out");

        match publish_error(&err) {
            NotifyError::Transport(reason) => assert!(reason.contains("timed out")),
            other => panic!("expected transport failure, got {other:?}"),
        }
    }

    #[test]
    fn test_construction_failure_is_transport() {
        let err: SdkError<PublishError, ()> =
            SdkError::construction_failure("missing topic");
        assert!(matches!(publish_error(&err), NotifyError::Transport(_)));
    }

    #[test]
    fn test_short_subject_unchanged() {
        let subject = "[IAM change] CreateUser @ iam.amazonaws.com";
        assert_eq!(truncate_subject(subject), subject);
    }

    #[test]
    fn test_long_subject_truncated_on_char_boundary() {
        let subject = format!("[Access denied] {} @ s3.amazonaws.com", "é".repeat(200));
        let truncated = truncate_subject(&subject);
        assert_eq!(truncated.chars().count(), SNS_SUBJECT_LIMIT);
        assert!(subject.starts_with(&truncated));
    }

    #[test]
    fn test_control_characters_replaced() {
        assert_eq!(truncate_subject("a\nb\tc"), "a b c");
    }
}
