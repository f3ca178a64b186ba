//! Scheduled run entry point
//!
//! Sequences one audit: evaluate keys, write the report, email it. Audit
//! failures and failures writing or reading the report abort the run. A
//! delivery failure is logged and recorded in the returned [`RunOutcome`] so
//! the caller can alert on it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::agents::dispatch::{DispatchError, EmailSender, ReportDispatcher};
use crate::agents::key_audit::{AgeFinding, IdentityProvider, KeyAuditAgent};
use crate::agents::report;
use crate::config::AuditConfig;

/// Trigger payload from the scheduler
///
/// Field names follow EventBridge scheduled events; all are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledEvent {
    pub id: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub source: Option<String>,
    #[serde(rename = "detail-type")]
    pub detail_type: Option<String>,
}

impl ScheduledEvent {
    /// Parse an event from JSON; an empty string yields the default event
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).context("Failed to parse scheduled event JSON")
    }
}

/// Result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub report_generated: bool,
    pub email_sent: bool,
    /// Stale keys, in report order
    pub findings: Vec<AgeFinding>,
    pub report_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Everything a run needs, wired from [`AuditConfig`]
pub struct RunContext {
    auditor: KeyAuditAgent,
    dispatcher: ReportDispatcher,
    report_path: PathBuf,
    now: Option<DateTime<Utc>>,
}

impl RunContext {
    pub fn new(
        config: &AuditConfig,
        provider: Box<dyn IdentityProvider>,
        email_sender: Box<dyn EmailSender>,
    ) -> Self {
        Self {
            auditor: KeyAuditAgent::new(provider).with_threshold_days(config.threshold_days),
            dispatcher: ReportDispatcher::new(
                email_sender,
                config.sender.clone(),
                config.recipients.clone(),
                config.threshold_days,
            ),
            report_path: config.report_path.clone(),
            now: None,
        }
    }

    /// Pin the audit clock
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Email delivery status of one run
#[derive(Debug, Default)]
struct Delivery {
    sent: bool,
    message_id: Option<String>,
    error: Option<String>,
}

/// Send the report; only send-side failures are absorbed
async fn deliver(dispatcher: &ReportDispatcher, report_path: &Path) -> Result<Delivery> {
    match dispatcher.send_report(report_path).await {
        Ok(id) => Ok(Delivery {
            sent: true,
            message_id: Some(id),
            error: None,
        }),
        Err(DispatchError::Delivery(e)) => {
            error!(error = %e, "Report email was not delivered");
            Ok(Delivery {
                error: Some(e.to_string()),
                ..Delivery::default()
            })
        }
        Err(e @ DispatchError::Artifact { .. }) => {
            Err(e).context("Failed to read report for delivery")
        }
    }
}

/// Run one audit
pub async fn run(event: ScheduledEvent, context: &RunContext) -> Result<RunOutcome> {
    info!(
        event_id = event.id.as_deref().unwrap_or("-"),
        source = event.source.as_deref().unwrap_or("manual"),
        threshold_days = context.auditor.threshold_days(),
        "Access key audit triggered"
    );

    let now = context.now.unwrap_or_else(Utc::now);
    let findings = context
        .auditor
        .evaluate_access_keys_at(now)
        .await
        .context("Access key audit failed")?;

    report::write_report(&context.report_path, &findings).with_context(|| {
        format!(
            "Failed to write report to {}",
            context.report_path.display()
        )
    })?;

    let delivery = deliver(&context.dispatcher, &context.report_path).await?;

    Ok(RunOutcome {
        report_generated: true,
        email_sent: delivery.sent,
        findings,
        report_path: context.report_path.clone(),
        message_id: delivery.message_id,
        error: delivery.error,
        completed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::dispatch::DeliveryError;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubSender {
        reject: bool,
    }

    #[async_trait]
    impl EmailSender for StubSender {
        async fn send_raw_message(
            &self,
            _sender: &str,
            _recipients: &[String],
            _raw_mime_payload: Vec<u8>,
        ) -> Result<String, DeliveryError> {
            if self.reject {
                Err(DeliveryError::Send("Daily message quota exceeded".to_string()))
            } else {
                Ok("msg-1".to_string())
            }
        }
    }

    fn dispatcher(reject: bool) -> ReportDispatcher {
        ReportDispatcher::new(
            Box::new(StubSender { reject }),
            "audit@example.com",
            vec!["team@example.com".to_string()],
            25,
        )
    }

    #[tokio::test]
    async fn test_unreadable_report_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("IAM_Users_Report.csv");

        assert!(deliver(&dispatcher(false), &missing).await.is_err());
    }

    #[tokio::test]
    async fn test_send_failure_is_recorded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IAM_Users_Report.csv");
        report::write_report(&path, &[]).unwrap();

        let delivery = deliver(&dispatcher(true), &path).await.unwrap();
        assert!(!delivery.sent);
        assert!(delivery.message_id.is_none());
        assert!(delivery.error.unwrap().contains("quota"));

        let delivery = deliver(&dispatcher(false), &path).await.unwrap();
        assert!(delivery.sent);
        assert_eq!(delivery.message_id.as_deref(), Some("msg-1"));
    }

    #[test]
    fn test_parse_eventbridge_event() {
        let event = ScheduledEvent::from_json(
            r#"{
                "id": "cdc73f9d-aea9-11e3-9d5a-835b769c0d9c",
                "detail-type": "Scheduled Event",
                "source": "aws.events",
                "time": "2024-06-01T00:00:00Z",
                "region": "us-west-2",
                "detail": {}
            }"#,
        )
        .unwrap();

        assert_eq!(event.source.as_deref(), Some("aws.events"));
        assert_eq!(event.detail_type.as_deref(), Some("Scheduled Event"));
        assert!(event.time.is_some());
    }

    #[test]
    fn test_empty_event() {
        let event = ScheduledEvent::from_json("  ").unwrap();
        assert!(event.id.is_none());
        assert!(ScheduledEvent::from_json("{not json").is_err());
    }
}
