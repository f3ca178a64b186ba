//! Report Dispatcher
//!
//! Emails the report artifact as an attachment to the configured recipient
//! list. Every recipient is passed in a single `SendRawEmail` call through
//! its native multi-recipient field.
//!
//! Failing to read the report artifact is a [`DispatchError::Artifact`] and is
//! kept apart from send-side [`DeliveryError`]s, so the caller can treat the
//! former as fatal and decide on its own whether a failed delivery fails the run.

pub mod message;
pub mod ses;

pub use message::{Attachment, ReportMessage};
pub use ses::SesEmailSender;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Trait for raw email delivery
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Send a pre-rendered MIME message, returning the provider message id
    async fn send_raw_message(
        &self,
        sender: &str,
        recipients: &[String],
        raw_mime_payload: Vec<u8>,
    ) -> Result<String, DeliveryError>;
}

/// Send-side errors: the message could not be delivered
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No recipients configured
    #[error("No recipients configured")]
    NoRecipients,

    /// The email API rejected or failed the send
    #[error("Email delivery failed: {0}")]
    Send(String),
}

/// Errors returned by [`ReportDispatcher::send_report`]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The report file could not be read
    #[error("Failed to read report {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Sends the stale key report by email
pub struct ReportDispatcher {
    sender_client: Box<dyn EmailSender>,
    sender: String,
    recipients: Vec<String>,
    threshold_days: u32,
}

impl ReportDispatcher {
    pub fn new(
        sender_client: Box<dyn EmailSender>,
        sender: impl Into<String>,
        recipients: Vec<String>,
        threshold_days: u32,
    ) -> Self {
        Self {
            sender_client,
            sender: sender.into(),
            recipients,
            threshold_days,
        }
    }

    /// Email the file at `artifact_path`, returning the message id
    pub async fn send_report(&self, artifact_path: &Path) -> Result<String, DispatchError> {
        let content = tokio::fs::read(artifact_path)
            .await
            .map_err(|source| DispatchError::Artifact {
                path: artifact_path.display().to_string(),
                source,
            })?;

        let filename = artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.csv".to_string());

        if self.recipients.is_empty() {
            return Err(DeliveryError::NoRecipients.into());
        }

        let message = self.build_message(Attachment { filename, content });
        let message_id = self
            .sender_client
            .send_raw_message(&self.sender, &self.recipients, message.to_mime())
            .await?;

        info!(
            message_id = %message_id,
            recipients = self.recipients.len(),
            "Report email sent"
        );
        Ok(message_id)
    }

    fn build_message(&self, attachment: Attachment) -> ReportMessage {
        let days = self.threshold_days;
        ReportMessage {
            sender: self.sender.clone(),
            recipients: self.recipients.clone(),
            subject: format!("Data for AccessKeys older than {} days", days),
            body_text: format!(
                "Hello,\r\nPlease see the attached file for a list of AccessKeys which were created over {} days ago.",
                days
            ),
            body_html: format!(
                "<html>\n<head></head>\n<body>\n<h1>Hello Everyone!</h1>\n<p>Please see the attached file for a list of AccessKeys which were created over {} days ago.</p>\n</body>\n</html>\n",
                days
            ),
            attachment,
        }
    }
}
