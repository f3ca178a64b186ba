//! Amazon SES email sender
//!
//! Submits pre-built MIME messages via `SendRawEmail`. Sender and recipient
//! addresses must be verified while the account is in the SES sandbox.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ses::config::Region;
use aws_sdk_ses::error::DisplayErrorContext;
use aws_sdk_ses::primitives::Blob;
use aws_sdk_ses::types::RawMessage;
use aws_sdk_ses::Client as SesClient;
use tracing::debug;

use super::{DeliveryError, EmailSender};

/// SES-backed [`EmailSender`]
pub struct SesEmailSender {
    client: SesClient,
}

impl SesEmailSender {
    pub fn new(client: SesClient) -> Self {
        Self { client }
    }

    /// Build a client for `region` from the default AWS configuration chain
    pub async fn for_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(SesClient::new(&config))
    }
}

#[async_trait]
impl EmailSender for SesEmailSender {
    async fn send_raw_message(
        &self,
        sender: &str,
        recipients: &[String],
        raw_mime_payload: Vec<u8>,
    ) -> Result<String, DeliveryError> {
        debug!(
            sender = %sender,
            recipients = recipients.len(),
            bytes = raw_mime_payload.len(),
            "Submitting raw email to SES"
        );

        let raw_message = RawMessage::builder()
            .data(Blob::new(raw_mime_payload))
            .build()
            .map_err(|e| DeliveryError::Send(format!("invalid raw message: {}", e)))?;

        let response = self
            .client
            .send_raw_email()
            .source(sender)
            .set_destinations(Some(recipients.to_vec()))
            .raw_message(raw_message)
            .send()
            .await
            .map_err(|e| DeliveryError::Send(DisplayErrorContext(&e).to_string()))?;

        Ok(response.message_id().to_string())
    }
}
