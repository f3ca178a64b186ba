//! AWS IAM identity provider
//!
//! Lists IAM users and their access key metadata. Both listings are paged by
//! IAM (`IsTruncated` / `Marker`); every page is followed to the end.
//! Credentials come from the default AWS provider chain.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::{AccessKeyMetadata, StatusType};
use aws_sdk_iam::Client as IamClient;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::types::{AccessKey, Account, KeyAuditError, KeyStatus};
use super::IdentityProvider;

/// IAM-backed [`IdentityProvider`]
pub struct IamIdentityProvider {
    client: IamClient,
}

impl IamIdentityProvider {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS configuration chain
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(IamClient::new(&config))
    }
}

#[async_trait]
impl IdentityProvider for IamIdentityProvider {
    async fn list_accounts(&self) -> Result<Vec<Account>, KeyAuditError> {
        let mut accounts = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .client
                .list_users()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    KeyAuditError::ProviderQuery(format!(
                        "list_users failed: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;

            accounts.extend(page.users().iter().map(|u| Account::new(u.user_name())));
            debug!(total = accounts.len(), "Fetched IAM users page");

            marker = next_marker(page.is_truncated(), page.marker(), "list_users")?;
            if marker.is_none() {
                break;
            }
        }

        Ok(accounts)
    }

    async fn list_access_keys(&self, account_name: &str) -> Result<Vec<AccessKey>, KeyAuditError> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .client
                .list_access_keys()
                .user_name(account_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| {
                    KeyAuditError::ProviderQuery(format!(
                        "list_access_keys failed for user {}: {}",
                        account_name,
                        DisplayErrorContext(&e)
                    ))
                })?;

            for metadata in page.access_key_metadata() {
                keys.push(access_key_from_metadata(account_name, metadata)?);
            }

            marker = next_marker(page.is_truncated(), page.marker(), "list_access_keys")?;
            if marker.is_none() {
                break;
            }
        }

        Ok(keys)
    }
}

/// Marker for the next page, or `None` once the listing is exhausted
fn next_marker(
    is_truncated: bool,
    marker: Option<&str>,
    operation: &str,
) -> Result<Option<String>, KeyAuditError> {
    match (is_truncated, marker) {
        (false, _) => Ok(None),
        (true, Some(m)) if !m.is_empty() => Ok(Some(m.to_string())),
        (true, _) => Err(KeyAuditError::MalformedResponse(format!(
            "{} reported a truncated page without a marker",
            operation
        ))),
    }
}

fn access_key_from_metadata(
    account_name: &str,
    metadata: &AccessKeyMetadata,
) -> Result<AccessKey, KeyAuditError> {
    let access_key_id = metadata
        .access_key_id()
        .ok_or_else(|| {
            KeyAuditError::MalformedResponse(format!("access key of {} has no id", account_name))
        })?
        .to_string();

    let create_date = metadata.create_date().ok_or_else(|| {
        KeyAuditError::MalformedResponse(format!("access key {} has no CreateDate", access_key_id))
    })?;

    let created_at = DateTime::<Utc>::from_timestamp(create_date.secs(), create_date.subsec_nanos())
        .ok_or_else(|| {
            KeyAuditError::MalformedResponse(format!(
                "access key {} has an out-of-range CreateDate",
                access_key_id
            ))
        })?;

    let status = match metadata.status() {
        Some(StatusType::Active) => KeyStatus::Active,
        Some(StatusType::Inactive) => KeyStatus::Inactive,
        _ => KeyStatus::Unknown,
    };

    Ok(AccessKey {
        access_key_id,
        account_name: metadata.user_name().unwrap_or(account_name).to_string(),
        created_at,
        status,
    })
}
