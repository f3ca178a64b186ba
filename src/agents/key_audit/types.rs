//! Types for access key age auditing
//!
//! Accounts and access keys are read from the identity provider and never
//! mutated here. An `AgeFinding` is derived per stale key and lives only for
//! the duration of one audit run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity principal that may own access keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account name (IAM user name)
    pub name: String,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Provider-reported status of an access key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Inactive,
    #[default]
    Unknown,
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyStatus::Active => write!(f, "active"),
            KeyStatus::Inactive => write!(f, "inactive"),
            KeyStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Long-lived access key metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKey {
    /// Access key identifier (e.g., AKIA...)
    pub access_key_id: String,
    /// Name of the owning account
    pub account_name: String,
    /// Creation instant
    pub created_at: DateTime<Utc>,
    /// Active/Inactive as reported by the provider
    #[serde(default)]
    pub status: KeyStatus,
}

impl AccessKey {
    /// Whole days elapsed between `created_at` and `now`, floored.
    ///
    /// A key stamped in the future yields a negative age.
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = now.signed_duration_since(self.created_at);
        // num_days truncates toward zero
        let days = elapsed.num_days();
        if elapsed < Duration::days(days) {
            days - 1
        } else {
            days
        }
    }
}

/// One report row: a key at or past the rotation threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeFinding {
    #[serde(rename = "user_name")]
    pub account_name: String,
    #[serde(rename = "age_of_key")]
    pub age_in_days: i64,
    pub created_date: DateTime<Utc>,
}

impl AgeFinding {
    /// Build a finding when `key` is at least `threshold_days` old at `now`
    pub fn evaluate(key: &AccessKey, threshold_days: u32, now: DateTime<Utc>) -> Option<Self> {
        let age_in_days = key.age_in_days(now);
        (age_in_days >= i64::from(threshold_days)).then(|| Self {
            account_name: key.account_name.clone(),
            age_in_days,
            created_date: key.created_at,
        })
    }
}

/// Errors that can occur while auditing access keys
#[derive(Debug, Error)]
pub enum KeyAuditError {
    /// Listing accounts or keys failed (authorization, throttling, network)
    #[error("Identity provider query failed: {0}")]
    ProviderQuery(String),

    /// Provider returned a record missing a required field
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}
