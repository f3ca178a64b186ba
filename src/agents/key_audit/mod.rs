//! Access Key Age Audit Agent
//!
//! Enumerates identity accounts, inspects the creation date of each
//! long-lived access key and flags keys older than the rotation threshold.
//!
//! ## Flow
//!
//! 1. List all accounts from the identity provider
//! 2. List the access keys of each account
//! 3. Compute key age in whole days against the current UTC instant
//! 4. Emit one [`AgeFinding`] per key at or past the threshold
//!
//! Accounts and keys are processed strictly one call at a time. Any provider
//! failure aborts the audit; partial results are never returned.
//!
//! ## Example Usage
//!
//! ```ignore
//! use key_age_auditor::agents::key_audit::{IamIdentityProvider, KeyAuditAgent};
//!
//! let provider = IamIdentityProvider::from_env().await;
//! let agent = KeyAuditAgent::new(Box::new(provider)).with_threshold_days(25);
//! let findings = agent.evaluate_access_keys().await?;
//! ```

pub mod iam;
pub mod types;

pub use iam::IamIdentityProvider;
pub use types::{AccessKey, Account, AgeFinding, KeyAuditError, KeyStatus};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Default rotation threshold in days
pub const DEFAULT_THRESHOLD_DAYS: u32 = 25;

/// Trait for identity account inventory queries
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// List every account, following pagination to the end
    async fn list_accounts(&self) -> Result<Vec<Account>, KeyAuditError>;

    /// List the access keys owned by `account_name`
    async fn list_access_keys(&self, account_name: &str) -> Result<Vec<AccessKey>, KeyAuditError>;
}

/// Access Key Age Audit Agent
pub struct KeyAuditAgent {
    provider: Box<dyn IdentityProvider>,
    /// Rotation threshold in days (inclusive)
    threshold_days: u32,
}

impl KeyAuditAgent {
    /// Create a new audit agent with the default 25-day threshold
    pub fn new(provider: Box<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            threshold_days: DEFAULT_THRESHOLD_DAYS,
        }
    }

    /// Set custom rotation threshold
    pub fn with_threshold_days(mut self, days: u32) -> Self {
        self.threshold_days = days;
        self
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    /// Evaluate all access keys against the current UTC instant
    pub async fn evaluate_access_keys(&self) -> Result<Vec<AgeFinding>, KeyAuditError> {
        self.evaluate_access_keys_at(Utc::now()).await
    }

    /// Evaluate all access keys against a fixed instant
    ///
    /// Findings are returned in provider order: account-list order, then
    /// key-list order within each account.
    pub async fn evaluate_access_keys_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AgeFinding>, KeyAuditError> {
        let start = std::time::Instant::now();
        info!(threshold_days = self.threshold_days, "Starting access key audit");

        let accounts = self.provider.list_accounts().await?;
        let mut keys_inspected = 0usize;
        let mut findings = Vec::new();

        for account in &accounts {
            let keys = self.provider.list_access_keys(&account.name).await?;
            debug!(account = %account.name, keys = keys.len(), "Listed access keys");
            keys_inspected += keys.len();

            for key in &keys {
                if let Some(finding) = AgeFinding::evaluate(key, self.threshold_days, now) {
                    info!(
                        account = %finding.account_name,
                        access_key_id = %key.access_key_id,
                        status = %key.status,
                        age_days = finding.age_in_days,
                        "Stale access key"
                    );
                    findings.push(finding);
                }
            }
        }

        info!(
            accounts = accounts.len(),
            keys = keys_inspected,
            findings = findings.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Access key audit complete"
        );

        Ok(findings)
    }
}
