//! End-to-end runs against in-memory identity and email providers

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use key_age_auditor::agents::dispatch::{DeliveryError, EmailSender};
use key_age_auditor::agents::key_audit::{
    AccessKey, Account, IdentityProvider, KeyAuditError, KeyStatus,
};
use key_age_auditor::agents::report::read_report;
use key_age_auditor::{run, AuditConfig, RunContext, ScheduledEvent};
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
}

#[derive(Default)]
struct FakeIam {
    accounts: Vec<Account>,
    keys: HashMap<String, Vec<AccessKey>>,
    fail: bool,
}

impl FakeIam {
    fn with_user(mut self, name: &str, key_ages: &[i64]) -> Self {
        self.accounts.push(Account::new(name));
        let keys = key_ages
            .iter()
            .enumerate()
            .map(|(i, age)| AccessKey {
                access_key_id: format!("AKIA{}{}", name.to_uppercase(), i),
                account_name: name.to_string(),
                created_at: now() - Duration::days(*age),
                status: KeyStatus::Active,
            })
            .collect();
        self.keys.insert(name.to_string(), keys);
        self
    }
}

#[async_trait]
impl IdentityProvider for FakeIam {
    async fn list_accounts(&self) -> Result<Vec<Account>, KeyAuditError> {
        if self.fail {
            return Err(KeyAuditError::ProviderQuery("AccessDenied".to_string()));
        }
        Ok(self.accounts.clone())
    }

    async fn list_access_keys(&self, account_name: &str) -> Result<Vec<AccessKey>, KeyAuditError> {
        Ok(self.keys.get(account_name).cloned().unwrap_or_default())
    }
}

#[derive(Clone, Default)]
struct FakeSes {
    sent: Arc<Mutex<Vec<(Vec<String>, String)>>>,
    reject: bool,
}

#[async_trait]
impl EmailSender for FakeSes {
    async fn send_raw_message(
        &self,
        _sender: &str,
        recipients: &[String],
        raw_mime_payload: Vec<u8>,
    ) -> Result<String, DeliveryError> {
        if self.reject {
            return Err(DeliveryError::Send(
                "Email address is not verified".to_string(),
            ));
        }
        let raw = String::from_utf8_lossy(&raw_mime_payload).into_owned();
        self.sent.lock().unwrap().push((recipients.to_vec(), raw));
        Ok("0100018f-message".to_string())
    }
}

fn config(dir: &TempDir) -> AuditConfig {
    AuditConfig {
        sender: "audit@example.com".to_string(),
        recipients: vec![
            "platform@example.com".to_string(),
            "security@example.com".to_string(),
        ],
        report_path: dir.path().join("IAM_Users_Report.csv"),
        ..AuditConfig::default()
    }
}

#[tokio::test]
async fn test_scenarios_produce_expected_rows() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let iam = FakeIam::default()
        .with_user("alice", &[30])
        .with_user("bob", &[10])
        .with_user("carol", &[26, 5]);
    let ses = FakeSes::default();

    let ctx = RunContext::new(&cfg, Box::new(iam), Box::new(ses.clone())).with_now(now());
    let outcome = run(ScheduledEvent::default(), &ctx).await.unwrap();

    assert!(outcome.report_generated);
    assert!(outcome.email_sent);
    assert_eq!(outcome.findings.len(), 2);
    assert_eq!(outcome.message_id.as_deref(), Some("0100018f-message"));
    assert!(outcome.error.is_none());

    let rows = read_report(&cfg.report_path).unwrap();
    assert_eq!(rows, outcome.findings);
    assert_eq!(rows[0].account_name, "alice");
    assert_eq!(rows[0].age_in_days, 30);
    assert_eq!(rows[0].created_date, now() - Duration::days(30));
    assert_eq!(rows[1].account_name, "carol");
    assert_eq!(rows[1].age_in_days, 26);

    let sent = ses.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, cfg.recipients);
    assert!(sent[0].1.contains("filename=\"IAM_Users_Report.csv\""));
}

#[tokio::test]
async fn test_empty_inventory_still_sends_header_only_report() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let ses = FakeSes::default();

    let ctx = RunContext::new(&cfg, Box::new(FakeIam::default()), Box::new(ses.clone()))
        .with_now(now());
    let outcome = run(ScheduledEvent::default(), &ctx).await.unwrap();

    assert!(outcome.findings.is_empty());
    assert!(outcome.email_sent);
    assert_eq!(
        std::fs::read_to_string(&cfg.report_path).unwrap(),
        "user_name,age_of_key,created_date\n"
    );
    assert_eq!(ses.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delivery_error_is_reported_not_raised() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let ses = FakeSes {
        reject: true,
        ..FakeSes::default()
    };
    let iam = FakeIam::default().with_user("alice", &[30]);

    let ctx = RunContext::new(&cfg, Box::new(iam), Box::new(ses)).with_now(now());
    let outcome = run(ScheduledEvent::default(), &ctx).await.unwrap();

    assert!(outcome.report_generated);
    assert!(!outcome.email_sent);
    assert!(outcome.message_id.is_none());
    assert!(outcome.error.unwrap().contains("not verified"));
    assert_eq!(read_report(&cfg.report_path).unwrap().len(), 1);
}

#[tokio::test]
async fn test_provider_failure_aborts_before_report() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let ses = FakeSes::default();
    let iam = FakeIam {
        fail: true,
        ..FakeIam::default()
    };

    let ctx = RunContext::new(&cfg, Box::new(iam), Box::new(ses.clone())).with_now(now());
    assert!(run(ScheduledEvent::default(), &ctx).await.is_err());

    assert!(!cfg.report_path.exists());
    assert!(ses.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_outcome_serializes_for_scheduler() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let ctx = RunContext::new(
        &cfg,
        Box::new(FakeIam::default()),
        Box::new(FakeSes::default()),
    )
    .with_now(now());

    let outcome = run(ScheduledEvent::default(), &ctx).await.unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["report_generated"], true);
    assert_eq!(json["email_sent"], true);
    assert_eq!(json["findings"], serde_json::json!([]));
    assert!(json.get("error").is_none());
}
