//! Access Key Age Auditor - Standalone Binary
//!
//! Lists IAM users, flags access keys older than the rotation threshold,
//! writes a CSV report and emails it via SES. Intended to be triggered by a
//! scheduler (e.g., on the 1st of every month).
//!
//! ## Usage
//!
//! ```bash
//! # Audit with the default 25-day threshold
//! key-age-auditor --sender audit@lornu.ai --recipients platform@lornu.ai,security@lornu.ai
//!
//! # Settings from a TOML file, JSON outcome on stdout
//! key-age-auditor --config audit.toml --output json
//!
//! # Fail the invocation when the email could not be delivered
//! key-age-auditor --config audit.toml --fail-on-delivery-error
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use key_age_auditor::agents::dispatch::SesEmailSender;
use key_age_auditor::agents::key_audit::IamIdentityProvider;
use key_age_auditor::config::{parse_recipients, AuditConfig};
use key_age_auditor::{run, RunContext, RunOutcome, ScheduledEvent};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Access Key Age Auditor - report stale IAM access keys by email
#[derive(Parser, Debug)]
#[command(name = "key-age-auditor", version, about)]
struct Args {
    /// TOML config file (flags and environment override its values)
    #[arg(long, env = "KEY_AUDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Rotation threshold in days
    #[arg(long, env = "KEY_AUDIT_THRESHOLD_DAYS")]
    threshold_days: Option<u32>,

    /// Sender address (must be verified with SES)
    #[arg(long, env = "KEY_AUDIT_SENDER")]
    sender: Option<String>,

    /// Comma-separated recipient addresses
    #[arg(long, env = "KEY_AUDIT_RECIPIENTS")]
    recipients: Option<String>,

    /// SES region
    #[arg(long, env = "KEY_AUDIT_REGION")]
    region: Option<String>,

    /// Where to write the CSV report
    #[arg(long, env = "KEY_AUDIT_REPORT_PATH")]
    report_path: Option<PathBuf>,

    /// Scheduler event payload (JSON)
    #[arg(long, default_value = "")]
    event: String,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Exit non-zero when the report email could not be sent
    #[arg(long)]
    fail_on_delivery_error: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
}

impl Args {
    /// Layer flags and environment over the config file
    fn into_config(self) -> Result<AuditConfig> {
        let mut config = match &self.config {
            Some(path) => AuditConfig::from_file(path)?,
            None => AuditConfig::default(),
        };

        if let Some(days) = self.threshold_days {
            config.threshold_days = days;
        }
        if let Some(sender) = self.sender {
            config.sender = sender;
        }
        if let Some(recipients) = self.recipients {
            config.recipients = parse_recipients(&recipients);
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(path) = self.report_path {
            config.report_path = path;
        }

        config.validate()?;
        Ok(config)
    }
}

/// `RUST_LOG` wins over `--verbose` when set
fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.log_json);

    let output = args.output.clone();
    let fail_on_delivery_error = args.fail_on_delivery_error;
    let event = ScheduledEvent::from_json(&args.event)?;
    let config = args.into_config().context("Failed to load configuration")?;

    info!(
        threshold_days = config.threshold_days,
        recipients = config.recipients.len(),
        region = %config.region,
        "Starting access key age auditor"
    );

    let provider = IamIdentityProvider::from_env().await;
    let email_sender = SesEmailSender::for_region(&config.region).await;
    let context = RunContext::new(&config, Box::new(provider), Box::new(email_sender));

    let outcome = run(event, &context).await?;

    match output {
        OutputFormat::Text => print_text(&outcome),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
            );
        }
    }

    if !outcome.email_sent {
        warn!("Audit completed but the report was not emailed");
        if fail_on_delivery_error {
            anyhow::bail!(
                "Report delivery failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn print_text(outcome: &RunOutcome) {
    println!("\n{:<40} {:>10} {:<25}", "USER", "AGE(DAYS)", "CREATED");
    println!("{}", "-".repeat(77));
    for finding in &outcome.findings {
        println!(
            "{:<40} {:>10} {:<25}",
            truncate(&finding.account_name, 40),
            finding.age_in_days,
            finding.created_date.to_rfc3339()
        );
    }

    println!("\nStale keys: {}", outcome.findings.len());
    println!("Report:     {}", outcome.report_path.display());
    match (&outcome.message_id, &outcome.error) {
        (Some(id), _) => println!("Email:      sent (message id {})", id),
        (None, Some(err)) => println!("Email:      NOT sent ({})", err),
        (None, None) => println!("Email:      NOT sent"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
