//! Access Key Age Auditor Library
//!
//! Flags IAM access keys older than a rotation threshold, writes a CSV
//! report and emails it to a recipient list.

pub mod agents;
pub mod config;
pub mod handler;

pub use agents::{KeyAuditAgent, ReportDispatcher};
pub use config::AuditConfig;
pub use handler::{run, RunContext, RunOutcome, ScheduledEvent};
