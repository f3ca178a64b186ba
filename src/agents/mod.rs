//! Agent modules for the access key auditor
//!
//! - `key_audit`: Enumerates accounts and flags stale access keys
//! - `report`: CSV report artifact
//! - `dispatch`: Emails the report to the team

pub mod dispatch;
pub mod key_audit;
pub mod report;

pub use dispatch::ReportDispatcher;
pub use key_audit::KeyAuditAgent;
