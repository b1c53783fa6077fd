//! Core logic for Roster: accept a submission, store it once, notify operators.
//! This crate owns every business invariant; front ends only render outcomes.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError, MailgunConfig, WorkflowConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::identity::{DedupKey, Identity, IdentityId, IdentityValidationError};
pub use notify::mailgun::MailgunNotifier;
pub use notify::{NotificationPayload, Notifier, NotifyError, NotifyResult};
pub use repo::identity_repo::{IdentityRepository, RepoError, RepoResult, SqliteIdentityRepository};
pub use service::submission_service::{
    StatusLevel, StatusMessage, SubmissionError, SubmissionOutcome, SubmissionRequest,
    SubmissionService,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
