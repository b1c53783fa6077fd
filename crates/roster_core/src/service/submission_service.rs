//! Submission-and-notification workflow.
//!
//! # Responsibility
//! - Validate one submission, dedupe it, persist it, and notify the provider.
//! - Turn every terminal state into a user-visible status message.
//!
//! # Invariants
//! - Invalid input never reaches the repository or the notifier.
//! - A duplicate key never writes and never notifies.
//! - A new key is written once and notified at most once.
//! - A failed notification does not roll back the stored record.

use crate::config::WorkflowConfig;
use crate::model::identity::{DedupKey, Identity, IdentityValidationError};
use crate::notify::{NotificationPayload, Notifier, NotifyError};
use crate::repo::identity_repo::{IdentityRepository, RepoError, RepoResult};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Raw form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub name: String,
    pub email: Option<String>,
}

impl SubmissionRequest {
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            name: name.into(),
            email,
        }
    }
}

/// Terminal state of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Stored and notified.
    Success(Identity),
    /// Key already present; nothing written or sent.
    Duplicate { key: String },
    /// Stored, but the notification failed. The record is kept.
    PersistedButNotNotified {
        identity: Identity,
        error: NotifyError,
    },
}

/// Flash category shown next to a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl StatusLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// User-visible feedback for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    fn new(level: StatusLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

impl Display for StatusMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.text)
    }
}

impl SubmissionOutcome {
    pub fn status_message(&self) -> StatusMessage {
        match self {
            Self::Success(_) => {
                StatusMessage::new(StatusLevel::Success, "Email sent to recipients.")
            }
            Self::Duplicate { key } => {
                StatusMessage::new(StatusLevel::Info, format!("`{key}` already exists."))
            }
            Self::PersistedButNotNotified { identity, error } => StatusMessage::new(
                StatusLevel::Warning,
                format!(
                    "`{}` was saved, but sending the email failed: {error}",
                    identity.name
                ),
            ),
        }
    }
}

/// Request-level failure. Terminal states are not errors.
#[derive(Debug)]
pub enum SubmissionError {
    /// Input rejected before any side effect.
    Validation(IdentityValidationError),
    /// Store failure other than a duplicate key.
    Repo(RepoError),
}

impl SubmissionError {
    pub fn status_message(&self) -> StatusMessage {
        match self {
            Self::Validation(err) => StatusMessage::new(StatusLevel::Danger, err.to_string()),
            Self::Repo(err) => {
                StatusMessage::new(StatusLevel::Danger, format!("could not save submission: {err}"))
            }
        }
    }
}

impl Display for SubmissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SubmissionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<IdentityValidationError> for SubmissionError {
    fn from(value: IdentityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for SubmissionError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Submission workflow over a record store and a notifier.
pub struct SubmissionService<R: IdentityRepository, N: Notifier> {
    repo: R,
    notifier: N,
    config: WorkflowConfig,
}

impl<R: IdentityRepository, N: Notifier> SubmissionService<R, N> {
    /// Creates a workflow. Deduplication follows `repo.dedup_key()`.
    pub fn new(repo: R, notifier: N, config: WorkflowConfig) -> Self {
        Self {
            repo,
            notifier,
            config,
        }
    }

    /// Runs one submission to a terminal state.
    ///
    /// # Errors
    /// - `Validation` for empty name, missing required email, or malformed email.
    /// - `Repo` when the store fails for a reason other than a duplicate key.
    pub fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let identity = self.validate(request)?;
        let key_field = self.repo.dedup_key();
        let key = identity
            .dedup_value(key_field)
            .ok_or(IdentityValidationError::MissingEmail)?
            .to_string();

        if self.repo.find_by_key(&key)?.is_some() {
            info!(
                "event=submission module=service status=duplicate stage=lookup dedup_field={}",
                key_field
            );
            return Ok(SubmissionOutcome::Duplicate { key });
        }

        let stored = match self.repo.insert(&identity) {
            Ok(stored) => stored,
            Err(RepoError::DuplicateKey(key)) => {
                info!(
                    "event=submission module=service status=duplicate stage=insert dedup_field={}",
                    key_field
                );
                return Ok(SubmissionOutcome::Duplicate { key });
            }
            Err(err) => {
                error!(
                    "event=submission module=service status=error stage=insert error={}",
                    err
                );
                return Err(err.into());
            }
        };

        let payload = NotificationPayload {
            name: stored.name.clone(),
            email: stored.email.clone(),
        };
        match self.notifier.notify(&payload) {
            Ok(()) => {
                info!(
                    "event=submission module=service status=ok identity_id={}",
                    stored.uuid
                );
                Ok(SubmissionOutcome::Success(stored))
            }
            Err(error) => {
                warn!(
                    "event=submission module=service status=not_notified identity_id={}",
                    stored.uuid
                );
                Ok(SubmissionOutcome::PersistedButNotNotified {
                    identity: stored,
                    error,
                })
            }
        }
    }

    /// Lists stored identities in insertion order.
    pub fn list_identities(&self) -> RepoResult<Vec<Identity>> {
        self.repo.list_all()
    }

    /// Email is mandatory when configured so or when it is the dedup key.
    fn email_required(&self) -> bool {
        self.config.require_email || self.repo.dedup_key() == DedupKey::Email
    }

    fn validate(&self, request: &SubmissionRequest) -> Result<Identity, IdentityValidationError> {
        let identity = Identity::new(request.name.as_str(), request.email.clone());
        identity.validate()?;
        if identity.email.is_none() && self.email_required() {
            return Err(IdentityValidationError::MissingEmail);
        }
        Ok(identity)
    }
}
