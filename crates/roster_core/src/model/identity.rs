//! Identity domain model.
//!
//! # Responsibility
//! - Define the single record persisted for each accepted submission.
//! - Validate name/email shape before any storage or notification work.
//!
//! # Invariants
//! - `name` is trimmed and never empty.
//! - `email`, when present, is trimmed and email-shaped.
//! - Records are append-only: created once, never updated or deleted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Stable identifier of one stored identity.
pub type IdentityId = Uuid;

/// Field used to decide whether a submission is new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    /// One record per distinct name.
    #[default]
    Name,
    /// One record per distinct email address.
    Email,
}

impl DedupKey {
    /// Storage/config spelling of this key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
        }
    }
}

impl Display for DedupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DedupKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            other => Err(format!("unsupported dedup key `{other}`; expected name|email")),
        }
    }
}

/// Validation failures for identity input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValidationError {
    EmptyName,
    MissingEmail,
    InvalidEmail(String),
}

impl Display for IdentityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name is required"),
            Self::MissingEmail => write!(f, "email is required"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
        }
    }
}

impl Error for IdentityValidationError {}

/// One accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uuid: IdentityId,
    pub name: String,
    pub email: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at_ms: i64,
}

impl Identity {
    /// Creates a new identity with a generated ID and the current timestamp.
    ///
    /// Inputs are trimmed; a blank email becomes `None`. Call
    /// [`Identity::validate`] before persisting.
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            email: normalize_email(email),
            created_at_ms: now_epoch_ms(),
        }
    }

    /// Checks name/email shape.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is blank.
    /// - `InvalidEmail` when `email` is present but not `local@domain.tld`.
    pub fn validate(&self) -> Result<(), IdentityValidationError> {
        if self.name.trim().is_empty() {
            return Err(IdentityValidationError::EmptyName);
        }
        if let Some(email) = self.email.as_deref() {
            if !is_email_shaped(email) {
                return Err(IdentityValidationError::InvalidEmail(email.to_string()));
            }
        }
        Ok(())
    }

    /// Returns the value of the given dedup field, if set.
    pub fn dedup_value(&self, key: DedupKey) -> Option<&str> {
        match key {
            DedupKey::Name => Some(self.name.as_str()),
            DedupKey::Email => self.email.as_deref(),
        }
    }
}

/// Returns whether `value` looks like `local@domain.tld`.
pub fn is_email_shaped(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
