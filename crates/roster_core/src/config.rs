//! Startup configuration.
//!
//! # Responsibility
//! - Read provider credentials and workflow options once at process start.
//! - Hand explicit config values to constructors; business logic never reads
//!   the process environment.
//!
//! # Invariants
//! - Missing or blank required settings fail startup; there is no partial start.
//! - `recipients` is never empty.

use crate::model::identity::DedupKey;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ENV_MAILGUN_DOMAIN: &str = "MAILGUN_DOMAIN";
pub const ENV_MAILGUN_API_KEY: &str = "MAILGUN_API_KEY";
pub const ENV_MAILGUN_RECIPIENTS: &str = "MAILGUN_RECIPIENTS";
pub const ENV_MAILGUN_API_BASE: &str = "MAILGUN_API_BASE";
pub const ENV_DEDUP_KEY: &str = "ROSTER_DEDUP_KEY";
pub const ENV_REQUIRE_EMAIL: &str = "ROSTER_REQUIRE_EMAIL";

pub const DEFAULT_MAILGUN_API_BASE: &str = "https://api.mailgun.net";

/// Configuration failure. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "required setting `{key}` is not configured"),
            Self::Invalid { key, message } => write!(f, "invalid setting `{key}`: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Email provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailgunConfig {
    pub domain: String,
    pub api_key: String,
    /// Static recipient list notified on every new identity.
    pub recipients: Vec<String>,
    /// Scheme + host of the provider API, without trailing slash.
    pub api_base: String,
}

/// Submission workflow settings.
///
/// The dedup key is not here: it belongs to the record store, and an email
/// dedup key makes email mandatory regardless of `require_email`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkflowConfig {
    pub require_email: bool,
}

/// Full application configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub mailgun: MailgunConfig,
    /// Key the record store deduplicates on.
    pub dedup_key: DedupKey,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a setting name to its
    /// raw value.
    ///
    /// # Errors
    /// - `Missing` when a required setting is absent or blank.
    /// - `Invalid` when an optional setting cannot be parsed or the recipient
    ///   list has no usable entry.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let domain = required(&lookup, ENV_MAILGUN_DOMAIN)?;
        let api_key = required(&lookup, ENV_MAILGUN_API_KEY)?;
        let recipients_raw = required(&lookup, ENV_MAILGUN_RECIPIENTS)?;
        let recipients = parse_recipients(&recipients_raw);
        if recipients.is_empty() {
            return Err(ConfigError::Invalid {
                key: ENV_MAILGUN_RECIPIENTS,
                message: "no recipient addresses found".to_string(),
            });
        }

        let api_base = optional(&lookup, ENV_MAILGUN_API_BASE)
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_MAILGUN_API_BASE.to_string());

        let dedup_key = match optional(&lookup, ENV_DEDUP_KEY) {
            Some(value) => value.parse::<DedupKey>().map_err(|message| ConfigError::Invalid {
                key: ENV_DEDUP_KEY,
                message,
            })?,
            None => DedupKey::default(),
        };

        let require_email = match optional(&lookup, ENV_REQUIRE_EMAIL) {
            Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::Invalid {
                key: ENV_REQUIRE_EMAIL,
                message: format!("expected true|false, got `{value}`"),
            })?,
            None => false,
        };

        Ok(Self {
            mailgun: MailgunConfig {
                domain,
                api_key,
                recipients,
                api_base,
            },
            dedup_key,
            workflow: WorkflowConfig { require_email },
        })
    }
}

/// Splits a comma-separated recipient list, dropping blank entries.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or(ConfigError::Missing(key))
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
