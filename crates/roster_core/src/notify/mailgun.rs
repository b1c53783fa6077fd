//! Mailgun-style HTTP notifier.
//!
//! # Responsibility
//! - Build the fixed new-identity message.
//! - POST it form-encoded with basic auth to `{api_base}/v3/{domain}/messages`.
//!
//! # Invariants
//! - Only HTTP 200 counts as delivered.
//! - Non-200 responses surface status and body verbatim.
//! - Exactly one request per `notify` call; no retry.
//! - The client has no request timeout: a call waits until the provider
//!   answers or the connection fails.

use crate::config::MailgunConfig;
use crate::notify::{NotificationPayload, Notifier, NotifyError, NotifyResult};
use log::{info, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::{Duration, Instant};

const API_USER: &str = "api";
const SENDER_NAME: &str = "Roster";
const SUBJECT: &str = "A new user has been added. Take a look!";

/// Form fields sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    /// Comma-joined recipient list.
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl OutgoingMessage {
    fn form_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("from", self.from.as_str()),
            ("to", self.to.as_str()),
            ("subject", self.subject.as_str()),
            ("text", self.text.as_str()),
        ]
    }
}

/// Builds the message for `payload`.
///
/// The submitter's email, when present, is appended to the configured
/// recipients unless it is already listed.
pub fn build_message(config: &MailgunConfig, payload: &NotificationPayload) -> OutgoingMessage {
    let mut recipients: Vec<&str> = config.recipients.iter().map(String::as_str).collect();
    if let Some(email) = payload.email.as_deref() {
        if !recipients
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(email))
        {
            recipients.push(email);
        }
    }

    let mut text = format!("\nA new user has been added!\n\nName: {}\n", payload.name);
    if let Some(email) = payload.email.as_deref() {
        text.push_str(&format!("Email: {email}\n"));
    }

    OutgoingMessage {
        from: format!("{SENDER_NAME} <mailgun@{}>", config.domain),
        to: recipients.join(","),
        subject: SUBJECT.to_string(),
        text,
    }
}

/// Blocking notifier for the Mailgun messages API.
pub struct MailgunNotifier {
    config: MailgunConfig,
    client: Client,
}

impl MailgunNotifier {
    /// Creates a notifier with a blocking HTTP client that never times out.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    /// - `Client` when the TLS backend cannot be initialized.
    pub fn new(config: MailgunConfig) -> NotifyResult<Self> {
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| NotifyError::Client(err.to_string()))?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: MailgunConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Provider endpoint for the configured domain.
    pub fn endpoint(&self) -> String {
        format!("{}/v3/{}/messages", self.config.api_base, self.config.domain)
    }
}

impl Notifier for MailgunNotifier {
    fn notify(&self, payload: &NotificationPayload) -> NotifyResult<()> {
        let started_at = Instant::now();
        let message = build_message(&self.config, payload);

        let response = self
            .client
            .post(self.endpoint())
            .basic_auth(API_USER, Some(&self.config.api_key))
            .form(&message.form_fields())
            .send()
            .map_err(|err| {
                warn!(
                    "event=notify_send module=notify status=error error_code=transport duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                NotifyError::Transport(err.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            info!(
                "event=notify_send module=notify status=ok http_status={} duration_ms={}",
                status.as_u16(),
                started_at.elapsed().as_millis()
            );
            return Ok(());
        }

        let body = response
            .text()
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        warn!(
            "event=notify_send module=notify status=error error_code=delivery http_status={} duration_ms={}",
            status.as_u16(),
            started_at.elapsed().as_millis()
        );
        Err(NotifyError::Delivery {
            status: status.as_u16(),
            body,
        })
    }
}
