//! Outbound notification contract.
//!
//! # Responsibility
//! - Define what the submission workflow needs from an email provider.
//! - Give callers typed failures instead of a catch-all error.
//!
//! # Invariants
//! - One `notify` call is at most one outbound request; there is no retry.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod mailgun;

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Data interpolated into the new-identity message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub name: String,
    pub email: Option<String>,
}

/// Notification failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Provider answered with a non-200 status.
    Delivery { status: u16, body: String },
    /// Request never produced a response (connect, TLS, or read failure).
    Transport(String),
    /// HTTP client could not be built.
    Client(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery { status, body } => {
                write!(f, "status code: {status}, response: {body}")
            }
            Self::Transport(message) => write!(f, "request failed: {message}"),
            Self::Client(message) => write!(f, "http client setup failed: {message}"),
        }
    }
}

impl Error for NotifyError {}

/// Sends the new-identity notification.
pub trait Notifier {
    fn notify(&self, payload: &NotificationPayload) -> NotifyResult<()>;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn notify(&self, payload: &NotificationPayload) -> NotifyResult<()> {
        (**self).notify(payload)
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, payload: &NotificationPayload) -> NotifyResult<()> {
        (**self).notify(payload)
    }
}
