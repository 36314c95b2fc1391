use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Core error type for the checker.
///
/// Adapter crates should map their transport errors into this type so the
/// engine can tell handshake failures, backpressure and plain connectivity
/// problems apart.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("rate limited{}", fmt_retry_after(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("invalid verification code")]
    InvalidCode,

    #[error("two-factor password required")]
    TwoFactorRequired,

    #[error("invalid two-factor password")]
    InvalidPassword,

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

fn fmt_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {}s", d.as_secs()),
        None => String::new(),
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidFormat(_) => ErrorKind::InvalidFormat,
            Error::NotAuthorized(_) => ErrorKind::NotAuthorized,
            Error::NotConfigured(_) => ErrorKind::NotConfigured,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::Connection(_) => ErrorKind::ConnectionError,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::InvalidCode => ErrorKind::InvalidCode,
            Error::TwoFactorRequired => ErrorKind::TwoFactorRequired,
            Error::InvalidPassword => ErrorKind::InvalidPassword,
            Error::Config(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::External(_) => ErrorKind::Internal,
        }
    }
}

/// Closed classification of failures, carried per item in a batch result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFormat,
    NotAuthorized,
    NotConfigured,
    InvalidState,
    ConnectionError,
    RateLimited,
    InvalidCode,
    TwoFactorRequired,
    InvalidPassword,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::NotAuthorized => "not_authorized",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::InvalidCode => "invalid_code",
            ErrorKind::TwoFactorRequired => "two_factor_required",
            ErrorKind::InvalidPassword => "invalid_password",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
