use std::backtrace::Backtrace;
use std::fmt::{Display, Formatter};

use http::StatusCode;

use crate::payment::PaymentId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub backtrace: Backtrace,
    /// Storefront payment the error was raised for, if known.
    pub payment: Option<PaymentId>,
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
            payment: None,
        }
    }

    pub fn new_with(kind: ErrorKind, payment: Option<PaymentId>) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
            payment,
        }
    }

    /// Attaches payment context to the error, keeping any context that was
    /// already set closer to the source.
    pub fn with_payment(mut self, payment: PaymentId) -> Self {
        self.payment.get_or_insert(payment);
        self
    }

    /// Returns true for failures reported by, or on the way to, the Klarna
    /// API. These are passed through from the client untouched.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::ProviderError { .. } | ErrorKind::ReqwestError(_)
        )
    }

    /// Returns true for the failures after which the checkout has to be
    /// restarted from scratch.
    pub fn requires_restart(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::SessionExpired | ErrorKind::SessionAlreadyConsumed
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(payment) = self.payment {
            write!(f, ", payment: {}", payment)?;
        }
        if self.backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            write!(f, ", {}", self.backtrace)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    #[error("unexpected error")]
    StdIoError(#[from] std::io::Error),

    #[error("config error: {0}")]
    ConfigError(#[from] config::ConfigError),

    /// Persisted session state is corrupted or was populated by someone
    /// else. Never expected during normal operation.
    #[error("invalid stored payment details: {0}")]
    InvalidStoredState(String),
    #[error("klarna session expired")]
    SessionExpired,
    #[error("klarna session already consumed")]
    SessionAlreadyConsumed,

    #[error("klarna api responded with {status}: {body}")]
    ProviderError { status: StatusCode, body: String },
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("bad input: {0}")]
    BadInput(String),
    #[error("not found: {0}")]
    NotFound(String),

    #[error("db error: {0}")]
    DbError(String),
    #[cfg(feature = "sled")]
    #[error("sled db error: {0}")]
    SledError(#[from] sled::Error),

    #[error("json decode error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("pot decode error: {0}")]
    PotError(#[from] pot::Error),
    #[error("uuid error: {0}")]
    UuidError(#[from] uuid::Error),
    #[error("url parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("failed parsing timestamp: {0}")]
    TimestampError(#[from] chrono::ParseError),

    #[error("other error: {0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Self::new(ErrorKind::Other(e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::new(ErrorKind::ReqwestError(e))
    }
}

impl From<uuid::Error> for Error {
    fn from(e: uuid::Error) -> Self {
        Self::new(ErrorKind::UuidError(e))
    }
}

#[cfg(feature = "sled")]
impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Self::new(ErrorKind::SledError(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::JsonError(e))
    }
}

impl From<pot::Error> for Error {
    fn from(e: pot::Error) -> Self {
        Self::new(ErrorKind::PotError(e))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::new(ErrorKind::UrlParseError(e))
    }
}

impl From<chrono::ParseError> for Error {
    fn from(e: chrono::ParseError) -> Self {
        Self::new(ErrorKind::TimestampError(e))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::new(ErrorKind::ConfigError(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::StdIoError(e))
    }
}

impl From<ErrorKind> for Error {
    fn from(k: ErrorKind) -> Self {
        Self::new(k)
    }
}
