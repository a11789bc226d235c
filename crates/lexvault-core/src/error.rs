//! Common error type definitions.

use strum::{AsRefStr, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
///
/// Used as the source error in [`Error`], so any error implementing the
/// standard `Error` trait can be attached while keeping `Send + Sync`.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur in lexvault operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The addressed object does not exist. Never retried.
    NotFound,
    /// Storage backend or network unavailable. Retried with backoff.
    Transient,
    /// A pipeline or task artifact was addressed without its name.
    InvalidAddressing,
    /// Caller supplied a malformed path, name or payload.
    InvalidInput,
    /// A document process failed and the failure was not recoverable.
    PipelineStep,
    /// Serialization/deserialization error.
    Serialization,
    /// Local filesystem error.
    Io,
    /// Credentials were rejected or could not be obtained.
    Authentication,
    /// Configuration error.
    Configuration,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// The store was used after `shutdown`.
    Closed,
}

/// A structured error type for lexvault operations.
#[derive(Debug, Error)]
#[error("{kind:?}{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional error message.
    pub message: Option<String>,
    /// Optional source error.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a source error to this error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Creates a not found error naming the missing path.
    pub fn not_found(path: impl AsRef<str>) -> Self {
        Self::new(ErrorKind::NotFound).with_message(format!("{} not found", path.as_ref()))
    }

    /// Creates a new transient (retryable) storage error.
    pub fn transient() -> Self {
        Self::new(ErrorKind::Transient)
    }

    /// Creates a new invalid addressing error.
    pub fn invalid_addressing() -> Self {
        Self::new(ErrorKind::InvalidAddressing)
    }

    /// Creates a new invalid input error.
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates a new pipeline step failure.
    pub fn pipeline_step() -> Self {
        Self::new(ErrorKind::PipelineStep)
    }

    /// Creates a new serialization error.
    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    /// Creates a new local I/O error.
    pub fn io() -> Self {
        Self::new(ErrorKind::Io)
    }

    /// Creates a new authentication error.
    pub fn authentication() -> Self {
        Self::new(ErrorKind::Authentication)
    }

    /// Creates a new configuration error.
    pub fn configuration() -> Self {
        Self::new(ErrorKind::Configuration)
    }

    /// Creates a new cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Creates a new closed-store error.
    pub fn closed() -> Self {
        Self::new(ErrorKind::Closed).with_message("store used after shutdown")
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.kind.into()
    }

    /// Whether this error reports an absent object.
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Whether the caller should retry this operation.
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidInput,
            _ => ErrorKind::Io,
        };
        Self::new(kind).with_message(err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization()
            .with_message(err.to_string())
            .with_source(err)
    }
}
