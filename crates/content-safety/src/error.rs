use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display};

/// The kind of safety check failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An endpoint or key is not configured. Nothing was sent.
    ConfigMissing,
    /// A classifier was unreachable or answered with a non-success status.
    TransportFailure,
    /// A classifier answered with a payload that could not be understood.
    UpstreamRejected,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ConfigMissing => write!(f, "Configuration missing"),
            ErrorKind::TransportFailure => write!(f, "Transport failure"),
            ErrorKind::UpstreamRejected => write!(f, "Upstream rejected"),
        }
    }
}

/// Describes why a safety evaluation could not produce a decision.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SafetyCheckError {
    kind: ErrorKind,
    detail: Option<String>,
}

impl SafetyCheckError {
    /// Creates a new error with the `ConfigMissing` kind.
    #[inline]
    pub fn config_missing() -> Self {
        Self {
            kind: ErrorKind::ConfigMissing,
            detail: None,
        }
    }

    /// Creates a new error with the `TransportFailure` kind.
    #[inline]
    pub fn transport_failure() -> Self {
        Self {
            kind: ErrorKind::TransportFailure,
            detail: None,
        }
    }

    /// Creates a new error with the `UpstreamRejected` kind.
    #[inline]
    pub fn upstream_rejected() -> Self {
        Self {
            kind: ErrorKind::UpstreamRejected,
            detail: None,
        }
    }

    /// Attaches a detail message to the error.
    #[inline]
    pub fn with_detail<S: Into<String>>(self, detail: S) -> Self {
        Self {
            kind: self.kind,
            detail: Some(detail.into()),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detail message, falling back to the kind.
    #[inline]
    pub fn detail(&self) -> Cow<'_, str> {
        match self.detail.as_deref() {
            Some(detail) => Cow::Borrowed(detail),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for SafetyCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl Error for SafetyCheckError {}
