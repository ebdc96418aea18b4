use thiserror::Error;

use crate::verify::VerificationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{operation} failed: {detail}")]
    Transport {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("{0}")]
    Domain(String),

    #[error("session decode failed: {0}")]
    Codec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("request cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    pub fn transport(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            status: None,
            detail: detail.into(),
        }
    }

    /// Transport error for a non-success HTTP status
    pub fn status(operation: &'static str, status: u16, body: &str) -> Self {
        Self::Transport {
            operation,
            status: Some(status),
            detail: format!("status {status}: {body}"),
        }
    }

    pub fn codec(detail: impl Into<String>) -> Self {
        Self::Codec(detail.into())
    }

    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    #[must_use]
    pub const fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }

    #[must_use]
    pub const fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    #[must_use]
    pub const fn is_codec(&self) -> bool {
        matches!(self, Self::Codec(_))
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// HTTP status reported by the upstream endpoint, if any
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            operation: "http request",
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_with_status() {
        let err = Error::status("token exchange", 400, "invalid_grant");
        assert_eq!(
            err.to_string(),
            "token exchange failed: status 400: invalid_grant"
        );
        assert_eq!(err.http_status(), Some(400));
    }

    #[test]
    fn test_transport_display_without_status() {
        let err = Error::transport("profile request", "connection refused");
        assert_eq!(
            err.to_string(),
            "profile request failed: connection refused"
        );
        assert!(err.http_status().is_none());
    }

    #[test]
    fn test_predicates() {
        assert!(Error::transport("x", "y").is_transport());
        assert!(Error::Domain("no email".into()).is_domain());
        assert!(Error::codec("bad").is_codec());
        assert!(Error::Config("bad".into()).is_config());
        assert!(Error::Cancelled("deadline".into()).is_cancelled());
        assert!(Error::from(VerificationError::InvalidToken).is_verification());
        assert!(!Error::codec("bad").is_transport());
    }

    #[test]
    fn test_verification_is_transparent() {
        let err = Error::from(VerificationError::TokenExpired);
        assert_eq!(err.to_string(), "token expired");
    }

    #[test]
    fn test_codec_display() {
        let err = Error::codec("invalid number of fields (got 3 expected 6)");
        assert_eq!(
            err.to_string(),
            "session decode failed: invalid number of fields (got 3 expected 6)"
        );
    }
}
