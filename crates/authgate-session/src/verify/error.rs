//! Token verification error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("invalid token")]
    InvalidToken,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token expired")]
    TokenExpired,

    #[error("invalid issuer")]
    InvalidIssuer,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("no matching key for algorithm")]
    NoMatchingKey,

    #[error("JWKS fetch failed: {0}")]
    KeySetUnavailable(String),

    #[error("audience claim {0} not found in token")]
    MissingAudience(String),

    #[error(
        "audience from claim {claim} with value {value} does not match with any of allowed audiences [{}]",
        .allowed.join(" ")
    )]
    AudienceMismatch {
        claim: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("email in id_token ({0}) isn't verified")]
    UnverifiedEmail(String),

    #[error("token validation failed: {0}")]
    ValidationFailed(String),
}

impl From<jsonwebtoken::errors::Error> for VerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::InvalidIssuer => Self::InvalidIssuer,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                Self::InvalidToken
            }
            _ => Self::ValidationFailed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_error_display() {
        assert_eq!(VerificationError::InvalidToken.to_string(), "invalid token");
        assert_eq!(VerificationError::TokenExpired.to_string(), "token expired");
        assert_eq!(
            VerificationError::InvalidSignature.to_string(),
            "invalid signature"
        );
    }

    #[test]
    fn test_key_not_found_error() {
        let err = VerificationError::KeyNotFound("kid123".to_string());
        assert_eq!(err.to_string(), "key not found: kid123");
    }

    #[test]
    fn test_audience_mismatch_message_is_deterministic() {
        let err = VerificationError::AudienceMismatch {
            claim: "client_id".to_string(),
            value: "1226737".to_string(),
            allowed: vec!["7817818".to_string(), "xyz".to_string(), "abc".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "audience from claim client_id with value 1226737 does not match with any of \
             allowed audiences [7817818 xyz abc]"
        );
    }

    #[test]
    fn test_missing_audience_error() {
        let err = VerificationError::MissingAudience("aud".to_string());
        assert_eq!(err.to_string(), "audience claim aud not found in token");
    }

    #[test]
    fn test_jsonwebtoken_error_mapping() {
        use jsonwebtoken::errors::ErrorKind;

        let err: VerificationError = jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature).into();
        assert!(matches!(err, VerificationError::TokenExpired));

        let err: VerificationError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidIssuer).into();
        assert!(matches!(err, VerificationError::InvalidIssuer));

        let err: VerificationError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken).into();
        assert!(matches!(err, VerificationError::InvalidToken));
    }
}
