//! Identity token verification
//!
//! Two layers: a [`SignatureVerifier`] delegate validates signature, issuer
//! and expiry, then [`TokenVerifier`] applies the configurable audience
//! policy to the decoded claims.

mod config;
mod error;
mod jwks;
mod jwt;
mod verifier;

pub use config::{JwtConfig, VerificationOptions};
pub use error::VerificationError;
pub use jwks::{Jwk, JwkSet, JwksCache};
pub use jwt::JwtSignatureVerifier;
pub use verifier::{SignatureVerifier, TokenVerifier};
