//! Session lifecycle core for an OAuth2/OIDC authentication gateway
//!
//! Turns identity-provider responses into a [`Session`], keeps it
//! enriched and refreshed, and round-trips it through a cookie-safe
//! string with [`SessionCodec`].

pub mod claims;
pub mod config;
pub mod constants;
pub mod context;
mod error;
pub mod observability;
pub mod providers;
pub mod session;
pub mod verify;

pub use claims::{ClaimValue, RawClaims};
pub use config::{ConfigBuilder, GatewayConfig, ProviderKind, TelemetryConfig, build_provider};
pub use context::RequestContext;
pub use error::{Error, Result};
pub use providers::{
    KeycloakOidcProvider, NextcloudProvider, OidcProvider, Provider, ProviderData,
};
pub use session::{AesGcmCipher, FieldCipher, Session, SessionCodec};
pub use verify::{
    JwtConfig, JwtSignatureVerifier, SignatureVerifier, TokenVerifier, VerificationError,
    VerificationOptions,
};
