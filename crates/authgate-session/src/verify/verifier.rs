//! Identity token verification

use std::sync::Arc;

use async_trait::async_trait;

use super::config::VerificationOptions;
use super::error::VerificationError;
use crate::Result;
use crate::claims::{ClaimValue, RawClaims};
use crate::context::RequestContext;

/// Signature delegate.
///
/// Checks signature, issuer and expiry of a compact token and returns the
/// raw payload bytes. Audience is left to [`TokenVerifier`].
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify_signature(&self, ctx: &RequestContext, token: &str) -> Result<Vec<u8>>;
}

/// Signature delegate plus configurable audience policy
pub struct TokenVerifier {
    delegate: Arc<dyn SignatureVerifier>,
    options: VerificationOptions,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    #[must_use]
    pub fn new(delegate: Arc<dyn SignatureVerifier>, options: VerificationOptions) -> Self {
        Self { delegate, options }
    }

    #[must_use]
    pub const fn options(&self) -> &VerificationOptions {
        &self.options
    }

    /// Signature-only check, for tokens whose audience is not ours
    /// (e.g. access tokens inspected for roles).
    pub async fn verify_signature_only(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<RawClaims> {
        let payload = self.delegate.verify_signature(ctx, token).await?;
        Ok(RawClaims::from_slice(&payload)?)
    }

    /// Verify signature, issuer and expiry via the delegate, then the audience.
    pub async fn verify(&self, ctx: &RequestContext, token: &str) -> Result<RawClaims> {
        let claims = self.verify_signature_only(ctx, token).await?;
        self.check_audience(&claims)?;
        Ok(claims)
    }

    fn check_audience(&self, claims: &RawClaims) -> std::result::Result<(), VerificationError> {
        let claim = &self.options.audience_claim;
        let value = claims.value(claim);
        if value.is_absent() {
            tracing::debug!(audience_claim = %claim, "audience claim missing");
            return Err(VerificationError::MissingAudience(claim.clone()));
        }

        let allowed = self.options.allowed_audiences();
        if value.intersects(&allowed) {
            return Ok(());
        }

        let value = match value {
            ClaimValue::List(items) if items.len() == 1 => items[0].clone(),
            other => other.to_string(),
        };
        tracing::debug!(audience_claim = %claim, audience = %value, "audience rejected");
        Err(VerificationError::AudienceMismatch {
            claim: claim.clone(),
            value,
            allowed,
        })
    }
}
