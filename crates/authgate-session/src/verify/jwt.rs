//! JWS signature, issuer and expiry validation

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode_header};

use super::config::JwtConfig;
use super::error::VerificationError;
use super::jwks::JwksCache;
use super::verifier::SignatureVerifier;
use crate::context::RequestContext;
use crate::{Error, Result};

/// Signature delegate backed by `jsonwebtoken`
pub struct JwtSignatureVerifier {
    config: JwtConfig,
    jwks_cache: Option<Arc<JwksCache>>,
    hs_key: Option<DecodingKey>,
}

impl std::fmt::Debug for JwtSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSignatureVerifier")
            .field("issuer", &self.config.issuer)
            .field("has_jwks_cache", &self.jwks_cache.is_some())
            .field("has_hs_key", &self.hs_key.is_some())
            .finish()
    }
}

impl JwtSignatureVerifier {
    /// Build a delegate; a JWKS cache is created when `config.jwks_uri` is set.
    #[must_use]
    pub fn new(config: JwtConfig, client: reqwest::Client) -> Self {
        let jwks_cache = config
            .jwks_uri
            .clone()
            .map(|uri| Arc::new(JwksCache::new(uri, config.jwks_cache_ttl, client)));
        let hs_key = config
            .hs_secret
            .as_ref()
            .map(|s| DecodingKey::from_secret(s.as_bytes()));
        Self {
            config,
            jwks_cache,
            hs_key,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &JwtConfig {
        &self.config
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);

        if !self.config.skip_issuer_check {
            let issuer = self.config.issuer.as_str().trim_end_matches('/');
            validation.set_issuer(&[issuer]);
        }

        if self.config.skip_expiry_check {
            validation.validate_exp = false;
            validation.required_spec_claims.clear();
        }

        validation.validate_aud = false;
        validation.leeway = self.config.clock_skew.as_secs();
        validation
    }

    async fn decoding_key(
        &self,
        ctx: &RequestContext,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Result<DecodingKey> {
        if matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return self
                .hs_key
                .clone()
                .ok_or_else(|| Error::Config("HS secret not configured".into()));
        }

        let jwks_cache = self.jwks_cache.as_ref().ok_or_else(|| {
            Error::Config("JWKS not configured for asymmetric algorithm".into())
        })?;

        jwks_cache.get_key(ctx, kid, alg).await
    }
}

#[async_trait]
impl SignatureVerifier for JwtSignatureVerifier {
    async fn verify_signature(&self, ctx: &RequestContext, token: &str) -> Result<Vec<u8>> {
        let header = decode_header(token).map_err(|_| VerificationError::InvalidToken)?;

        let key = self
            .decoding_key(ctx, header.kid.as_deref(), header.alg)
            .await?;

        let data = jsonwebtoken::decode::<serde_json::Value>(
            token,
            &key,
            &self.validation(header.alg),
        )?;

        serde_json::to_vec(&data.claims)
            .map_err(|e| VerificationError::Malformed(e.to_string()).into())
    }
}
