//! Verification configuration types

use std::time::Duration;

use url::Url;

use crate::constants::DEFAULT_AUDIENCE_CLAIM;

/// Audience policy applied after the signature delegate has accepted a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOptions {
    /// `OAuth2` client ID, always accepted as an audience
    pub client_id: String,
    /// Claim holding the relying-party id (`aud` unless the provider differs)
    pub audience_claim: String,
    /// Additional accepted audiences, in configured order
    pub extra_audiences: Vec<String>,
}

impl VerificationOptions {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            audience_claim: DEFAULT_AUDIENCE_CLAIM.to_string(),
            extra_audiences: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_audience_claim(mut self, claim: impl Into<String>) -> Self {
        self.audience_claim = claim.into();
        self
    }

    /// Set extra audiences; duplicates are dropped, first occurrence wins.
    #[must_use]
    pub fn with_extra_audiences<I, S>(mut self, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_audiences.clear();
        for aud in audiences {
            let aud = aud.into();
            if !self.extra_audiences.contains(&aud) {
                self.extra_audiences.push(aud);
            }
        }
        self
    }

    /// Accepted audiences: client ID first, then extras in configured order
    #[must_use]
    pub fn allowed_audiences(&self) -> Vec<String> {
        std::iter::once(self.client_id.clone())
            .chain(
                self.extra_audiences
                    .iter()
                    .filter(|a| **a != self.client_id)
                    .cloned(),
            )
            .collect()
    }
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Signature delegate configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Trusted issuer URL (`iss` validation)
    pub issuer: Url,
    /// JWKS URI for asymmetric keys
    pub jwks_uri: Option<Url>,
    /// Clock skew tolerance for exp/nbf validation
    pub clock_skew: Duration,
    /// HS256/384/512 secret for symmetric signing (testing/dev only)
    pub hs_secret: Option<String>,
    /// JWKS cache TTL
    pub jwks_cache_ttl: Duration,
    /// Skip `iss` validation (testing/dev only)
    pub skip_issuer_check: bool,
    /// Skip `exp` validation (testing/dev only)
    pub skip_expiry_check: bool,
}

// hs_secret is never printed
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("jwks_uri", &self.jwks_uri)
            .field("clock_skew", &self.clock_skew)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("skip_issuer_check", &self.skip_issuer_check)
            .field("skip_expiry_check", &self.skip_expiry_check)
            .finish_non_exhaustive()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: Url::parse("https://example.com").expect("valid default URL"),
            jwks_uri: None,
            clock_skew: Duration::from_secs(60),
            hs_secret: None,
            jwks_cache_ttl: Duration::from_secs(3600),
            skip_issuer_check: false,
            skip_expiry_check: false,
        }
    }
}

impl JwtConfig {
    #[must_use]
    pub fn new(issuer: Url) -> Self {
        Self {
            issuer,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_jwks_uri(mut self, uri: Url) -> Self {
        self.jwks_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn with_hs_secret(mut self, secret: String) -> Self {
        self.hs_secret = Some(secret);
        self
    }

    #[must_use]
    pub const fn with_skip_issuer_check(mut self, skip: bool) -> Self {
        self.skip_issuer_check = skip;
        self
    }

    #[must_use]
    pub const fn with_skip_expiry_check(mut self, skip: bool) -> Self {
        self.skip_expiry_check = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_options_defaults() {
        let opts = VerificationOptions::new("client");
        assert_eq!(opts.client_id, "client");
        assert_eq!(opts.audience_claim, "aud");
        assert!(opts.extra_audiences.is_empty());
        assert_eq!(opts.allowed_audiences(), vec!["client"]);
    }

    #[test]
    fn test_allowed_audiences_order() {
        let opts = VerificationOptions::new("7817818").with_extra_audiences(["xyz", "abc"]);
        assert_eq!(opts.allowed_audiences(), vec!["7817818", "xyz", "abc"]);
    }

    #[test]
    fn test_extra_audiences_deduplicated() {
        let opts = VerificationOptions::new("c").with_extra_audiences(["a", "b", "a", "c"]);
        assert_eq!(opts.extra_audiences, vec!["a", "b", "c"]);
        assert_eq!(opts.allowed_audiences(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_custom_audience_claim() {
        let opts = VerificationOptions::new("c").with_audience_claim("client_id");
        assert_eq!(opts.audience_claim, "client_id");
    }

    #[test]
    fn test_jwt_config_default() {
        let config = JwtConfig::default();
        assert!(config.jwks_uri.is_none());
        assert!(config.hs_secret.is_none());
        assert!(!config.skip_issuer_check);
        assert!(!config.skip_expiry_check);
        assert_eq!(config.clock_skew, Duration::from_secs(60));
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_jwt_config_builder() {
        let issuer = Url::parse("https://auth.example.com").unwrap();
        let jwks_uri = Url::parse("https://auth.example.com/.well-known/jwks.json").unwrap();

        let config = JwtConfig::new(issuer)
            .with_jwks_uri(jwks_uri.clone())
            .with_hs_secret("secret".to_string())
            .with_skip_expiry_check(true);

        assert_eq!(config.jwks_uri, Some(jwks_uri));
        assert_eq!(config.hs_secret, Some("secret".to_string()));
        assert!(config.skip_expiry_check);
        assert!(!config.skip_issuer_check);
    }

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let issuer = Url::parse("https://auth.example.com").unwrap();
        let config = JwtConfig::new(issuer).with_hs_secret("super_secret_key".to_string());

        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("super_secret_key"));
        assert!(debug_str.contains("issuer"));
    }
}
