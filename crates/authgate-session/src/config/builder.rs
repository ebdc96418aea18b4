//! Configuration builder

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::Error;
use crate::constants::{
    DEFAULT_AUDIENCE_CLAIM, DEFAULT_EMAIL_CLAIM, DEFAULT_GROUPS_CLAIM, DEFAULT_HTTP_TIMEOUT_SECS,
};
use crate::session::AesGcmCipher;

/// Gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    pub provider: ProviderKind,
    /// Display name; empty selects the family default
    pub provider_name: String,
    pub client_id: String,
    pub client_secret: String,
    pub client_secret_file: Option<PathBuf>,
    pub login_url: Option<Url>,
    pub redeem_url: Option<Url>,
    pub profile_url: Option<Url>,
    pub introspect_url: Option<Url>,
    pub validate_url: Option<Url>,
    pub issuer: Option<Url>,
    /// Fill unset endpoints from the issuer's discovery document
    pub discover: bool,
    pub jwks_uri: Option<Url>,
    pub hs_secret: Option<String>,
    pub scope: String,
    pub email_claim: String,
    pub groups_claim: String,
    pub audience_claim: String,
    pub extra_audiences: Vec<String>,
    pub allowed_groups: Vec<String>,
    pub allow_unverified_email: bool,
    pub skip_issuer_check: bool,
    pub skip_expiry_check: bool,
    pub skip_nonce: bool,
    pub cookie_secret: Option<String>,
    pub http_timeout: Duration,
    pub clock_skew: Duration,
    pub telemetry: TelemetryConfig,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("provider", &self.provider)
            .field("provider_name", &self.provider_name)
            .field("client_id", &self.client_id)
            .field("has_client_secret", &!self.client_secret.is_empty())
            .field("client_secret_file", &self.client_secret_file)
            .field("issuer", &self.issuer)
            .field("discover", &self.discover)
            .field("jwks_uri", &self.jwks_uri)
            .field("email_claim", &self.email_claim)
            .field("groups_claim", &self.groups_claim)
            .field("audience_claim", &self.audience_claim)
            .field("extra_audiences", &self.extra_audiences)
            .field("has_cookie_secret", &self.cookie_secret.is_some())
            .field("http_timeout", &self.http_timeout)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl GatewayConfig {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Field cipher for session values; `None` stores sessions in plain form
    pub fn cipher(&self) -> crate::Result<Option<AesGcmCipher>> {
        self.cookie_secret
            .as_deref()
            .map(AesGcmCipher::from_secret)
            .transpose()
    }
}

/// Identity provider family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Oidc,
    Keycloak,
    Nextcloud,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oidc => "oidc",
            Self::Keycloak => "keycloak-oidc",
            Self::Nextcloud => "nextcloud",
        }
    }

    const fn needs_issuer(self) -> bool {
        matches!(self, Self::Oidc | Self::Keycloak)
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oidc" => Ok(Self::Oidc),
            "keycloak" | "keycloak-oidc" => Ok(Self::Keycloak),
            "nextcloud" => Ok(Self::Nextcloud),
            other => Err(Error::Config(format!("Unknown provider kind: {other}"))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Configuration builder
#[derive(Clone)]
pub struct ConfigBuilder {
    provider: ProviderKind,
    provider_name: String,
    client_id: Option<String>,
    client_secret: String,
    client_secret_file: Option<PathBuf>,
    login_url: Option<Url>,
    redeem_url: Option<Url>,
    profile_url: Option<Url>,
    introspect_url: Option<Url>,
    validate_url: Option<Url>,
    issuer: Option<Url>,
    discover: bool,
    jwks_uri: Option<Url>,
    hs_secret: Option<String>,
    scope: String,
    email_claim: Option<String>,
    groups_claim: Option<String>,
    audience_claim: Option<String>,
    extra_audiences: Vec<String>,
    allowed_groups: Vec<String>,
    allow_unverified_email: bool,
    skip_issuer_check: bool,
    skip_expiry_check: bool,
    skip_nonce: bool,
    cookie_secret: Option<String>,
    http_timeout: Duration,
    clock_skew: Duration,
    log_level: Option<String>,
    json_logs: bool,
}

impl std::fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            provider: ProviderKind::Oidc,
            provider_name: String::new(),
            client_id: None,
            client_secret: String::new(),
            client_secret_file: None,
            login_url: None,
            redeem_url: None,
            profile_url: None,
            introspect_url: None,
            validate_url: None,
            issuer: None,
            discover: false,
            jwks_uri: None,
            hs_secret: None,
            scope: String::new(),
            email_claim: None,
            groups_claim: None,
            audience_claim: None,
            extra_audiences: Vec::new(),
            allowed_groups: Vec::new(),
            allow_unverified_email: false,
            skip_issuer_check: false,
            skip_expiry_check: false,
            skip_nonce: true,
            cookie_secret: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            clock_skew: Duration::from_secs(60),
            log_level: None,
            json_logs: false,
        }
    }

    #[must_use]
    pub const fn provider(mut self, kind: ProviderKind) -> Self {
        self.provider = kind;
        self
    }

    #[must_use]
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = secret.into();
        self
    }

    #[must_use]
    pub fn client_secret_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_secret_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn login_url(mut self, url: Url) -> Self {
        self.login_url = Some(url);
        self
    }

    #[must_use]
    pub fn redeem_url(mut self, url: Url) -> Self {
        self.redeem_url = Some(url);
        self
    }

    #[must_use]
    pub fn profile_url(mut self, url: Url) -> Self {
        self.profile_url = Some(url);
        self
    }

    #[must_use]
    pub fn introspect_url(mut self, url: Url) -> Self {
        self.introspect_url = Some(url);
        self
    }

    #[must_use]
    pub fn validate_url(mut self, url: Url) -> Self {
        self.validate_url = Some(url);
        self
    }

    #[must_use]
    pub fn issuer(mut self, url: Url) -> Self {
        self.issuer = Some(url);
        self
    }

    #[must_use]
    pub const fn discover(mut self, enabled: bool) -> Self {
        self.discover = enabled;
        self
    }

    #[must_use]
    pub fn jwks_uri(mut self, url: Url) -> Self {
        self.jwks_uri = Some(url);
        self
    }

    #[must_use]
    pub fn hs_secret(mut self, secret: impl Into<String>) -> Self {
        self.hs_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    #[must_use]
    pub fn email_claim(mut self, claim: impl Into<String>) -> Self {
        self.email_claim = Some(claim.into());
        self
    }

    #[must_use]
    pub fn groups_claim(mut self, claim: impl Into<String>) -> Self {
        self.groups_claim = Some(claim.into());
        self
    }

    #[must_use]
    pub fn audience_claim(mut self, claim: impl Into<String>) -> Self {
        self.audience_claim = Some(claim.into());
        self
    }

    #[must_use]
    pub fn extra_audiences(mut self, audiences: Vec<String>) -> Self {
        self.extra_audiences = audiences;
        self
    }

    #[must_use]
    pub fn allowed_groups(mut self, groups: Vec<String>) -> Self {
        self.allowed_groups = groups;
        self
    }

    #[must_use]
    pub const fn allow_unverified_email(mut self, allow: bool) -> Self {
        self.allow_unverified_email = allow;
        self
    }

    #[must_use]
    pub const fn skip_issuer_check(mut self, skip: bool) -> Self {
        self.skip_issuer_check = skip;
        self
    }

    #[must_use]
    pub const fn skip_expiry_check(mut self, skip: bool) -> Self {
        self.skip_expiry_check = skip;
        self
    }

    #[must_use]
    pub const fn skip_nonce(mut self, skip: bool) -> Self {
        self.skip_nonce = skip;
        self
    }

    #[must_use]
    pub fn cookie_secret(mut self, secret: impl Into<String>) -> Self {
        self.cookie_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub const fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<GatewayConfig> {
        let client_id = self
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Config("client_id is required".into()))?;

        if self.provider.needs_issuer() && self.issuer.is_none() {
            return Err(Error::Config(format!(
                "issuer is required for the {} provider",
                self.provider
            )));
        }
        if self.discover && self.issuer.is_none() {
            return Err(Error::Config("discovery requires an issuer".into()));
        }
        if self.provider == ProviderKind::Nextcloud && self.validate_url.is_none() {
            return Err(Error::Config(
                "validate_url is required for the nextcloud provider".into(),
            ));
        }
        if self.issuer.is_some()
            && self.jwks_uri.is_none()
            && self.hs_secret.is_none()
            && !self.discover
        {
            return Err(Error::Config(
                "one of jwks_uri, hs_secret or discovery is required to verify tokens".into(),
            ));
        }

        let config = GatewayConfig {
            provider: self.provider,
            provider_name: self.provider_name,
            client_id,
            client_secret: self.client_secret,
            client_secret_file: self.client_secret_file,
            login_url: self.login_url,
            redeem_url: self.redeem_url,
            profile_url: self.profile_url,
            introspect_url: self.introspect_url,
            validate_url: self.validate_url,
            issuer: self.issuer,
            discover: self.discover,
            jwks_uri: self.jwks_uri,
            hs_secret: self.hs_secret,
            scope: self.scope,
            email_claim: self
                .email_claim
                .unwrap_or_else(|| DEFAULT_EMAIL_CLAIM.to_string()),
            groups_claim: self
                .groups_claim
                .unwrap_or_else(|| DEFAULT_GROUPS_CLAIM.to_string()),
            audience_claim: self
                .audience_claim
                .unwrap_or_else(|| DEFAULT_AUDIENCE_CLAIM.to_string()),
            extra_audiences: self.extra_audiences,
            allowed_groups: self.allowed_groups,
            allow_unverified_email: self.allow_unverified_email,
            skip_issuer_check: self.skip_issuer_check,
            skip_expiry_check: self.skip_expiry_check,
            skip_nonce: self.skip_nonce,
            cookie_secret: self.cookie_secret,
            http_timeout: self.http_timeout,
            clock_skew: self.clock_skew,
            telemetry: TelemetryConfig {
                log_level: self
                    .log_level
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| "info".to_string()),
                json_logs: self.json_logs,
            },
        };

        // Cookie secret must decode to a key
        config.cipher()?;
        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
