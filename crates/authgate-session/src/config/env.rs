//! Environment variable loading for configuration

use std::env;
use std::time::Duration;

use url::Url;

use super::builder::{ConfigBuilder, ProviderKind};
use crate::Result;

/// Environment variable names
mod vars {
    pub const PROVIDER: &str = "AUTHGATE_PROVIDER";
    pub const PROVIDER_NAME: &str = "AUTHGATE_PROVIDER_NAME";
    pub const CLIENT_ID: &str = "AUTHGATE_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "AUTHGATE_CLIENT_SECRET";
    pub const CLIENT_SECRET_FILE: &str = "AUTHGATE_CLIENT_SECRET_FILE";
    pub const LOGIN_URL: &str = "AUTHGATE_LOGIN_URL";
    pub const REDEEM_URL: &str = "AUTHGATE_REDEEM_URL";
    pub const PROFILE_URL: &str = "AUTHGATE_PROFILE_URL";
    pub const INTROSPECT_URL: &str = "AUTHGATE_INTROSPECT_URL";
    pub const VALIDATE_URL: &str = "AUTHGATE_VALIDATE_URL";
    pub const ISSUER: &str = "AUTHGATE_ISSUER";
    pub const DISCOVER: &str = "AUTHGATE_DISCOVER";
    pub const JWKS_URI: &str = "AUTHGATE_JWKS_URI";
    pub const HS_SECRET: &str = "AUTHGATE_HS_SECRET";
    pub const SCOPE: &str = "AUTHGATE_SCOPE";
    pub const EMAIL_CLAIM: &str = "AUTHGATE_EMAIL_CLAIM";
    pub const GROUPS_CLAIM: &str = "AUTHGATE_GROUPS_CLAIM";
    pub const AUDIENCE_CLAIM: &str = "AUTHGATE_AUDIENCE_CLAIM";
    pub const EXTRA_AUDIENCES: &str = "AUTHGATE_EXTRA_AUDIENCES";
    pub const ALLOWED_GROUPS: &str = "AUTHGATE_ALLOWED_GROUPS";
    pub const ALLOW_UNVERIFIED_EMAIL: &str = "AUTHGATE_ALLOW_UNVERIFIED_EMAIL";
    pub const SKIP_ISSUER_CHECK: &str = "AUTHGATE_SKIP_ISSUER_CHECK";
    pub const SKIP_EXPIRY_CHECK: &str = "AUTHGATE_SKIP_EXPIRY_CHECK";
    pub const SKIP_NONCE: &str = "AUTHGATE_SKIP_NONCE";
    pub const COOKIE_SECRET: &str = "AUTHGATE_COOKIE_SECRET";
    pub const HTTP_TIMEOUT_SECS: &str = "AUTHGATE_HTTP_TIMEOUT_SECS";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "AUTHGATE_JSON_LOGS";
}

fn url_var(name: &str) -> Result<Option<Url>> {
    env::var(name)
        .ok()
        .map(|value| {
            Url::parse(&value).map_err(|e| crate::Error::Config(format!("Invalid {name}: {e}")))
        })
        .transpose()
}

fn list_var(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(kind) = env::var(vars::PROVIDER) {
        builder = builder.provider(kind.parse::<ProviderKind>()?);
    }
    if let Ok(name) = env::var(vars::PROVIDER_NAME) {
        builder = builder.provider_name(name);
    }

    // Credentials
    if let Ok(id) = env::var(vars::CLIENT_ID) {
        builder = builder.client_id(id);
    }
    if let Ok(secret) = env::var(vars::CLIENT_SECRET) {
        builder = builder.client_secret(secret);
    }
    if let Ok(path) = env::var(vars::CLIENT_SECRET_FILE) {
        builder = builder.client_secret_file(path);
    }

    // Endpoints
    if let Some(url) = url_var(vars::LOGIN_URL)? {
        builder = builder.login_url(url);
    }
    if let Some(url) = url_var(vars::REDEEM_URL)? {
        builder = builder.redeem_url(url);
    }
    if let Some(url) = url_var(vars::PROFILE_URL)? {
        builder = builder.profile_url(url);
    }
    if let Some(url) = url_var(vars::INTROSPECT_URL)? {
        builder = builder.introspect_url(url);
    }
    if let Some(url) = url_var(vars::VALIDATE_URL)? {
        builder = builder.validate_url(url);
    }
    if let Ok(timeout_str) = env::var(vars::HTTP_TIMEOUT_SECS)
        && let Ok(secs) = timeout_str.parse::<u64>()
    {
        builder = builder.http_timeout(Duration::from_secs(secs));
    }

    // Verification
    if let Some(url) = url_var(vars::ISSUER)? {
        builder = builder.issuer(url);
    }
    if let Ok(val) = env::var(vars::DISCOVER) {
        builder = builder.discover(parse_bool(&val));
    }
    if let Some(url) = url_var(vars::JWKS_URI)? {
        builder = builder.jwks_uri(url);
    }
    if let Ok(secret) = env::var(vars::HS_SECRET) {
        builder = builder.hs_secret(secret);
    }
    if let Ok(claim) = env::var(vars::AUDIENCE_CLAIM) {
        builder = builder.audience_claim(claim);
    }
    if let Some(audiences) = list_var(vars::EXTRA_AUDIENCES) {
        builder = builder.extra_audiences(audiences);
    }
    if let Ok(val) = env::var(vars::SKIP_ISSUER_CHECK) {
        builder = builder.skip_issuer_check(parse_bool(&val));
    }
    if let Ok(val) = env::var(vars::SKIP_EXPIRY_CHECK) {
        builder = builder.skip_expiry_check(parse_bool(&val));
    }

    // Claims and access
    if let Ok(scope) = env::var(vars::SCOPE) {
        builder = builder.scope(scope);
    }
    if let Ok(claim) = env::var(vars::EMAIL_CLAIM) {
        builder = builder.email_claim(claim);
    }
    if let Ok(claim) = env::var(vars::GROUPS_CLAIM) {
        builder = builder.groups_claim(claim);
    }
    if let Some(groups) = list_var(vars::ALLOWED_GROUPS) {
        builder = builder.allowed_groups(groups);
    }
    if let Ok(val) = env::var(vars::ALLOW_UNVERIFIED_EMAIL) {
        builder = builder.allow_unverified_email(parse_bool(&val));
    }
    if let Ok(val) = env::var(vars::SKIP_NONCE) {
        builder = builder.skip_nonce(parse_bool(&val));
    }

    if let Ok(secret) = env::var(vars::COOKIE_SECRET) {
        builder = builder.cookie_secret(secret);
    }

    // Telemetry
    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }
    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Serializes tests that read or write process environment
#[cfg(test)]
pub(super) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
