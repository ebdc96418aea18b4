//! TOML configuration file loading

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::builder::{ConfigBuilder, ProviderKind};
use crate::Result;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./authgate.toml",
    "~/.config/authgate/config.toml",
    "/etc/authgate/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    builder = apply_file_config(builder, file_config)?;
    Ok(builder)
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| crate::Error::Config(format!("Invalid {field} URL: {e}")))
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(provider) = config.provider {
        if let Some(kind) = provider.kind {
            builder = builder.provider(kind.parse::<ProviderKind>()?);
        }
        if let Some(name) = provider.name {
            builder = builder.provider_name(name);
        }
        if let Some(id) = provider.client_id {
            builder = builder.client_id(id);
        }
        if let Some(secret) = provider.client_secret {
            builder = builder.client_secret(secret);
        }
        if let Some(path) = provider.client_secret_file {
            builder = builder.client_secret_file(path);
        }
        if let Some(scope) = provider.scope {
            builder = builder.scope(scope);
        }
        if let Some(groups) = provider.allowed_groups {
            builder = builder.allowed_groups(groups);
        }
        if let Some(allow) = provider.allow_unverified_email {
            builder = builder.allow_unverified_email(allow);
        }
        if let Some(skip) = provider.skip_nonce {
            builder = builder.skip_nonce(skip);
        }
    }

    if let Some(endpoints) = config.endpoints {
        if let Some(url) = endpoints.login_url {
            builder = builder.login_url(parse_url("login", &url)?);
        }
        if let Some(url) = endpoints.redeem_url {
            builder = builder.redeem_url(parse_url("redeem", &url)?);
        }
        if let Some(url) = endpoints.profile_url {
            builder = builder.profile_url(parse_url("profile", &url)?);
        }
        if let Some(url) = endpoints.introspect_url {
            builder = builder.introspect_url(parse_url("introspect", &url)?);
        }
        if let Some(url) = endpoints.validate_url {
            builder = builder.validate_url(parse_url("validate", &url)?);
        }
        if let Some(secs) = endpoints.http_timeout_secs {
            builder = builder.http_timeout(Duration::from_secs(secs));
        }
    }

    if let Some(verification) = config.verification {
        if let Some(url) = verification.issuer {
            builder = builder.issuer(parse_url("issuer", &url)?);
        }
        if let Some(discover) = verification.discover {
            builder = builder.discover(discover);
        }
        if let Some(url) = verification.jwks_uri {
            builder = builder.jwks_uri(parse_url("JWKS", &url)?);
        }
        if let Some(secret) = verification.hs_secret {
            builder = builder.hs_secret(secret);
        }
        if let Some(claim) = verification.audience_claim {
            builder = builder.audience_claim(claim);
        }
        if let Some(audiences) = verification.extra_audiences {
            builder = builder.extra_audiences(audiences);
        }
        if let Some(skip) = verification.skip_issuer_check {
            builder = builder.skip_issuer_check(skip);
        }
        if let Some(skip) = verification.skip_expiry_check {
            builder = builder.skip_expiry_check(skip);
        }
        if let Some(secs) = verification.clock_skew_secs {
            builder = builder.clock_skew(Duration::from_secs(secs));
        }
    }

    if let Some(claims) = config.claims {
        if let Some(claim) = claims.email {
            builder = builder.email_claim(claim);
        }
        if let Some(claim) = claims.groups {
            builder = builder.groups_claim(claim);
        }
    }

    if let Some(session) = config.session
        && let Some(secret) = session.cookie_secret
    {
        builder = builder.cookie_secret(secret);
    }

    if let Some(obs) = config.observability {
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }
        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    provider: Option<ProviderSection>,
    endpoints: Option<EndpointsSection>,
    verification: Option<VerificationSection>,
    claims: Option<ClaimsSection>,
    session: Option<SessionSection>,
    observability: Option<ObservabilitySection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderSection {
    kind: Option<String>,
    name: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    client_secret_file: Option<PathBuf>,
    scope: Option<String>,
    allowed_groups: Option<Vec<String>>,
    allow_unverified_email: Option<bool>,
    skip_nonce: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EndpointsSection {
    login_url: Option<String>,
    redeem_url: Option<String>,
    profile_url: Option<String>,
    introspect_url: Option<String>,
    validate_url: Option<String>,
    http_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerificationSection {
    issuer: Option<String>,
    discover: Option<bool>,
    jwks_uri: Option<String>,
    hs_secret: Option<String>,
    audience_claim: Option<String>,
    extra_audiences: Option<Vec<String>>,
    skip_issuer_check: Option<bool>,
    skip_expiry_check: Option<bool>,
    clock_skew_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClaimsSection {
    email: Option<String>,
    groups: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionSection {
    cookie_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObservabilitySection {
    log_level: Option<String>,
    json_logs: Option<bool>,
}
