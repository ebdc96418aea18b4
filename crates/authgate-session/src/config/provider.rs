//! Provider assembly from a [`GatewayConfig`]

use std::sync::Arc;

use super::builder::{GatewayConfig, ProviderKind};
use crate::providers::{
    KeycloakOidcProvider, NextcloudProvider, OidcProvider, Provider, ProviderData,
};
use crate::verify::{JwtConfig, JwtSignatureVerifier, TokenVerifier, VerificationOptions};
use crate::{Error, Result};

/// Assemble the configured provider family with its token verifier.
///
/// With `discover` set, unset endpoints and the JWKS URI are taken from the
/// issuer's discovery document.
pub async fn build_provider(config: &GatewayConfig) -> Result<Box<dyn Provider>> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

    let mut data = provider_data(config);
    let mut jwks_uri = config.jwks_uri.clone();

    if config.discover {
        let issuer = config
            .issuer
            .as_ref()
            .ok_or_else(|| Error::Config("discovery requires an issuer".into()))?;
        let discovered = discover_into(issuer, config, &mut data).await?;
        jwks_uri = jwks_uri.or(discovered);
    }

    let mut oidc = OidcProvider::new(data, http.clone());
    if let Some(issuer) = config.issuer.clone() {
        let mut jwt = JwtConfig::new(issuer)
            .with_skip_issuer_check(config.skip_issuer_check)
            .with_skip_expiry_check(config.skip_expiry_check);
        jwt.clock_skew = config.clock_skew;
        jwt.jwks_uri = jwks_uri;
        jwt.hs_secret.clone_from(&config.hs_secret);

        let options = VerificationOptions::new(config.client_id.clone())
            .with_audience_claim(config.audience_claim.clone())
            .with_extra_audiences(config.extra_audiences.iter().cloned());
        let delegate = JwtSignatureVerifier::new(jwt, http);
        oidc = oidc.with_verifier(TokenVerifier::new(Arc::new(delegate), options));
    }

    tracing::info!(
        provider = %config.provider,
        client_id = %config.client_id,
        "Provider configured"
    );

    Ok(match config.provider {
        ProviderKind::Oidc => Box::new(oidc),
        ProviderKind::Keycloak => Box::new(KeycloakOidcProvider::new(oidc)),
        ProviderKind::Nextcloud => Box::new(NextcloudProvider::new(oidc)),
    })
}

fn provider_data(config: &GatewayConfig) -> ProviderData {
    let mut data = ProviderData {
        provider_name: config.provider_name.clone(),
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        client_secret_file: config.client_secret_file.clone(),
        login_url: config.login_url.clone(),
        redeem_url: config.redeem_url.clone(),
        profile_url: config.profile_url.clone(),
        introspect_url: config.introspect_url.clone(),
        validate_url: config.validate_url.clone(),
        scope: config.scope.clone(),
        email_claim: config.email_claim.clone(),
        groups_claim: config.groups_claim.clone(),
        allow_unverified_email: config.allow_unverified_email,
        skip_nonce: config.skip_nonce,
        ..ProviderData::default()
    };
    data.add_allowed_groups(&config.allowed_groups);
    data
}

#[cfg(feature = "discovery")]
async fn discover_into(
    issuer: &url::Url,
    config: &GatewayConfig,
    data: &mut ProviderData,
) -> Result<Option<url::Url>> {
    let endpoints = crate::providers::discover(issuer, config.http_timeout).await?;
    endpoints.fill(data);
    Ok(Some(endpoints.jwks_uri))
}

#[cfg(not(feature = "discovery"))]
#[allow(clippy::unused_async)]
async fn discover_into(
    _issuer: &url::Url,
    _config: &GatewayConfig,
    _data: &mut ProviderData,
) -> Result<Option<url::Url>> {
    Err(Error::Config(
        "discovery requested but the `discovery` feature is disabled".into(),
    ))
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::config::ConfigBuilder;
    use crate::context::RequestContext;

    fn builder(kind: ProviderKind) -> ConfigBuilder {
        ConfigBuilder::new()
            .provider(kind)
            .client_id("gateway")
            .issuer(Url::parse("https://idp.example.com").unwrap())
            .hs_secret("secret")
    }

    #[tokio::test]
    async fn test_builds_each_family() {
        let oidc = build_provider(&builder(ProviderKind::Oidc).build().unwrap())
            .await
            .unwrap();
        assert_eq!(oidc.data().client_id, "gateway");
        assert!(oidc.data().provider_name.is_empty());

        let keycloak = build_provider(&builder(ProviderKind::Keycloak).build().unwrap())
            .await
            .unwrap();
        assert_eq!(keycloak.data().provider_name, "Keycloak OIDC");

        let nextcloud = build_provider(
            &builder(ProviderKind::Nextcloud)
                .validate_url(Url::parse("https://cloud.example.com/ocs/v2.php/cloud/user").unwrap())
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(nextcloud.data().provider_name, "Nextcloud");
    }

    #[tokio::test]
    async fn test_provider_data_carries_claims_and_groups() {
        let config = builder(ProviderKind::Oidc)
            .email_claim("phone_number")
            .allowed_groups(vec!["admins".into()])
            .build()
            .unwrap();
        let provider = build_provider(&config).await.unwrap();
        assert_eq!(provider.data().email_claim, "phone_number");
        assert!(provider.data().allowed_groups.contains("admins"));
    }

    #[tokio::test]
    async fn test_nextcloud_without_issuer_has_no_verifier() {
        let config = ConfigBuilder::new()
            .provider(ProviderKind::Nextcloud)
            .client_id("c")
            .validate_url(Url::parse("https://cloud.example.com/user").unwrap())
            .build()
            .unwrap();
        let provider = build_provider(&config).await.unwrap();
        let err = provider
            .create_session_from_token(&RequestContext::new(), "a.b.c")
            .await
            .unwrap_err();
        assert!(err.is_config());
    }
}
