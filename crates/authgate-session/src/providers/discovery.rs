//! OIDC discovery using the openidconnect crate

use std::time::Duration;

use openidconnect::IssuerUrl;
use openidconnect::core::CoreProviderMetadata;
use url::Url;

use super::data::ProviderData;
use crate::{Error, Result};

/// Endpoints published in the issuer's discovery document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEndpoints {
    pub authorization_url: Url,
    pub token_url: Option<Url>,
    pub userinfo_url: Option<Url>,
    pub jwks_uri: Url,
}

impl DiscoveredEndpoints {
    /// Fill endpoints the configuration left unset
    pub fn fill(&self, data: &mut ProviderData) {
        if data.login_url.is_none() {
            data.login_url = Some(self.authorization_url.clone());
        }
        if data.redeem_url.is_none() {
            data.redeem_url.clone_from(&self.token_url);
        }
        if data.profile_url.is_none() {
            data.profile_url.clone_from(&self.userinfo_url);
        }
    }
}

fn parse(kind: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| Error::Config(format!("Invalid {kind} URL: {e}")))
}

/// Fetch `<issuer>/.well-known/openid-configuration`
pub async fn discover(issuer: &Url, timeout: Duration) -> Result<DiscoveredEndpoints> {
    tracing::info!(issuer = %issuer, "Discovering OIDC provider");

    let issuer_url = IssuerUrl::new(issuer.as_str().trim_end_matches('/').to_string())
        .map_err(|e| Error::Config(format!("Invalid issuer URL: {e}")))?;

    // openidconnect re-exports its own reqwest version
    let http_client = openidconnect::reqwest::Client::builder()
        .timeout(timeout)
        .redirect(openidconnect::reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

    let metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
        .await
        .map_err(|e| Error::transport("OIDC discovery", e.to_string()))?;

    let endpoints = DiscoveredEndpoints {
        authorization_url: parse("authorization", metadata.authorization_endpoint().as_str())?,
        token_url: metadata
            .token_endpoint()
            .map(|u| parse("token", u.as_str()))
            .transpose()?,
        userinfo_url: metadata
            .userinfo_endpoint()
            .map(|u| parse("userinfo", u.as_str()))
            .transpose()?,
        jwks_uri: parse("JWKS", metadata.jwks_uri().as_str())?,
    };

    tracing::info!(jwks_uri = %endpoints.jwks_uri, "OIDC discovery complete");
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> DiscoveredEndpoints {
        DiscoveredEndpoints {
            authorization_url: Url::parse("https://idp.example.com/auth").unwrap(),
            token_url: Some(Url::parse("https://idp.example.com/token").unwrap()),
            userinfo_url: Some(Url::parse("https://idp.example.com/userinfo").unwrap()),
            jwks_uri: Url::parse("https://idp.example.com/certs").unwrap(),
        }
    }

    #[test]
    fn test_fill_only_unset() {
        let mut data = ProviderData {
            redeem_url: Some(Url::parse("https://override.example.com/token").unwrap()),
            ..ProviderData::default()
        };
        endpoints().fill(&mut data);

        assert_eq!(
            data.redeem_url.unwrap().as_str(),
            "https://override.example.com/token"
        );
        assert_eq!(data.login_url.unwrap().as_str(), "https://idp.example.com/auth");
        assert_eq!(
            data.profile_url.unwrap().as_str(),
            "https://idp.example.com/userinfo"
        );
    }

    #[tokio::test]
    async fn test_discover_unreachable_issuer() {
        let issuer = Url::parse("http://127.0.0.1:1/realms/test").unwrap();
        let err = discover(&issuer, Duration::from_secs(2)).await.unwrap_err();
        assert!(err.is_transport());
    }
}
