//! Nextcloud: identity comes from the OCS user endpoint

use async_trait::async_trait;
use serde::Deserialize;

use super::Provider;
use super::data::ProviderData;
use super::oidc::OidcProvider;
use crate::claims::ClaimValue;
use crate::context::RequestContext;
use crate::session::Session;
use crate::{Error, Result};

pub const NEXTCLOUD_PROVIDER_NAME: &str = "Nextcloud";

#[derive(Debug, Deserialize)]
struct OcsEnvelope {
    ocs: Option<OcsBody>,
}

#[derive(Debug, Deserialize)]
struct OcsBody {
    data: Option<OcsUser>,
}

#[derive(Debug, Deserialize)]
struct OcsUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    groups: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct NextcloudProvider {
    inner: OidcProvider,
}

impl NextcloudProvider {
    #[must_use]
    pub fn new(mut inner: OidcProvider) -> Self {
        if inner.data().provider_name.is_empty() {
            inner.data_mut().provider_name = NEXTCLOUD_PROVIDER_NAME.to_string();
        }
        Self { inner }
    }

    async fn fetch_user(&self, ctx: &RequestContext, access_token: &str) -> Result<OcsUser> {
        let url = self
            .data()
            .validate_url
            .as_ref()
            .ok_or_else(|| Error::Config("validate URL not configured".into()))?;

        let claims = self
            .inner
            .endpoints()
            .get_claims(ctx, "user request", url, access_token)
            .await?;

        let envelope: OcsEnvelope = serde_json::from_value(claims.into_value())
            .map_err(|e| Error::transport("user request", format!("unparsable response: {e}")))?;
        envelope
            .ocs
            .and_then(|ocs| ocs.data)
            .ok_or_else(|| Error::Domain("user response has no ocs.data".into()))
    }
}

#[async_trait]
impl Provider for NextcloudProvider {
    fn data(&self) -> &ProviderData {
        self.inner.data()
    }

    async fn redeem(
        &self,
        ctx: &RequestContext,
        redirect_uri: &str,
        code: &str,
    ) -> Result<Session> {
        self.inner.redeem(ctx, redirect_uri, code).await
    }

    async fn create_session_from_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<Session> {
        self.inner.create_session_from_token(ctx, token).await
    }

    async fn enrich_session(&self, ctx: &RequestContext, session: &mut Session) -> Result<()> {
        let user = self
            .fetch_user(ctx, &session.access_token)
            .await
            .inspect_err(|e| {
                tracing::warn!(provider = %self.data().provider_name, error = %e, "user lookup failed");
            })?;

        if session.user.is_empty()
            && let Some(id) = user.id.filter(|id| !id.is_empty())
        {
            session.user = id;
        }
        if session.email.is_empty()
            && let Some(email) = user.email.filter(|e| !e.is_empty())
        {
            session.email = email;
        }
        if session.groups.is_none() {
            session.groups = ClaimValue::from_json(user.groups.as_ref()).into_list();
        }
        Ok(())
    }

    async fn refresh_session_if_needed(
        &self,
        ctx: &RequestContext,
        session: &mut Session,
    ) -> Result<bool> {
        self.inner.refresh_session_if_needed(ctx, session).await
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    #[test]
    fn test_defaults() {
        let inner = OidcProvider::new(ProviderData::default(), reqwest::Client::new());
        let p = NextcloudProvider::new(inner);
        assert_eq!(p.data().provider_name, "Nextcloud");
        assert!(p.data().login_url.is_none());
        assert!(p.data().redeem_url.is_none());
        assert!(p.data().validate_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let data = ProviderData {
            login_url: Some(Url::parse("https://example.com/index.php/apps/oauth2/authorize").unwrap()),
            redeem_url: Some(
                Url::parse("https://example.com/index.php/apps/oauth2/api/v1/token").unwrap(),
            ),
            validate_url: Some(
                Url::parse("https://example.com/test/ocs/v2.php/cloud/user?format=json").unwrap(),
            ),
            scope: "profile".into(),
            ..ProviderData::default()
        };
        let p = NextcloudProvider::new(OidcProvider::new(data, reqwest::Client::new()));
        assert_eq!(p.data().provider_name, "Nextcloud");
        assert_eq!(
            p.data().validate_url.as_ref().unwrap().as_str(),
            "https://example.com/test/ocs/v2.php/cloud/user?format=json"
        );
    }

    #[tokio::test]
    async fn test_enrich_without_validate_url() {
        let p = NextcloudProvider::new(OidcProvider::new(
            ProviderData::default(),
            reqwest::Client::new(),
        ));
        let mut session = Session {
            access_token: "at".into(),
            ..Session::default()
        };
        let err = p
            .enrich_session(&RequestContext::new(), &mut session)
            .await
            .unwrap_err();
        assert!(err.is_config());
        assert!(session.user.is_empty());
    }
}
