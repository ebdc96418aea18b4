//! Generic OpenID Connect provider

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use super::Provider;
use super::data::ProviderData;
use super::http::EndpointClient;
use super::refresh::{RefreshOutcome, needs_refresh};
use crate::claims::{RawClaims, canonical_json_base64, extract_email, extract_groups};
use crate::constants::DEFAULT_EMAIL_CLAIM;
use crate::context::RequestContext;
use crate::session::{Session, email_local_part};
use crate::verify::{TokenVerifier, VerificationError};
use crate::{Error, Result};

/// Identity fields taken from a verified identity token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub user: String,
    pub groups: Option<Vec<String>>,
}

/// Code exchange, profile and introspection enrichment, and refresh against
/// standard OIDC endpoints.
pub struct OidcProvider {
    data: ProviderData,
    verifier: Option<Arc<TokenVerifier>>,
    http: EndpointClient,
}

impl std::fmt::Debug for OidcProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcProvider")
            .field("data", &self.data)
            .field("has_verifier", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}

impl OidcProvider {
    #[must_use]
    pub fn new(data: ProviderData, http: reqwest::Client) -> Self {
        Self {
            data,
            verifier: None,
            http: EndpointClient::new(http),
        }
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: TokenVerifier) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    #[must_use]
    pub const fn data_mut(&mut self) -> &mut ProviderData {
        &mut self.data
    }

    #[must_use]
    pub const fn endpoints(&self) -> &EndpointClient {
        &self.http
    }

    pub fn verifier(&self) -> Result<&TokenVerifier> {
        self.verifier
            .as_deref()
            .ok_or_else(|| Error::Config("no identity token verifier configured".into()))
    }

    async fn verify_id_token(&self, ctx: &RequestContext, token: &str) -> Result<RawClaims> {
        let result = self.verifier()?.verify(ctx, token).await;
        if let Err(e) = &result {
            tracing::warn!(provider = %self.data.provider_name, error = %e, "identity token rejected");
            #[cfg(feature = "metrics")]
            {
                if e.is_verification() {
                    crate::observability::record_verification_failure(&self.data.provider_name);
                }
            }
        }
        result
    }

    /// Email, user and groups from verified claims.
    ///
    /// User is the subject, or the email's local part without one.
    pub fn identity_from_claims(
        &self,
        claims: &RawClaims,
    ) -> std::result::Result<Identity, VerificationError> {
        let email = extract_email(claims, &self.data.email_claim).unwrap_or_default();

        if self.data.email_claim == DEFAULT_EMAIL_CLAIM
            && !self.data.allow_unverified_email
            && claims.email_verified() == Some(false)
        {
            return Err(VerificationError::UnverifiedEmail(email));
        }

        let user = claims
            .subject()
            .map_or_else(|| email_local_part(&email).to_string(), str::to_owned);

        Ok(Identity {
            groups: extract_groups(claims, &self.data.groups_claim),
            email,
            user,
        })
    }

    async fn fetch_profile(&self, ctx: &RequestContext, access_token: &str) -> Result<RawClaims> {
        let url = self
            .data
            .profile_url
            .as_ref()
            .ok_or_else(|| Error::Config("profile URL not configured".into()))?;
        self.http
            .get_claims(ctx, "profile request", url, access_token)
            .await
    }

    /// Store canonical introspection claims; only cancellation is fatal
    async fn introspect_into(&self, ctx: &RequestContext, session: &mut Session) -> Result<()> {
        let Some(url) = self.data.introspect_url.as_ref() else {
            return Ok(());
        };
        if session.access_token.is_empty() {
            return Ok(());
        }

        let result = match self.data.client_secret() {
            Ok(secret) => {
                self.http
                    .introspect(ctx, url, &session.access_token, &self.data.client_id, &secret)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(claims) => {
                session.introspect_claims = canonical_json_base64(&claims.into_value());
                Ok(())
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::warn!(provider = %self.data.provider_name, error = %e, "introspection failed");
                #[cfg(feature = "metrics")]
                {
                    crate::observability::record_enrich_failure(&self.data.provider_name, "introspection");
                }
                Ok(())
            }
        }
    }

    /// Run the refresh grant and verify any new identity token.
    ///
    /// The session is only read; apply the outcome afterwards.
    pub async fn refresh(&self, ctx: &RequestContext, session: &Session) -> Result<RefreshOutcome> {
        let url = self.data.redeem_url()?;
        let secret = self.data.client_secret()?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", session.refresh_token.as_str()),
            ("client_id", self.data.client_id.as_str()),
            ("client_secret", secret.as_str()),
        ];
        let token = self
            .http
            .token_request(ctx, "token refresh", url, &params)
            .await?;

        let identity = match token.id_token() {
            Some(id_token) => {
                let claims = self.verify_id_token(ctx, id_token).await?;
                Some((id_token.to_string(), self.identity_from_claims(&claims)?))
            }
            None => None,
        };

        Ok(RefreshOutcome {
            refresh_token: token.refresh_token().map(str::to_owned),
            expires_in: token.expires_in(),
            access_token: token.access_token,
            identity,
        })
    }

    /// Log and count a refresh attempt, passing its result through
    pub(crate) fn record_refresh<T>(&self, result: Result<T>) -> Result<T> {
        #[cfg(feature = "metrics")]
        {
            crate::observability::record_refresh(&self.data.provider_name, result.is_ok());
        }

        result.inspect_err(|e| {
            tracing::warn!(provider = %self.data.provider_name, error = %e, "session refresh failed");
        })
    }

    async fn redeem_inner(
        &self,
        ctx: &RequestContext,
        redirect_uri: &str,
        code: &str,
    ) -> Result<Session> {
        let url = self.data.redeem_url()?;
        let secret = self.data.client_secret()?;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.data.client_id.as_str()),
            ("client_secret", secret.as_str()),
        ];
        let token = self
            .http
            .token_request(ctx, "token exchange", url, &params)
            .await?;

        let mut session = Session::default();
        if let Some(id_token) = token.id_token() {
            let claims = self.verify_id_token(ctx, id_token).await?;
            let identity = self.identity_from_claims(&claims)?;
            session.email = identity.email;
            session.user = identity.user;
            session.groups = identity.groups;
        }

        let now = SystemTime::now();
        session.id_token = token.id_token().unwrap_or_default().to_string();
        session.refresh_token = token.refresh_token().unwrap_or_default().to_string();
        session.expires_on = token.expires_in().map(|d| now + d);
        session.access_token = token.access_token;
        session.created_at = Some(now);
        Ok(session)
    }
}

/// Claims of the session's stored identity token, decoded without
/// re-verification; it was verified when it entered the session.
fn stored_id_token_claims(session: &Session) -> Option<RawClaims> {
    if session.id_token.is_empty() {
        return None;
    }
    RawClaims::from_compact_unverified(&session.id_token)
        .inspect_err(|e| tracing::debug!(error = %e, "stored identity token not decodable"))
        .ok()
}

#[async_trait]
impl Provider for OidcProvider {
    fn data(&self) -> &ProviderData {
        &self.data
    }

    async fn redeem(
        &self,
        ctx: &RequestContext,
        redirect_uri: &str,
        code: &str,
    ) -> Result<Session> {
        let result = self.redeem_inner(ctx, redirect_uri, code).await;

        #[cfg(feature = "metrics")]
        {
            crate::observability::record_redeem(&self.data.provider_name, result.is_ok());
        }

        match &result {
            Ok(session) => tracing::info!(
                provider = %self.data.provider_name,
                user = %session.user,
                has_id_token = !session.id_token.is_empty(),
                "authorization code redeemed"
            ),
            Err(e) => tracing::warn!(
                provider = %self.data.provider_name,
                error = %e,
                "authorization code exchange failed"
            ),
        }
        result
    }

    async fn create_session_from_token(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<Session> {
        let claims = self.verify_id_token(ctx, token).await?;
        let mut identity = self.identity_from_claims(&claims)?;
        if identity.email.is_empty() {
            identity.email = claims.subject().unwrap_or_default().to_string();
        }

        let expires_on = claims
            .get("exp")
            .and_then(serde_json::Value::as_u64)
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));

        Ok(Session {
            access_token: token.to_string(),
            id_token: token.to_string(),
            refresh_token: String::new(),
            email: identity.email,
            user: identity.user,
            groups: identity.groups,
            expires_on,
            created_at: Some(SystemTime::now()),
            introspect_claims: String::new(),
        })
    }

    async fn enrich_session(&self, ctx: &RequestContext, session: &mut Session) -> Result<()> {
        let provider = self.data.provider_name.as_str();
        let wants_profile = session.email.is_empty() || session.groups.is_none();

        let profile = if wants_profile
            && self.data.profile_url.is_some()
            && !session.access_token.is_empty()
        {
            match self.fetch_profile(ctx, &session.access_token).await {
                Ok(claims) => Some(claims),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(provider, error = %e, "profile request failed");
                    #[cfg(feature = "metrics")]
                    {
                        crate::observability::record_enrich_failure(provider, "profile");
                    }
                    None
                }
            }
        } else {
            None
        };

        let id_claims = stored_id_token_claims(session);

        if session.email.is_empty() {
            let email = profile
                .as_ref()
                .and_then(|p| extract_email(p, &self.data.email_claim))
                .or_else(|| {
                    id_claims
                        .as_ref()
                        .and_then(|c| extract_email(c, &self.data.email_claim))
                });
            if let Some(email) = email {
                tracing::debug!(provider, "email filled during enrichment");
                session.email = email;
            }
        }

        if session.groups.is_none()
            && let Some(groups) = profile
                .as_ref()
                .and_then(|p| extract_groups(p, &self.data.groups_claim))
        {
            session.groups = Some(groups);
        }

        self.introspect_into(ctx, session).await?;

        if session.email.is_empty() {
            #[cfg(feature = "metrics")]
            {
                crate::observability::record_enrich_failure(provider, "email");
            }
            return Err(Error::Domain(
                "neither the id_token nor the profile endpoint set an email".into(),
            ));
        }

        if session.user.is_empty() {
            session.user = id_claims
                .as_ref()
                .and_then(RawClaims::subject)
                .map_or_else(|| email_local_part(&session.email).to_string(), str::to_owned);
        }

        Ok(())
    }

    async fn refresh_session_if_needed(
        &self,
        ctx: &RequestContext,
        session: &mut Session,
    ) -> Result<bool> {
        if !needs_refresh(session, SystemTime::now()) {
            return Ok(false);
        }

        let outcome = self.record_refresh(self.refresh(ctx, session).await)?;
        outcome.apply(session, SystemTime::now());
        tracing::info!(provider = %self.data.provider_name, user = %session.user, "session refreshed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn claims(value: serde_json::Value) -> RawClaims {
        match value {
            serde_json::Value::Object(map) => RawClaims::new(map),
            _ => panic!("object expected"),
        }
    }

    fn provider(data: ProviderData) -> OidcProvider {
        OidcProvider::new(data, reqwest::Client::new())
    }

    #[test]
    fn test_identity_from_claims() {
        let p = provider(ProviderData::new("oidc", "client"));
        let identity = p
            .identity_from_claims(&claims(json!({
                "sub": "123456789",
                "email": "janed@me.com",
                "groups": ["test:a", "test:b"],
            })))
            .unwrap();
        assert_eq!(identity.email, "janed@me.com");
        assert_eq!(identity.user, "123456789");
        assert_eq!(
            identity.groups,
            Some(vec!["test:a".to_string(), "test:b".to_string()])
        );
    }

    #[test]
    fn test_identity_user_falls_back_to_local_part() {
        let p = provider(ProviderData::new("oidc", "client"));
        let identity = p
            .identity_from_claims(&claims(json!({"email": "jane@example.com"})))
            .unwrap();
        assert_eq!(identity.user, "jane");
        assert!(identity.groups.is_none());
    }

    #[test]
    fn test_unverified_email_rejected() {
        let p = provider(ProviderData::new("oidc", "client"));
        let err = p
            .identity_from_claims(&claims(json!({
                "sub": "1",
                "email": "jane@example.com",
                "email_verified": false,
            })))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "email in id_token (jane@example.com) isn't verified"
        );
    }

    #[test]
    fn test_unverified_email_allowed_by_flag_or_custom_claim() {
        let c = claims(json!({"sub": "1", "email": "a@b.c", "phone": "+1", "email_verified": false}));

        let mut data = ProviderData::new("oidc", "client");
        data.allow_unverified_email = true;
        assert!(provider(data).identity_from_claims(&c).is_ok());

        let mut data = ProviderData::new("oidc", "client");
        data.email_claim = "phone".into();
        let identity = provider(data).identity_from_claims(&c).unwrap();
        assert_eq!(identity.email, "+1");
    }

    #[test]
    fn test_verifier_required() {
        let p = provider(ProviderData::new("oidc", "client"));
        assert!(p.verifier().unwrap_err().is_config());
    }

    #[tokio::test]
    async fn test_refresh_not_needed_makes_no_calls() {
        // No endpoints configured: any network attempt would be a config error
        let p = provider(ProviderData::new("oidc", "client"));
        let mut session = Session {
            access_token: "at".into(),
            ..Session::default()
        };
        let refreshed = p
            .refresh_session_if_needed(&RequestContext::new(), &mut session)
            .await
            .unwrap();
        assert!(!refreshed);
        assert_eq!(session.access_token, "at");
    }

    #[tokio::test]
    async fn test_enrich_complete_session_without_endpoints() {
        let p = provider(ProviderData::new("oidc", "client"));
        let mut session = Session {
            email: "a@b.c".into(),
            user: "a".into(),
            groups: Some(vec![]),
            ..Session::default()
        };
        let before = session.clone();
        p.enrich_session(&RequestContext::new(), &mut session)
            .await
            .unwrap();
        assert_eq!(session, before);
    }

    #[tokio::test]
    async fn test_enrich_email_from_stored_id_token() {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"42","email":"stored@example.com"}"#);
        let p = provider(ProviderData::new("oidc", "client"));
        let mut session = Session {
            id_token: format!("e30.{payload}.sig"),
            ..Session::default()
        };
        p.enrich_session(&RequestContext::new(), &mut session)
            .await
            .unwrap();
        assert_eq!(session.email, "stored@example.com");
        assert_eq!(session.user, "42");
        assert!(session.groups.is_none());
    }

    #[tokio::test]
    async fn test_enrich_no_email_is_domain_error() {
        let p = provider(ProviderData::new("oidc", "client"));
        let mut session = Session {
            user: "missing.email".into(),
            groups: Some(vec!["g".into()]),
            ..Session::default()
        };
        let err = p
            .enrich_session(&RequestContext::new(), &mut session)
            .await
            .unwrap_err();
        assert!(err.is_domain());
        assert!(session.email.is_empty());
        assert_eq!(session.user, "missing.email");
    }
}
