//! Keycloak OIDC: generic OIDC plus realm and client roles as groups

use std::time::SystemTime;

use async_trait::async_trait;
use serde_json::Value;

use super::Provider;
use super::data::ProviderData;
use super::oidc::OidcProvider;
use super::refresh::needs_refresh;
use crate::Result;
use crate::claims::{ClaimValue, RawClaims};
use crate::constants::KEYCLOAK_ROLE_PREFIX;
use crate::context::RequestContext;
use crate::session::Session;

pub const KEYCLOAK_OIDC_PROVIDER_NAME: &str = "Keycloak OIDC";

#[derive(Debug)]
pub struct KeycloakOidcProvider {
    inner: OidcProvider,
}

impl KeycloakOidcProvider {
    #[must_use]
    pub fn new(mut inner: OidcProvider) -> Self {
        if inner.data().provider_name.is_empty() {
            inner.data_mut().provider_name = KEYCLOAK_OIDC_PROVIDER_NAME.to_string();
        }
        Self { inner }
    }

    /// Restrict access to the given realm roles
    pub fn add_allowed_roles<I, S>(&mut self, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.data_mut().add_allowed_groups(
            roles
                .into_iter()
                .map(|r| format!("{KEYCLOAK_ROLE_PREFIX}{}", r.as_ref())),
        );
    }

    /// Roles from a signature-checked access token.
    ///
    /// The access token's audience is not ours, so only the signature is checked.
    async fn roles(&self, ctx: &RequestContext, access_token: &str) -> Result<Vec<String>> {
        if access_token.is_empty() {
            return Ok(Vec::new());
        }
        let claims = self
            .inner
            .verifier()?
            .verify_signature_only(ctx, access_token)
            .await
            .inspect_err(|e| {
                tracing::warn!(error = %e, "failed to extract roles from access token");
            })?;
        Ok(extract_roles(&claims))
    }
}

/// `realm_access.roles` as `role:<r>`, then `resource_access.<client>.roles`
/// as `role:<client>:<r>`
#[must_use]
pub fn extract_roles(claims: &RawClaims) -> Vec<String> {
    let mut roles: Vec<String> = role_list(claims.get("realm_access"))
        .into_iter()
        .map(|r| format!("{KEYCLOAK_ROLE_PREFIX}{r}"))
        .collect();

    if let Some(Value::Object(clients)) = claims.get("resource_access") {
        for (client, access) in clients {
            roles.extend(
                role_list(Some(access))
                    .into_iter()
                    .map(|r| format!("{KEYCLOAK_ROLE_PREFIX}{client}:{r}")),
            );
        }
    }
    roles
}

fn role_list(access: Option<&Value>) -> Vec<String> {
    match access {
        Some(Value::Object(map)) => ClaimValue::from_json(map.get("roles"))
            .into_list()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Append roles to groups, skipping ones already present.
/// Groups stay `None` when there is nothing to add.
fn append_roles(session: &mut Session, roles: Vec<String>) {
    if roles.is_empty() {
        return;
    }
    let groups = session.groups.get_or_insert_with(Vec::new);
    for role in roles {
        if !groups.contains(&role) {
            groups.push(role);
        }
    }
}

#[async_trait]
impl Provider for KeycloakOidcProvider {
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
        let mut session = self.inner.create_session_from_token(ctx, token).await?;
        let roles = self.roles(ctx, &session.access_token).await?;
        append_roles(&mut session, roles);
        Ok(session)
    }

    async fn enrich_session(&self, ctx: &RequestContext, session: &mut Session) -> Result<()> {
        self.inner.enrich_session(ctx, session).await?;
        let roles = self.roles(ctx, &session.access_token).await?;
        append_roles(session, roles);
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

        let result = async {
            let outcome = self.inner.refresh(ctx, session).await?;
            let roles = self.roles(ctx, &outcome.access_token).await?;
            Ok::<_, crate::Error>((outcome, roles))
        }
        .await;
        let (outcome, roles) = self.inner.record_refresh(result)?;

        outcome.apply(session, SystemTime::now());
        append_roles(session, roles);
        tracing::info!(provider = %self.data().provider_name, user = %session.user, "session refreshed");
        Ok(true)
    }
}
