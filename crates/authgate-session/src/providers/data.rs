//! Provider-independent configuration

use std::collections::BTreeSet;
use std::path::PathBuf;

use url::Url;

use crate::constants::{DEFAULT_EMAIL_CLAIM, DEFAULT_GROUPS_CLAIM};
use crate::session::Session;
use crate::{Error, Result};

/// Endpoints, credentials and claim names shared by every provider family
#[derive(Clone)]
pub struct ProviderData {
    pub provider_name: String,
    pub client_id: String,
    pub client_secret: String,
    /// Read at use time when `client_secret` is empty
    pub client_secret_file: Option<PathBuf>,
    pub login_url: Option<Url>,
    pub redeem_url: Option<Url>,
    pub profile_url: Option<Url>,
    pub introspect_url: Option<Url>,
    pub validate_url: Option<Url>,
    pub scope: String,
    pub approval_prompt: String,
    pub email_claim: String,
    pub groups_claim: String,
    pub allow_unverified_email: bool,
    /// Omit the `nonce` parameter from login URLs
    pub skip_nonce: bool,
    /// Groups allowed through [`ProviderData::authorize`]; empty allows all
    pub allowed_groups: BTreeSet<String>,
}

impl std::fmt::Debug for ProviderData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderData")
            .field("provider_name", &self.provider_name)
            .field("client_id", &self.client_id)
            .field("has_client_secret", &!self.client_secret.is_empty())
            .field("login_url", &self.login_url)
            .field("redeem_url", &self.redeem_url)
            .field("profile_url", &self.profile_url)
            .field("introspect_url", &self.introspect_url)
            .field("validate_url", &self.validate_url)
            .field("scope", &self.scope)
            .field("email_claim", &self.email_claim)
            .field("groups_claim", &self.groups_claim)
            .finish_non_exhaustive()
    }
}

impl Default for ProviderData {
    fn default() -> Self {
        Self {
            provider_name: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            client_secret_file: None,
            login_url: None,
            redeem_url: None,
            profile_url: None,
            introspect_url: None,
            validate_url: None,
            scope: String::new(),
            approval_prompt: String::new(),
            email_claim: DEFAULT_EMAIL_CLAIM.to_string(),
            groups_claim: DEFAULT_GROUPS_CLAIM.to_string(),
            allow_unverified_email: false,
            skip_nonce: true,
            allowed_groups: BTreeSet::new(),
        }
    }
}

impl ProviderData {
    #[must_use]
    pub fn new(provider_name: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Client secret, read from `client_secret_file` when no inline secret
    /// is set.
    ///
    /// Read failures are reported without the file name.
    pub fn client_secret(&self) -> Result<String> {
        let Some(path) = self.client_secret_file.as_ref() else {
            return Ok(self.client_secret.clone());
        };
        if !self.client_secret.is_empty() {
            return Ok(self.client_secret.clone());
        }

        std::fs::read_to_string(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "error reading client secret file");
            Error::Config("could not read client secret file".into())
        })
    }

    pub(crate) fn redeem_url(&self) -> Result<&Url> {
        self.redeem_url
            .as_ref()
            .ok_or_else(|| Error::Config("redeem URL not configured".into()))
    }

    /// Authorization URL the user agent is sent to
    pub fn login_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> Result<Url> {
        let mut url = self
            .login_url
            .clone()
            .ok_or_else(|| Error::Config("login URL not configured".into()))?;

        {
            let mut query = url.query_pairs_mut();
            if !self.approval_prompt.is_empty() {
                query.append_pair("approval_prompt", &self.approval_prompt);
            }
            query
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scope)
                .append_pair("client_id", &self.client_id)
                .append_pair("state", state);
            if !self.skip_nonce {
                query.append_pair("nonce", nonce);
            }
        }
        Ok(url)
    }

    pub fn add_allowed_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_groups.extend(groups.into_iter().map(Into::into));
    }

    /// Whether the session passes the group restriction
    #[must_use]
    pub fn authorize(&self, session: &Session) -> bool {
        if self.allowed_groups.is_empty() {
            return true;
        }
        session
            .groups
            .iter()
            .flatten()
            .any(|g| self.allowed_groups.contains(g))
    }
}
