//! Identity provider families
//!
//! Every family implements [`Provider`]. Keycloak and Nextcloud reuse the
//! generic [`OidcProvider`] by composition and only add what differs.

mod data;
#[cfg(feature = "discovery")]
mod discovery;
mod http;
mod keycloak;
mod nextcloud;
mod oidc;
mod refresh;

use async_trait::async_trait;
use url::Url;

pub use data::ProviderData;
#[cfg(feature = "discovery")]
pub use discovery::{DiscoveredEndpoints, discover};
pub use http::{EndpointClient, TokenResponse};
pub use keycloak::KeycloakOidcProvider;
pub use nextcloud::NextcloudProvider;
pub use oidc::{Identity, OidcProvider};
pub use refresh::{RefreshOutcome, needs_refresh};

use crate::Result;
use crate::context::RequestContext;
use crate::session::Session;

/// Session lifecycle operations of one identity provider
#[async_trait]
pub trait Provider: Send + Sync {
    fn data(&self) -> &ProviderData;

    /// Exchange an authorization code for a new session
    async fn redeem(&self, ctx: &RequestContext, redirect_uri: &str, code: &str)
    -> Result<Session>;

    /// Build a session from a bearer identity token
    async fn create_session_from_token(&self, ctx: &RequestContext, token: &str)
    -> Result<Session>;

    /// Fill unset session fields from provider endpoints
    async fn enrich_session(&self, ctx: &RequestContext, session: &mut Session) -> Result<()>;

    /// Refresh an expired session; `Ok(false)` when nothing was done
    async fn refresh_session_if_needed(
        &self,
        ctx: &RequestContext,
        session: &mut Session,
    ) -> Result<bool>;

    fn login_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> Result<Url> {
        self.data().login_url(redirect_uri, state, nonce)
    }

    fn authorize(&self, session: &Session) -> bool {
        self.data().authorize(session)
    }
}
