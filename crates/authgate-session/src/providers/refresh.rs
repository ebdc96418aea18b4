//! Refresh decision and session update

use std::time::{Duration, SystemTime};

use super::oidc::Identity;
use crate::session::Session;

/// Whether a refresh is due: a refresh token exists and the session has
/// a known expiry at or before `now`.
#[must_use]
pub fn needs_refresh(session: &Session, now: SystemTime) -> bool {
    !session.refresh_token.is_empty() && session.expires_on.is_some_and(|t| t <= now)
}

/// Result of a completed refresh round-trip.
///
/// Built from network responses first and applied in one step, so a failed
/// or cancelled refresh never leaves the session half-updated.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    /// Kept from the old session when the endpoint returns none
    pub refresh_token: Option<String>,
    /// New identity token with its verified identity
    pub identity: Option<(String, Identity)>,
    pub expires_in: Option<Duration>,
}

impl RefreshOutcome {
    pub fn apply(self, session: &mut Session, now: SystemTime) {
        session.access_token = self.access_token;
        if let Some(refresh_token) = self.refresh_token {
            session.refresh_token = refresh_token;
        }

        // A new identity token replaces identity wholesale
        if let Some((id_token, identity)) = self.identity {
            session.id_token = id_token;
            session.email = identity.email;
            session.user = identity.user;
            session.groups = identity.groups;
        }

        session.created_at = Some(now);
        session.expires_on = self.expires_in.map(|d| now + d);
    }
}
