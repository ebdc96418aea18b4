//! Authenticated session record

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Authenticated identity carried across requests.
///
/// Empty strings mean "unset". `groups` distinguishes "not yet populated"
/// (`None`) from "explicitly no groups" (`Some(vec![])`).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub email: String,
    /// Stable principal id; defaults to the email's local part
    pub user: String,
    pub groups: Option<Vec<String>>,
    pub expires_on: Option<SystemTime>,
    /// Not persisted by the encrypted wire format
    pub created_at: Option<SystemTime>,
    /// Base64 of canonical introspection JSON
    pub introspect_claims: String,
}

impl Session {
    /// Session carrying only identity, as recovered from the plain format
    #[must_use]
    pub fn with_identity(email: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            user: user.into(),
            ..Self::default()
        }
    }

    /// Whether `expires_on` is set and in the past
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_on.is_some_and(|t| t < SystemTime::now())
    }

    /// Time since `created_at`, when known
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        self.created_at
            .and_then(|t| SystemTime::now().duration_since(t).ok())
    }

    /// `user`, or the email's local part when `user` is empty
    #[must_use]
    pub fn user_or_default(&self) -> &str {
        if self.user.is_empty() {
            email_local_part(&self.email)
        } else {
            &self.user
        }
    }

    /// `expires_on` as Unix seconds, 0 when unset
    #[must_use]
    pub fn expires_on_unix(&self) -> u64 {
        self.expires_on
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs())
    }

    pub(crate) fn account_info(&self) -> String {
        format!("email:{} user:{}", self.email, self.user)
    }
}

/// Everything before the first `@`
#[must_use]
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or_default()
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session{{{}", self.account_info())?;
        if let Some(groups) = &self.groups {
            write!(f, " groups:[{}]", groups.join(" "))?;
        }
        if !self.access_token.is_empty() {
            f.write_str(" token:true")?;
        }
        if !self.id_token.is_empty() {
            f.write_str(" id_token:true")?;
        }
        if let Some(age) = self.age() {
            write!(f, " age:{}s", age.as_secs())?;
        }
        if self.expires_on.is_some() {
            write!(f, " expires:{}", self.expires_on_unix())?;
        }
        if !self.refresh_token.is_empty() {
            f.write_str(" refresh_token:true")?;
        }
        if !self.introspect_claims.is_empty() {
            f.write_str(" introspected:true")?;
        }
        f.write_str("}")
    }
}

// Credentials never reach logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("email", &self.email)
            .field("user", &self.user)
            .field("groups", &self.groups)
            .field("has_access_token", &!self.access_token.is_empty())
            .field("has_id_token", &!self.id_token.is_empty())
            .field("has_refresh_token", &!self.refresh_token.is_empty())
            .field("expires_on", &self.expires_on)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_expired() {
        let mut s = Session::default();
        assert!(!s.is_expired());

        s.expires_on = Some(SystemTime::now() - Duration::from_secs(10));
        assert!(s.is_expired());

        s.expires_on = Some(SystemTime::now() + Duration::from_secs(3600));
        assert!(!s.is_expired());
    }

    #[test]
    fn test_age() {
        let mut s = Session::default();
        assert!(s.age().is_none());

        s.created_at = Some(SystemTime::now() - Duration::from_secs(120));
        let age = s.age().unwrap();
        assert!(age >= Duration::from_secs(120));
    }

    #[test]
    fn test_user_or_default() {
        let s = Session::with_identity("jane@example.com", "");
        assert_eq!(s.user_or_default(), "jane");

        let s = Session::with_identity("jane@example.com", "j123");
        assert_eq!(s.user_or_default(), "j123");

        assert_eq!(email_local_part("no-at-sign"), "no-at-sign");
        assert_eq!(email_local_part(""), "");
    }

    #[test]
    fn test_display_hides_credentials() {
        let s = Session {
            access_token: "secret-access".into(),
            id_token: "secret-id".into(),
            refresh_token: "secret-refresh".into(),
            email: "a@b.c".into(),
            user: "a".into(),
            expires_on: Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            ..Session::default()
        };
        let text = s.to_string();
        assert_eq!(
            text,
            "Session{email:a@b.c user:a token:true id_token:true expires:1700000000 \
             refresh_token:true}"
        );

        let debug = format!("{s:?}");
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_display_minimal() {
        let s = Session::with_identity("x@y.z", "x");
        assert_eq!(s.to_string(), "Session{email:x@y.z user:x}");
    }

    #[test]
    fn test_expires_on_unix() {
        let mut s = Session::default();
        assert_eq!(s.expires_on_unix(), 0);
        s.expires_on = Some(UNIX_EPOCH + Duration::from_secs(42));
        assert_eq!(s.expires_on_unix(), 42);
    }
}
