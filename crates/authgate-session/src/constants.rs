//! Shared claim names and protocol constants

/// Standard audience claim
pub const DEFAULT_AUDIENCE_CLAIM: &str = "aud";

/// Standard email claim
pub const DEFAULT_EMAIL_CLAIM: &str = "email";

/// Default groups claim
pub const DEFAULT_GROUPS_CLAIM: &str = "groups";

/// Subject claim, the stable principal id
pub const SUBJECT_CLAIM: &str = "sub";

/// Email verification flag, only honoured for the standard email claim
pub const EMAIL_VERIFIED_CLAIM: &str = "email_verified";

/// Prefix for Keycloak roles folded into groups
pub const KEYCLOAK_ROLE_PREFIX: &str = "role:";

/// Default HTTP timeout for provider endpoint calls
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Field separator of the plain session format
pub const PLAIN_SEPARATOR: char = ' ';

/// Field separator of the encrypted session format
pub const ENCRYPTED_SEPARATOR: char = '|';

/// Number of fields in the encrypted session format
pub const ENCRYPTED_FIELD_COUNT: usize = 6;
