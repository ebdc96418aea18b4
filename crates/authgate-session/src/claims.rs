//! Claim normalization
//!
//! Providers disagree on how they encode claims: the same groups claim may be
//! a string, a list of strings, a list of objects or a single object. Every
//! raw value is lifted once into [`ClaimValue`] so the session code can match
//! exhaustively instead of probing JSON types at each use site.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde_json::{Map, Value};

use crate::constants::{EMAIL_VERIFIED_CLAIM, SUBJECT_CLAIM};
use crate::verify::VerificationError;

/// Decoded key/value assertions from a token payload or a profile response.
///
/// Transient by construction: sessions store only the fields extracted from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawClaims {
    inner: Map<String, Value>,
}

impl RawClaims {
    #[must_use]
    pub const fn new(inner: Map<String, Value>) -> Self {
        Self { inner }
    }

    /// Parse a JSON object; anything else is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, VerificationError> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(inner)) => Ok(Self { inner }),
            Ok(_) => Err(VerificationError::Malformed(
                "claims payload is not a JSON object".into(),
            )),
            Err(e) => Err(VerificationError::Malformed(e.to_string())),
        }
    }

    /// Decode the payload segment of a compact JWS without checking the signature.
    ///
    /// Only for tokens that were verified when they entered the session.
    pub fn from_compact_unverified(token: &str) -> Result<Self, VerificationError> {
        let mut parts = token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(VerificationError::Malformed("expected 3 token segments".into())),
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Lift a claim into its normalized shape
    #[must_use]
    pub fn value(&self, key: &str) -> ClaimValue {
        ClaimValue::from_json(self.inner.get(key))
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(Value::as_str)
    }

    /// The `sub` claim
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.get_str(SUBJECT_CLAIM).filter(|s| !s.is_empty())
    }

    /// `email_verified`, accepting both booleans and the string forms some
    /// providers send
    #[must_use]
    pub fn email_verified(&self) -> Option<bool> {
        match self.inner.get(EMAIL_VERIFIED_CLAIM)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.inner
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.inner)
    }
}

impl From<Map<String, Value>> for RawClaims {
    fn from(inner: Map<String, Value>) -> Self {
        Self { inner }
    }
}

/// Normalized claim value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    /// Key missing or JSON `null`
    Absent,
    /// A single string; objects and other scalars in canonical JSON form
    Scalar(String),
    /// A list; non-string members in canonical JSON form
    List(Vec<String>),
}

impl ClaimValue {
    #[must_use]
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Array(items)) => Self::List(items.iter().map(scalar_text).collect()),
            Some(other) => Self::Scalar(scalar_text(other)),
        }
    }

    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Flatten to a list: absent is `None`, a scalar a one-element list
    #[must_use]
    pub fn into_list(self) -> Option<Vec<String>> {
        match self {
            Self::Absent => None,
            Self::Scalar(s) => Some(vec![s]),
            Self::List(items) => Some(items),
        }
    }

    /// Whether any member equals one of `accepted`
    #[must_use]
    pub fn intersects(&self, accepted: &[String]) -> bool {
        match self {
            Self::Absent => false,
            Self::Scalar(s) => accepted.contains(s),
            Self::List(items) => items.iter().any(|i| accepted.contains(i)),
        }
    }
}

impl std::fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => Ok(()),
            Self::Scalar(s) => f.write_str(s),
            Self::List(items) => write!(f, "[{}]", items.join(" ")),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => canonical_json(other),
    }
}

/// Compact JSON with object keys sorted at every depth.
///
/// Does not depend on serde_json's `preserve_order` feature.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Canonical JSON, base64 (standard alphabet) encoded
#[must_use]
pub fn canonical_json_base64(value: &Value) -> String {
    STANDARD.encode(canonical_json(value))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Email from `claim_name`; `None` when absent, empty or not a string.
#[must_use]
pub fn extract_email(claims: &RawClaims, claim_name: &str) -> Option<String> {
    claims
        .get_str(claim_name)
        .filter(|email| !email.is_empty())
        .map(str::to_owned)
}

/// Groups from `claim_name`.
///
/// `None` means the claim is absent and existing groups must be kept;
/// `Some(vec![])` is an explicit empty membership.
#[must_use]
pub fn extract_groups(claims: &RawClaims, claim_name: &str) -> Option<Vec<String>> {
    claims.value(claim_name).into_list()
}
