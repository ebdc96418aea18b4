//! JWKS fetching and caching

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use serde::Deserialize;
use url::Url;

use super::error::VerificationError;
use crate::Result;
use crate::context::RequestContext;

/// JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (RSA, EC)
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub r#use: Option<String>,
    // RSA components
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // EC components
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Clone)]
struct JwkEntry {
    key: DecodingKey,
    algorithm: Algorithm,
}

impl std::fmt::Debug for JwkEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwkEntry")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct KeyState {
    named: HashMap<String, JwkEntry>,
    unnamed: Vec<JwkEntry>,
    last_refresh: Option<Instant>,
}

/// Shortest gap between two fetches triggered by an unknown `kid`
pub const DEFAULT_MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(10);

/// Provider signing keys, refetched lazily once the TTL lapses or a token
/// names a `kid` the cached set lacks.
///
/// This is the only shared mutable state in the crate.
pub struct JwksCache {
    state: RwLock<KeyState>,
    jwks_uri: Url,
    client: reqwest::Client,
    ttl: Duration,
    min_refetch_interval: Duration,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("jwks_uri", &self.jwks_uri)
            .field("ttl", &self.ttl)
            .field("min_refetch_interval", &self.min_refetch_interval)
            .field("keys_count", &self.keys_count())
            .finish_non_exhaustive()
    }
}

impl JwksCache {
    #[must_use]
    pub fn new(jwks_uri: Url, ttl: Duration, client: reqwest::Client) -> Self {
        Self {
            state: RwLock::new(KeyState::default()),
            jwks_uri,
            client,
            ttl,
            min_refetch_interval: DEFAULT_MIN_REFETCH_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_min_refetch_interval(mut self, interval: Duration) -> Self {
        self.min_refetch_interval = interval;
        self
    }

    #[must_use]
    pub const fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    /// Key for `kid`, or the first key matching `alg` when the token names none
    pub async fn get_key(
        &self,
        ctx: &RequestContext,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Result<DecodingKey> {
        if self.needs_refresh() {
            self.refresh(ctx).await?;
        }

        if let Some(kid) = kid {
            if let Some(key) = self.named_key(kid, alg) {
                return Ok(key);
            }
            // Unknown kid: the provider may have rotated its keys
            if self.can_refetch() {
                tracing::info!(kid, "Unknown key id, refetching JWKS");
                self.refresh(ctx).await?;
                if let Some(key) = self.named_key(kid, alg) {
                    return Ok(key);
                }
            }
            return Err(VerificationError::KeyNotFound(kid.to_string()).into());
        }

        let state = self.state.read();
        state
            .unnamed
            .iter()
            .chain(state.named.values())
            .find(|entry| entry.algorithm == alg)
            .map(|entry| entry.key.clone())
            .ok_or_else(|| VerificationError::NoMatchingKey.into())
    }

    /// Refetch the key set
    pub async fn refresh(&self, ctx: &RequestContext) -> Result<()> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Refreshing JWKS");

        let jwks: JwkSet = ctx
            .run(async {
                let response = self
                    .client
                    .get(self.jwks_uri.clone())
                    .send()
                    .await
                    .map_err(|e| VerificationError::KeySetUnavailable(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(VerificationError::KeySetUnavailable(format!(
                        "status {}",
                        response.status().as_u16()
                    ))
                    .into());
                }
                response
                    .json()
                    .await
                    .map_err(|e| VerificationError::KeySetUnavailable(e.to_string()).into())
            })
            .await?;

        let mut named = HashMap::new();
        let mut unnamed = Vec::new();

        for jwk in jwks.keys {
            if let Some((key, algorithm)) = decode_jwk(&jwk)? {
                let entry = JwkEntry { key, algorithm };
                match jwk.kid {
                    Some(kid) => {
                        named.insert(kid, entry);
                    }
                    None => unnamed.push(entry),
                }
            }
        }

        let count = named.len() + unnamed.len();
        *self.state.write() = KeyState {
            named,
            unnamed,
            last_refresh: Some(Instant::now()),
        };

        tracing::info!(keys_count = count, "JWKS refreshed successfully");
        Ok(())
    }

    fn named_key(&self, kid: &str, alg: Algorithm) -> Option<DecodingKey> {
        self.state
            .read()
            .named
            .get(kid)
            .filter(|entry| entry.algorithm == alg)
            .map(|entry| entry.key.clone())
    }

    fn can_refetch(&self) -> bool {
        self.state
            .read()
            .last_refresh
            .is_none_or(|t| t.elapsed() >= self.min_refetch_interval)
    }

    fn needs_refresh(&self) -> bool {
        self.state
            .read()
            .last_refresh
            .is_none_or(|t| t.elapsed() > self.ttl)
    }

    fn keys_count(&self) -> usize {
        let state = self.state.read();
        state.named.len() + state.unnamed.len()
    }
}

fn decode_jwk(jwk: &Jwk) -> Result<Option<(DecodingKey, Algorithm)>> {
    if jwk.r#use.as_deref().is_some_and(|u| u != "sig") {
        return Ok(None);
    }

    let alg = match jwk.alg.as_deref() {
        Some("RS256") => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        Some("ES256") => Algorithm::ES256,
        Some("ES384") => Algorithm::ES384,
        None => match jwk.kty.as_str() {
            "RSA" => Algorithm::RS256,
            "EC" => match jwk.crv.as_deref() {
                Some("P-256") => Algorithm::ES256,
                Some("P-384") => Algorithm::ES384,
                _ => return Ok(None),
            },
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };

    let malformed = |msg: &str| VerificationError::KeySetUnavailable(msg.to_string());

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref().ok_or_else(|| malformed("missing 'n' in RSA key"))?;
            let e = jwk.e.as_ref().ok_or_else(|| malformed("missing 'e' in RSA key"))?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| malformed(&format!("invalid RSA components: {e}")))?
        }
        "EC" => {
            let x = jwk.x.as_ref().ok_or_else(|| malformed("missing 'x' in EC key"))?;
            let y = jwk.y.as_ref().ok_or_else(|| malformed("missing 'y' in EC key"))?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| malformed(&format!("invalid EC components: {e}")))?
        }
        other => {
            tracing::debug!(kty = other, "Skipping unsupported key type");
            return Ok(None);
        }
    };

    Ok(Some((key, alg)))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::Error;

    const JWKS_JSON: &str = r#"{
        "keys": [
            {"kid": "key1", "kty": "RSA", "alg": "RS256", "use": "sig", "n": "test_n", "e": "AQAB"},
            {"kty": "RSA", "n": "dW5uYW1lZA", "e": "AQAB"},
            {"kid": "enc", "kty": "RSA", "use": "enc", "n": "test_n", "e": "AQAB"},
            {"kid": "oct", "kty": "oct"}
        ]
    }"#;

    async fn jwks_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(JWKS_JSON),
            )
            .mount(&server)
            .await;
        server
    }

    fn cache_for(server: &MockServer) -> JwksCache {
        JwksCache::new(
            Url::parse(&format!("{}/jwks", server.uri())).unwrap(),
            Duration::from_secs(3600),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_jwk_set_deserialize() {
        let jwks: JwkSet = serde_json::from_str(JWKS_JSON).unwrap();
        assert_eq!(jwks.keys.len(), 4);
        assert_eq!(jwks.keys[0].kid, Some("key1".to_string()));
        assert_eq!(jwks.keys[0].kty, "RSA");
    }

    #[test]
    fn test_jwks_cache_needs_refresh_initially() {
        let cache = JwksCache::new(
            Url::parse("https://example.com/.well-known/jwks.json").unwrap(),
            Duration::from_secs(3600),
            reqwest::Client::new(),
        );
        assert!(cache.needs_refresh());
        assert_eq!(cache.keys_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_loads_signing_keys_only() {
        let server = jwks_server().await;
        let cache = cache_for(&server);

        cache.refresh(&RequestContext::new()).await.unwrap();
        assert_eq!(cache.keys_count(), 2);
        assert!(!cache.needs_refresh());
    }

    #[tokio::test]
    async fn test_get_key_by_kid_and_algorithm() {
        let server = jwks_server().await;
        let cache = cache_for(&server);
        let ctx = RequestContext::new();

        assert!(cache.get_key(&ctx, Some("key1"), Algorithm::RS256).await.is_ok());
        assert!(cache.get_key(&ctx, None, Algorithm::RS256).await.is_ok());

        let err = cache
            .get_key(&ctx, Some("missing"), Algorithm::RS256)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::KeyNotFound(ref kid)) if kid == "missing"
        ));

        let err = cache.get_key(&ctx, None, Algorithm::ES256).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::NoMatchingKey)
        ));
    }

    fn key_set(kid: &str) -> String {
        format!(r#"{{"keys": [{{"kid": "{kid}", "kty": "RSA", "alg": "RS256", "n": "test_n", "e": "AQAB"}}]}}"#)
    }

    async fn rotating_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string(key_set("old")))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string(key_set("new")))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_unknown_kid_refetches_rotated_keys() {
        let server = rotating_server().await;
        let cache = cache_for(&server).with_min_refetch_interval(Duration::ZERO);
        let ctx = RequestContext::new();

        assert!(cache.get_key(&ctx, Some("old"), Algorithm::RS256).await.is_ok());
        assert!(cache.get_key(&ctx, Some("new"), Algorithm::RS256).await.is_ok());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);

        // Rotated out
        let err = cache
            .get_key(&ctx, Some("old"), Algorithm::RS256)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::KeyNotFound(ref kid)) if kid == "old"
        ));
    }

    #[tokio::test]
    async fn test_unknown_kid_refetch_is_rate_limited() {
        let server = rotating_server().await;
        let cache = cache_for(&server);
        let ctx = RequestContext::new();

        assert!(cache.get_key(&ctx, Some("old"), Algorithm::RS256).await.is_ok());
        for _ in 0..3 {
            let err = cache
                .get_key(&ctx, Some("forged"), Algorithm::RS256)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::Verification(VerificationError::KeyNotFound(_))
            ));
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_key_set_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = cache_for(&server)
            .refresh(&RequestContext::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Verification(VerificationError::KeySetUnavailable(_))
        ));
    }
}
