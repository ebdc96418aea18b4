//! Shared fixtures: HS256 tokens and providers wired to a mock server

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use authgate_session::providers::{OidcProvider, ProviderData};
use authgate_session::verify::{
    JwtConfig, JwtSignatureVerifier, TokenVerifier, VerificationOptions,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use url::Url;
use wiremock::MockServer;

pub const CLIENT_ID: &str = "https://test.myapp.com";
pub const CLIENT_SECRET: &str = "secret";
pub const ISSUER: &str = "https://issuer.example.com";
pub const HS_SECRET: &str = "integration-test-secret";

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn mint(claims: &Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(HS_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Identity token claims for janed@me.com
pub fn id_token_claims() -> Value {
    json!({
        "iss": ISSUER,
        "aud": CLIENT_ID,
        "sub": "123456789",
        "email": "janed@me.com",
        "email_verified": true,
        "phone_number": "+4798765432",
        "groups": ["test:a", "test:b"],
        "iat": now_secs(),
        "exp": now_secs() + 3600,
    })
}

pub fn with_claims(overrides: &Value) -> Value {
    let mut claims = id_token_claims();
    if let (Value::Object(base), Value::Object(extra)) = (&mut claims, overrides) {
        for (k, v) in extra {
            if v.is_null() {
                base.remove(k);
            } else {
                base.insert(k.clone(), v.clone());
            }
        }
    }
    claims
}

pub fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&format!("{}{path}", server.uri())).unwrap()
}

pub fn provider_data(server: &MockServer) -> ProviderData {
    ProviderData {
        client_id: CLIENT_ID.into(),
        client_secret: CLIENT_SECRET.into(),
        login_url: Some(url(server, "/login/oauth/authorize")),
        redeem_url: Some(url(server, "/login/oauth/access_token")),
        profile_url: Some(url(server, "/profile")),
        ..ProviderData::default()
    }
}

pub fn verifier() -> TokenVerifier {
    let config = JwtConfig::new(Url::parse(ISSUER).unwrap()).with_hs_secret(HS_SECRET.into());
    let delegate = JwtSignatureVerifier::new(config, reqwest::Client::new());
    TokenVerifier::new(Arc::new(delegate), VerificationOptions::new(CLIENT_ID))
}

pub fn oidc_provider(data: ProviderData) -> OidcProvider {
    OidcProvider::new(data, reqwest::Client::new()).with_verifier(verifier())
}

pub fn token_response(id_token: Option<&str>, refresh_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": "a1234",
        "token_type": "Bearer",
        "expires_in": 10,
    });
    if let Some(id_token) = id_token {
        body["id_token"] = json!(id_token);
    }
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    body
}
