//! Token, profile and introspection endpoint calls

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::claims::RawClaims;
use crate::context::RequestContext;
use crate::{Error, Result};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Token endpoint response for both code exchange and refresh
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Identity token, if a non-empty one was returned
    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref().filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Lifetime; zero counts as unknown
    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Thin wrapper over a shared `reqwest::Client`.
///
/// Non-success statuses and unparsable bodies become [`Error::Transport`];
/// nothing is retried.
#[derive(Debug, Clone, Default)]
pub struct EndpointClient {
    http: reqwest::Client,
}

impl EndpointClient {
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    #[must_use]
    pub const fn inner(&self) -> &reqwest::Client {
        &self.http
    }

    /// Form POST to a token endpoint
    pub async fn token_request(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        url: &Url,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse> {
        ctx.run(async {
            let response = self
                .http
                .post(url.clone())
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .header(ACCEPT, "application/json")
                .body(encode_form(params))
                .send()
                .await
                .map_err(|e| Error::transport(operation, e.to_string()))?;

            let response = ensure_success(response, operation).await?;
            response
                .json::<TokenResponse>()
                .await
                .map_err(|e| Error::transport(operation, format!("unparsable response: {e}")))
        })
        .await
    }

    /// Bearer GET returning a JSON object
    pub async fn get_claims(
        &self,
        ctx: &RequestContext,
        operation: &'static str,
        url: &Url,
        access_token: &str,
    ) -> Result<RawClaims> {
        ctx.run(async {
            let response = self
                .http
                .get(url.clone())
                .bearer_auth(access_token)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| Error::transport(operation, e.to_string()))?;

            let response = ensure_success(response, operation).await?;
            parse_object(response, operation).await
        })
        .await
    }

    /// RFC 7662 introspection, authenticated with the client credentials
    pub async fn introspect(
        &self,
        ctx: &RequestContext,
        url: &Url,
        token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<RawClaims> {
        const OPERATION: &str = "token introspection";

        ctx.run(async {
            let response = self
                .http
                .post(url.clone())
                .basic_auth(client_id, Some(client_secret))
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .header(ACCEPT, "application/json")
                .body(encode_form(&[("token", token), ("token_type_hint", "access_token")]))
                .send()
                .await
                .map_err(|e| Error::transport(OPERATION, e.to_string()))?;

            let response = ensure_success(response, OPERATION).await?;
            parse_object(response, OPERATION).await
        })
        .await
    }
}

fn encode_form(params: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}

async fn parse_object(response: reqwest::Response, operation: &'static str) -> Result<RawClaims> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::transport(operation, e.to_string()))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(RawClaims::new(map)),
        Ok(_) => Err(Error::transport(operation, "response is not a JSON object")),
        Err(e) => Err(Error::transport(operation, format!("unparsable response: {e}"))),
    }
}

/// Checks HTTP response status; returns the response on success or an error with details.
async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(Error::status(operation, status, &body))
}
