//! Pass-through client for the third-party trading API.
//!
//! Nothing here interprets broker payloads: requests are forwarded as given
//! and the upstream status, content type and body come back untouched.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BrokerConfig;
use crate::error::ProxyError;

/// Upstream reply, relayed verbatim to the caller.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct BrokerClient {
    client: reqwest::Client,
    config: BrokerConfig,
}

impl BrokerClient {
    pub fn new(config: BrokerConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.config.api_key {
            match HeaderValue::from_str(key) {
                Ok(value) => {
                    headers.insert("X-API-Code", value);
                }
                Err(_) => warn!("BROKER_API_KEY is not a valid header value; not sent"),
            }
        }
        headers
    }

    /// Forward a credential exchange body to the token endpoint.
    pub async fn exchange_token(&self, body: &Value) -> Result<UpstreamResponse, ProxyError> {
        let url = self.url(&self.config.token_path);
        debug!(%url, "forwarding token exchange");

        let mut headers = self.headers();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self.client.post(&url).headers(headers).json(body).send().await?;
        relay(resp).await
    }

    /// Fetch the portfolio on behalf of the caller's bearer credentials.
    pub async fn fetch_portfolio(
        &self,
        authorization: Option<&HeaderValue>,
        query: Option<&str>,
    ) -> Result<UpstreamResponse, ProxyError> {
        let mut url = self.url(&self.config.portfolio_path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        debug!(%url, "forwarding portfolio fetch");

        let mut headers = self.headers();
        if let Some(auth) = authorization {
            headers.insert(AUTHORIZATION, auth.clone());
        }

        let resp = self.client.get(&url).headers(headers).send().await?;
        relay(resp).await
    }
}

async fn relay(resp: reqwest::Response) -> Result<UpstreamResponse, ProxyError> {
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = resp.bytes().await?.to_vec();

    let upstream = UpstreamResponse {
        status: status.as_u16(),
        content_type,
        body,
    };
    if !upstream.is_success() {
        warn!(status = upstream.status, "broker returned an error; relaying");
    }
    Ok(upstream)
}
