//! Remote flow provider - authenticated reverse lookups over HTTP
//!
//! The provider exposes two endpoints: a credential exchange returning a
//! bearer token with a declared TTL, and a reverse lookup returning the
//! pedestrian flow and socio-economic profile for a coordinate.

use crate::domain::geo::Coordinate;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Grant returned by the provider's authentication endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionGrant {
    pub token: String,
    pub ttl_seconds: u64,
}

/// Socio-economic payload from a reverse lookup. Any field may be absent
/// for thin coverage areas.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowPayload {
    pub flow: Option<i64>,
    pub income: Option<f64>,
    pub social_class: Option<String>,
}

/// Outcome of a reverse lookup that reached the provider.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    /// HTTP 200 with a usable payload.
    Data(FlowPayload),
    /// HTTP 204 - the provider explicitly has no data for this coordinate.
    NoData,
    /// HTTP 401 - the session token was rejected.
    Unauthorized,
}

/// Transport or protocol failure talking to the provider.
#[derive(Debug)]
pub enum ProviderError {
    Http(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(msg) => write!(f, "http error: {}", msg),
            Self::Status(code) => write!(f, "unexpected status: {}", code),
            Self::Decode(msg) => write!(f, "invalid payload: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Seam for the remote provider so tests can inject fakes.
#[async_trait]
pub trait FlowProvider: Send + Sync {
    /// Exchange credentials for a bearer token.
    async fn authenticate(&self) -> Result<SessionGrant, ProviderError>;

    /// Reverse-lookup flow data for a coordinate.
    async fn reverse_lookup(
        &self,
        coord: &Coordinate,
        token: &str,
    ) -> Result<LookupOutcome, ProviderError>;
}

/// HTTP implementation backed by a pooled reqwest client.
pub struct HttpFlowProvider {
    base_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

impl HttpFlowProvider {
    pub fn new(
        base_url: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        // One client for the process, reused for connection pooling
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            client,
        })
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
    }
}

#[async_trait]
impl FlowProvider for HttpFlowProvider {
    async fn authenticate(&self) -> Result<SessionGrant, ProviderError> {
        let url = format!("{}/auth/token", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.basic_auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let grant: SessionGrant =
            response.json().await.map_err(|e| ProviderError::Decode(e.to_string()))?;

        debug!(ttl_seconds = grant.ttl_seconds, "provider_token_issued");
        Ok(grant)
    }

    async fn reverse_lookup(
        &self,
        coord: &Coordinate,
        token: &str,
    ) -> Result<LookupOutcome, ProviderError> {
        let url = format!(
            "{}/flows/reverse?lat={:.6}&lng={:.6}",
            self.base_url, coord.latitude, coord.longitude
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let payload: FlowPayload =
                    response.json().await.map_err(|e| ProviderError::Decode(e.to_string()))?;
                Ok(LookupOutcome::Data(payload))
            }
            204 => Ok(LookupOutcome::NoData),
            401 => Ok(LookupOutcome::Unauthorized),
            code => Err(ProviderError::Status(code)),
        }
    }
}
