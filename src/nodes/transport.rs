//! HTTP transport for node requests

use super::models::NodeFailure;
use crate::error::{HostmonError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Status and body of a completed GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Capability to issue a GET with an optional bearer credential.
///
/// Implementations classify failures as `NodeFailure` values; the caller
/// enforces `timeout` again around the whole call.
#[async_trait]
pub trait HealthTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, NodeFailure>;
}

/// `HealthTransport` backed by a pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("hostmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HostmonError::config(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HealthTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, NodeFailure> {
        let mut request = self.client.get(url).timeout(timeout);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                NodeFailure::Timeout {
                    after_ms: timeout.as_millis() as u64,
                }
            } else {
                NodeFailure::Unreachable {
                    reason: e.to_string(),
                }
            }
        };

        let response = request.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
