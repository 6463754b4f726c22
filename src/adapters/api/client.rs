//! Status Client - HTTP Implementation of the StatusFetch Port
//!
//! Used by out-of-process pollers (storefront backend, CLI tooling) to
//! read a request's status from the bot-trading API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use uuid::Uuid;

use super::types::{ErrorBody, StatusBody};
use crate::domain::request::StatusView;
use crate::domain::status::FlowKind;
use crate::ports::status::StatusFetch;

/// HTTP client for the orchestrator's status endpoints.
pub struct StatusClient {
    /// Underlying HTTP client.
    http: Client,
    /// Orchestrator base URL, e.g. `http://orchestrator:8080`.
    base_url: String,
}

impl StatusClient {
    /// Create a new status client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn status_url(&self, flow: FlowKind, id: Uuid) -> String {
        match flow {
            FlowKind::Trade => format!("{}/bot-trading/trades/{id}", self.base_url),
            FlowKind::Custody => format!("{}/bot-trading/custody/{id}", self.base_url),
        }
    }
}

#[async_trait]
impl StatusFetch for StatusClient {
    async fn fetch(&self, flow: FlowKind, id: Uuid) -> Result<StatusView> {
        let response = self
            .http
            .get(self.status_url(flow, id))
            .send()
            .await
            .context("Status request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_default();
            anyhow::bail!("Status fetch failed ({status}): {message}");
        }

        let body: StatusBody = response
            .json()
            .await
            .context("Malformed status response")?;
        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_urls_keep_namespaces_separate() {
        let client =
            StatusClient::new("http://localhost:8080", Duration::from_secs(5)).unwrap();
        let id = Uuid::nil();
        assert!(
            client
                .status_url(FlowKind::Trade, id)
                .ends_with(&format!("/bot-trading/trades/{id}"))
        );
        assert!(
            client
                .status_url(FlowKind::Custody, id)
                .ends_with(&format!("/bot-trading/custody/{id}"))
        );
    }
}
