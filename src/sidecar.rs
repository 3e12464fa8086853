//! Pass-through client for a Substrate API sidecar

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::{LedgerError, Result};

pub const DEFAULT_RANGE_START: u64 = 0;
pub const DEFAULT_RANGE_END: u64 = 10;

#[derive(Debug, Clone)]
pub struct SidecarClient {
    client: Client,
    base_url: String,
}

impl SidecarClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn range_url(&self, from: u64, to: u64) -> String {
        format!("{}/blocks/?range={}-{}", self.base_url, from, to)
    }

    /// Blocks `from..=to` exactly as the sidecar returns them.
    pub async fn fetch_block_range(&self, from: u64, to: u64) -> Result<Value> {
        let url = self.range_url(from, to);
        tracing::debug!(%url, "Fetching block range from sidecar");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::RpcError {
                code: i64::from(status.as_u16()),
                message: format!("sidecar returned {}", status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::DecodeError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_url() {
        let sidecar = SidecarClient::new("http://localhost:8080/").unwrap();
        assert_eq!(sidecar.base_url(), "http://localhost:8080");
        assert_eq!(
            sidecar.range_url(DEFAULT_RANGE_START, DEFAULT_RANGE_END),
            "http://localhost:8080/blocks/?range=0-10"
        );
    }

    #[tokio::test]
    async fn test_unreachable_sidecar() {
        let sidecar = SidecarClient::new("http://127.0.0.1:1").unwrap();
        let err = sidecar.fetch_block_range(0, 1).await.unwrap_err();
        assert!(err.is_connection());
    }
}
