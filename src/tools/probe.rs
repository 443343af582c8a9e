//! Network reachability probing for registry URLs.

use crate::errors::ToolError;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides whether a URL answers at all. Any HTTP response, including error
/// statuses, counts as reachable; connection failures and timeouts do not.
#[derive(Debug, Clone)]
pub struct Probe {
    client: reqwest::Client,
}

impl Probe {
    pub fn new(timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(ToolError::Http)?;
        Ok(Self { client })
    }

    pub async fn is_reachable(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                debug!(%url, status = %response.status(), "registry answered");
                true
            }
            Err(error) => {
                debug!(%url, %error, "registry unreachable");
                false
            }
        }
    }
}
