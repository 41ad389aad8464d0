//! HTTP gateway client for a content-addressed blob network
//!
//! Uploads go through an API endpoint (`POST <api>/api/v0/add`, multipart),
//! which responds with the assigned content id. Reads go through a read
//! gateway (`GET <gateway>/ipfs/<cid>`) and are bounded by the caller's
//! timeout: a slow or failing gateway resolves to absence, never an error.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{MissiveError, MissiveResult};
use crate::types::ContentId;

use super::ContentStore;

/// Response shape of the add endpoint
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Content store talking to an HTTP blob-network gateway.
#[derive(Debug, Clone)]
pub struct GatewayStore {
    client: reqwest::Client,
    /// Base URL of the write API, e.g. `https://ipfs.example.org`
    api_base: String,
    /// Base URL of the read gateway, e.g. `https://gateway.example.org`
    gateway_base: String,
}

impl GatewayStore {
    /// Create a gateway store from API and gateway base URLs.
    pub fn new(api_base: impl Into<String>, gateway_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: trim_slash(api_base.into()),
            gateway_base: trim_slash(gateway_base.into()),
        }
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[async_trait]
impl ContentStore for GatewayStore {
    async fn put(&self, bytes: Bytes) -> MissiveResult<ContentId> {
        let len = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name("data.json");
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}/api/v0/add", self.api_base);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MissiveError::Write(format!("upload to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(MissiveError::Write(format!(
                "upload to {} failed: {}",
                url,
                response.status()
            )));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| MissiveError::Write(format!("malformed add response: {}", e)))?;

        debug!(cid = %added.hash, len, "Uploaded blob via gateway");
        Ok(ContentId::new(added.hash))
    }

    async fn get(&self, id: &ContentId, timeout: Duration) -> Option<Bytes> {
        let url = format!("{}/ipfs/{}", self.gateway_base, id);

        let fetch = async {
            let response = self.client.get(&url).send().await.ok()?;
            if !response.status().is_success() {
                warn!(cid = %id, status = %response.status(), "Gateway fetch failed");
                return None;
            }
            response.bytes().await.ok()
        };

        match tokio::time::timeout(timeout, fetch).await {
            Ok(result) => result,
            Err(_) => {
                debug!(cid = %id, ?timeout, "Gateway fetch timed out");
                None
            }
        }
    }
}
