//! Client for the ATP Explorer: an untrusted indexer used only to enumerate
//! candidate supersession-chain entries. `atp-verifier` re-verifies every
//! claim this client returns against the node directly, nothing here is
//! trusted on its own.

use serde::Deserialize;

use atp_core::{EngineError, EngineResult};

#[derive(Clone, Debug, Deserialize)]
pub struct IdentityState {
    pub genesis_fingerprint: String,
    pub current_fingerprint: String,
    pub status: String,
    pub chain_depth: u64,
    pub latest_inscription_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChainEntry {
    pub fingerprint: String,
    pub txid: String,
    pub block_height: u64,
    pub block_index: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChainRecord {
    pub entries: Vec<ChainEntry>,
    pub revocation_txid: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DocumentRecord {
    pub txid: String,
    pub content_type: String,
    pub body_base64url: String,
    pub block_height: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IndexerInfo {
    pub version: String,
    pub chain_tip_height: u64,
    pub policy: serde_json::Value,
}

/// HTTP client for a single Explorer instance.
pub struct ExplorerClient {
    base_url: String,
    client: reqwest::Client,
}

impl ExplorerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> EngineResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::ExplorerUnavailable(format!("connecting to {url}: {e}")))?;

        let status = resp.status();
        if status.is_client_error() {
            return if status.as_u16() == 404 {
                Err(EngineError::ExplorerNotFound(url))
            } else {
                Err(EngineError::ExplorerClient(format!("{status} from {url}")))
            };
        }
        if status.is_server_error() {
            return Err(EngineError::ExplorerUnavailable(format!("{status} from {url}")));
        }

        resp.json()
            .await
            .map_err(|e| EngineError::ExplorerClient(format!("parsing response from {url}: {e}")))
    }

    /// `GET /identity/{fp}`
    pub async fn identity_state(&self, fingerprint: &str) -> EngineResult<IdentityState> {
        self.get(&format!("/identity/{fingerprint}")).await
    }

    /// `GET /identity/{fp}/chain`
    pub async fn identity_chain(&self, fingerprint: &str) -> EngineResult<ChainRecord> {
        self.get(&format!("/identity/{fingerprint}/chain")).await
    }

    /// `GET /document/{txid}`
    pub async fn document(&self, txid: &str) -> EngineResult<DocumentRecord> {
        self.get(&format!("/document/{txid}")).await
    }

    /// `GET /info`
    pub async fn info(&self) -> EngineResult<IndexerInfo> {
        self.get("/info").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_joins_base_url_and_path() {
        let client = ExplorerClient::new("https://explorer.example");
        assert_eq!(client.base_url, "https://explorer.example");
    }
}
