//! Content-store strategy: a Vercel-Blob-shaped object store.
//!
//! Objects live at a fixed pathname and writes always replace the whole
//! object, so there is no revision token and no conflict detection: the last
//! writer silently wins. Reads go through a list call (the store's lookup by
//! prefix) followed by a download of the returned URL.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ServiceError;
use crate::overrides::{now_millis, stamped_document, upstream_detail, OverrideStore, StoredDocument, WriteReceipt};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct BlobOverrideStore {
    client: reqwest::Client,
    store_url: String,
    pathname: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    blobs: Vec<ListedBlob>,
}

#[derive(Debug, Deserialize)]
struct ListedBlob {
    #[serde(rename = "downloadUrl")]
    download_url: String,
}

impl BlobOverrideStore {
    pub fn new(client: reqwest::Client, cfg: configs::BlobConfig) -> Self {
        Self {
            client,
            store_url: cfg.store_url.trim_end_matches('/').to_string(),
            pathname: cfg.pathname,
            token: cfg.token,
        }
    }

    fn token(&self) -> Result<&str, ServiceError> {
        self.token
            .as_deref()
            .ok_or_else(|| ServiceError::misconfigured("BLOB_READ_WRITE_TOKEN"))
    }
}

#[async_trait::async_trait]
impl OverrideStore for BlobOverrideStore {
    async fn read(&self) -> Result<StoredDocument, ServiceError> {
        let token = self.token()?;

        let resp = self
            .client
            .get(format!("{}/", self.store_url))
            .query(&[("prefix", self.pathname.as_str()), ("limit", "1")])
            .bearer_auth(token)
            .timeout(READ_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(ServiceError::Upstream { status, detail: upstream_detail(resp).await });
        }
        let listing: ListResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::Unreachable(format!("invalid list response: {e}")))?;
        let Some(blob) = listing.blobs.into_iter().next() else {
            return Err(ServiceError::NotFound);
        };

        debug!(url = %blob.download_url, "downloading override blob");
        let resp = self
            .client
            .get(&blob.download_url)
            .timeout(READ_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(ServiceError::Upstream {
                status,
                detail: Some(format!("blob fetch {status}")),
            });
        }
        let content: Value = resp
            .json()
            .await
            .map_err(|e| ServiceError::Unreachable(format!("invalid blob content: {e}")))?;

        Ok(StoredDocument { content, sha: None })
    }

    async fn write(
        &self,
        fragment: Map<String, Value>,
        _sha: Option<String>,
    ) -> Result<WriteReceipt, ServiceError> {
        let token = self.token()?;
        let ts = now_millis();
        let payload = stamped_document(fragment, ts);

        // Full replace at a fixed pathname; the store has no compare-and-swap,
        // so a supplied revision token is ignored.
        let resp = self
            .client
            .put(format!("{}/{}", self.store_url, self.pathname))
            .bearer_auth(token)
            .header("x-api-version", "7")
            .header("x-content-type", "application/json")
            .header("x-add-random-suffix", "0")
            .body(payload.to_string())
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(ServiceError::Upstream { status, detail: upstream_detail(resp).await });
        }
        debug!(ts, "override blob replaced");

        Ok(WriteReceipt { ts, sha: None })
    }
}
