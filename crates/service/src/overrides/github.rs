//! Versioned-file strategy: the GitHub repository contents API.
//!
//! Every read returns the file's revision sha alongside its content; a write
//! that presents a stale sha is rejected by the backend, which is what gives
//! this strategy optimistic-concurrency protection. Omitting the sha writes
//! unconditionally. The loser of a race must re-read and retry; this proxy
//! never retries on its own.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::errors::ServiceError;
use crate::overrides::{now_millis, stamped_document, upstream_detail, OverrideStore, StoredDocument, WriteReceipt};

const READ_TIMEOUT: Duration = Duration::from_secs(8);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const COMMIT_MESSAGE: &str = "sync: update user overrides";

pub struct GithubOverrideStore {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    path: String,
    branch: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    /// Base64 of the file bytes, wrapped with newlines by the API.
    content: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

impl GithubOverrideStore {
    pub fn new(client: reqwest::Client, cfg: configs::GithubConfig) -> Self {
        Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            owner: cfg.owner,
            repo: cfg.repo,
            path: cfg.path,
            branch: cfg.branch,
            token: cfg.token,
        }
    }

    fn token(&self) -> Result<&str, ServiceError> {
        self.token
            .as_deref()
            .ok_or_else(|| ServiceError::misconfigured("GITHUB_TOKEN"))
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.owner, self.repo, self.path
        )
    }

    fn decode_document(raw: &str) -> Result<Value, ServiceError> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(compact)
            .map_err(|e| ServiceError::Unreachable(format!("invalid base64 content: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Unreachable(format!("invalid document json: {e}")))
    }
}

#[async_trait::async_trait]
impl OverrideStore for GithubOverrideStore {
    async fn read(&self) -> Result<StoredDocument, ServiceError> {
        let token = self.token()?;

        let mut req = self
            .client
            .get(self.contents_url())
            .bearer_auth(token)
            .header("accept", "application/vnd.github+json")
            .timeout(READ_TIMEOUT);
        if let Some(branch) = &self.branch {
            req = req.query(&[("ref", branch.as_str())]);
        }
        let resp = req.send().await?;

        match resp.status().as_u16() {
            404 => Err(ServiceError::NotFound),
            s if !resp.status().is_success() => {
                Err(ServiceError::Upstream { status: s, detail: upstream_detail(resp).await })
            }
            _ => {
                let body: ContentsResponse = resp
                    .json()
                    .await
                    .map_err(|e| ServiceError::Unreachable(format!("invalid contents response: {e}")))?;
                let content = Self::decode_document(&body.content)?;
                debug!(sha = %body.sha, "override file read");
                Ok(StoredDocument { content, sha: Some(body.sha) })
            }
        }
    }

    async fn write(
        &self,
        fragment: Map<String, Value>,
        sha: Option<String>,
    ) -> Result<WriteReceipt, ServiceError> {
        let token = self.token()?;
        let ts = now_millis();
        let payload = stamped_document(fragment, ts);
        let pretty = serde_json::to_string_pretty(&payload)
            .map_err(|e| ServiceError::Unreachable(format!("encode failed: {e}")))?;

        let mut body = json!({
            "message": COMMIT_MESSAGE,
            "content": BASE64.encode(pretty),
        });
        // The backend compares this against its current revision and rejects
        // the write on mismatch. No sha means unconditional write.
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        if let Some(branch) = &self.branch {
            body["branch"] = json!(branch);
        }

        let resp = self
            .client
            .put(self.contents_url())
            .bearer_auth(token)
            .header("accept", "application/vnd.github+json")
            .timeout(WRITE_TIMEOUT)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(ServiceError::Upstream { status, detail: upstream_detail(resp).await });
        }

        let ack: PutResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::Unreachable(format!("invalid commit response: {e}")))?;
        debug!(ts, sha = %ack.content.sha, "override file committed");

        Ok(WriteReceipt { ts, sha: Some(ack.content.sha) })
    }
}
