//! The override document and the storage strategies that persist it.
//!
//! A deployment holds exactly one JSON document of user customization
//! key/value pairs. The server stamps each write with a `_meta.ts`
//! millisecond timestamp; clients can never forge it. Two backends implement
//! the same contract: a blob store with last-write-wins semantics and a
//! versioned-file host with compare-and-swap on a revision sha.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::ServiceError;

pub mod blob;
pub mod github;

pub use blob::BlobOverrideStore;
pub use github::GithubOverrideStore;

/// Reserved metadata key inside the stored document.
pub const META_KEY: &str = "_meta";

/// A document as returned by a read: its JSON content plus, for backends that
/// version content, the opaque revision token identifying the exact bytes read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub content: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Acknowledgement of a successful write: the server-assigned timestamp and,
/// where the backend versions content, the revision token of the new state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Storage strategy for the single override document. One implementation is
/// selected at boot; handlers stay agnostic of which backend is behind it.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// Fetch the current document. `Err(NotFound)` before the first write.
    async fn read(&self) -> Result<StoredDocument, ServiceError>;

    /// Replace the document with `fragment` plus a fresh `_meta` stamp.
    /// `sha` is honored only by backends with revision tokens: supplying a
    /// stale one makes the backend reject the write; omitting it writes
    /// unconditionally.
    async fn write(
        &self,
        fragment: Map<String, Value>,
        sha: Option<String>,
    ) -> Result<WriteReceipt, ServiceError>;
}

/// Validate the caller-supplied override fragment: it must be a non-empty
/// JSON object. Runs before any backend call.
pub fn validate_fragment(overrides: Option<Value>) -> Result<Map<String, Value>, ServiceError> {
    match overrides {
        Some(Value::Object(map)) if !map.is_empty() => Ok(map),
        Some(Value::Object(_)) => Err(ServiceError::ClientInput("overrides must not be empty".into())),
        Some(_) => Err(ServiceError::ClientInput("overrides must be a JSON object".into())),
        None => Err(ServiceError::ClientInput("overrides required".into())),
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Build the document to persist: the fragment with `_meta.ts` stamped on
/// top. Inserted last so a client-supplied `_meta` key can never survive.
pub(crate) fn stamped_document(mut fragment: Map<String, Value>, ts: i64) -> Value {
    fragment.insert(META_KEY.to_string(), json!({ "ts": ts }));
    Value::Object(fragment)
}

/// Best-effort extraction of a human-readable diagnostic from an upstream
/// error body (`message` field when JSON, raw text otherwise).
pub(crate) async fn upstream_detail(resp: reqwest::Response) -> Option<String> {
    let text = resp.text().await.ok()?;
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(body) => body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(Some(text)),
        Err(_) => Some(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_must_be_present() {
        let err = validate_fragment(None).unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn fragment_must_be_non_empty_object() {
        assert!(validate_fragment(Some(json!({}))).is_err());
        assert!(validate_fragment(Some(json!([1, 2]))).is_err());
        assert!(validate_fragment(Some(json!("theme"))).is_err());
        let map = validate_fragment(Some(json!({ "theme": "dark" }))).unwrap();
        assert_eq!(map.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn stamp_overwrites_client_meta() {
        let fragment = validate_fragment(Some(json!({
            "theme": "dark",
            "_meta": { "ts": 1 }
        })))
        .unwrap();
        let doc = stamped_document(fragment, 42);
        assert_eq!(doc[META_KEY]["ts"], json!(42));
        assert_eq!(doc["theme"], json!("dark"));
    }

    #[test]
    fn stamp_keeps_all_fragment_keys() {
        let fragment = validate_fragment(Some(json!({
            "theme": "light",
            "watchlist": ["SMH", "QQQ"],
            "layout": { "cols": 3 }
        })))
        .unwrap();
        let doc = stamped_document(fragment, 7);
        let obj = doc.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(doc["watchlist"][1], json!("QQQ"));
    }
}
