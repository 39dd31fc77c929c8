//! Market-data pass-through: forwards chart queries to a public quote-history
//! API the browser cannot reach directly (CORS), spoofing a desktop browser
//! identity. The upstream JSON is returned unmodified.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::Value;
use tracing::debug;

use crate::errors::ServiceError;

const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

pub const DEFAULT_RANGE: &str = "5y";
pub const DEFAULT_INTERVAL: &str = "1mo";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static TICKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9.\-]{1,20}$").unwrap());

/// Validate and canonicalize a ticker symbol: 1-20 chars of alphanumerics,
/// dots and dashes. Runs before any network call.
pub fn validate_ticker(raw: &str) -> Result<String, ServiceError> {
    if TICKER_RE.is_match(raw) {
        Ok(raw.to_ascii_uppercase())
    } else {
        Err(ServiceError::ClientInput("ticker required (e.g. ?ticker=SMH)".into()))
    }
}

#[derive(Clone)]
pub struct QuoteProxy {
    client: reqwest::Client,
    base_url: String,
}

impl QuoteProxy {
    pub fn new(client: reqwest::Client, cfg: configs::QuotesConfig) -> Self {
        Self { client, base_url: cfg.base_url.trim_end_matches('/').to_string() }
    }

    /// Fetch chart history for an already-validated ticker. Non-success
    /// upstream statuses are surfaced as `Upstream` so the handler can
    /// propagate the backend's own status code.
    pub async fn fetch_chart(
        &self,
        ticker: &str,
        range: &str,
        interval: &str,
    ) -> Result<Value, ServiceError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        debug!(%ticker, %range, %interval, "forwarding chart query");

        let resp = self
            .client
            .get(url)
            .query(&[
                ("range", range),
                ("interval", interval),
                ("includeAdjustedClose", "true"),
            ])
            .header("user-agent", BROWSER_USER_AGENT)
            .header("accept", "application/json, text/plain, */*")
            .header("accept-language", "en-US,en;q=0.9")
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(ServiceError::Upstream {
                status,
                detail: Some(format!("quote backend {status}")),
            });
        }

        let data = resp
            .json::<Value>()
            .await
            .map_err(|e| ServiceError::Unreachable(format!("invalid chart payload: {e}")))?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_validation_accepts_common_symbols() {
        assert_eq!(validate_ticker("smh").unwrap(), "SMH");
        assert_eq!(validate_ticker("BRK.B").unwrap(), "BRK.B");
        assert_eq!(validate_ticker("005930.KS").unwrap(), "005930.KS");
        assert_eq!(validate_ticker("BTC-USD").unwrap(), "BTC-USD");
    }

    #[test]
    fn ticker_validation_rejects_junk() {
        assert!(validate_ticker("").is_err());
        assert!(validate_ticker("../etc/passwd").is_err());
        assert!(validate_ticker("A B").is_err());
        assert!(validate_ticker(&"X".repeat(21)).is_err());
    }
}
