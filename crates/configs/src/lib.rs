use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub quotes: QuotesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Which backend holds the override document. Exactly one strategy is active
/// per deployment; the HTTP contract is identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    #[default]
    Blob,
    Github,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub strategy: SyncStrategy,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "default_blob_store_url")]
    pub store_url: String,
    #[serde(default = "default_blob_pathname")]
    pub pathname: String,
    /// Read-write credential; filled from `BLOB_READ_WRITE_TOKEN` when unset.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            store_url: default_blob_store_url(),
            pathname: default_blob_pathname(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_github_path")]
    pub path: String,
    #[serde(default)]
    pub branch: Option<String>,
    /// Contents-API credential; filled from `GITHUB_TOKEN` when unset.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
            owner: String::new(),
            repo: String::new(),
            path: default_github_path(),
            branch: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotesConfig {
    #[serde(default = "default_quotes_base_url")]
    pub base_url: String,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self { base_url: default_quotes_base_url() }
    }
}

fn default_blob_store_url() -> String { "https://blob.vercel-storage.com".into() }
fn default_blob_pathname() -> String { "user_overrides.json".into() }
fn default_github_api_base() -> String { "https://api.github.com".into() }
fn default_github_path() -> String { "data/user_overrides.json".into() }
fn default_quotes_base_url() -> String { "https://query2.finance.yahoo.com".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default().unwrap_or_default();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.sync.normalize_from_env();
        self.sync.validate()?;
        self.quotes.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl SyncConfig {
    /// Fill credentials from the environment when the TOML omits them.
    /// A credential that is still missing afterwards is not a startup error:
    /// the store reports `Misconfigured` per request instead.
    pub fn normalize_from_env(&mut self) {
        if self.blob.token.is_none() {
            self.blob.token = std::env::var("BLOB_READ_WRITE_TOKEN").ok();
        }
        if self.github.token.is_none() {
            self.github.token = std::env::var("GITHUB_TOKEN").ok();
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.strategy {
            SyncStrategy::Blob => {
                if self.blob.store_url.trim().is_empty() {
                    return Err(anyhow!("sync.blob.store_url must not be empty"));
                }
                if self.blob.pathname.trim().is_empty() {
                    return Err(anyhow!("sync.blob.pathname must not be empty"));
                }
            }
            SyncStrategy::Github => {
                if self.github.api_base.trim().is_empty() {
                    return Err(anyhow!("sync.github.api_base must not be empty"));
                }
                if self.github.owner.trim().is_empty() || self.github.repo.trim().is_empty() {
                    return Err(anyhow!(
                        "sync.github.owner and sync.github.repo are required for the github strategy"
                    ));
                }
                if self.github.path.trim().is_empty() {
                    return Err(anyhow!("sync.github.path must not be empty"));
                }
            }
        }
        Ok(())
    }
}

impl QuotesConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("quotes.base_url must not be empty"));
        }
        Ok(())
    }
}
