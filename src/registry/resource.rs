use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Font,
    Icon,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Font => "fonts",
            ResourceKind::Icon => "icons",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSource {
    File(PathBuf),
    Url(String),
}

impl ResourceSource {
    /// `http://` and `https://` sources are fetched; anything else is a path.
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            ResourceSource::Url(source.to_string())
        } else {
            ResourceSource::File(PathBuf::from(source))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// Same name and source as an earlier registration.
    Unchanged,
    /// The name was taken by a different source, which stays in effect.
    Conflict,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{kind} resource '{name}' is not registered")]
    NotRegistered { kind: &'static str, name: String },

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ResourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        let fetch_error = |reason: String| ResourceError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        Ok(body.to_vec())
    }
}

struct Entry {
    source: ResourceSource,
    data: OnceCell<Arc<[u8]>>,
}

/// Named fonts or icons, loaded lazily and cached in memory.
///
/// Concurrent `resolve` calls for one name share a single load.
pub struct ResourceRegistry {
    kind: ResourceKind,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
    fetcher: Arc<dyn ResourceFetcher>,
    cache_dir: Option<PathBuf>,
}

impl ResourceRegistry {
    pub fn new(kind: ResourceKind, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
            fetcher,
            cache_dir: None,
        }
    }

    /// Remote resources are also written under `dir/<kind>/`.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn register(&self, name: impl Into<String>, source: ResourceSource) -> Registration {
        let name = name.into();
        let mut entries = self.entries.lock();
        match entries.get(&name) {
            Some(existing) if existing.source == source => Registration::Unchanged,
            Some(existing) => {
                tracing::warn!(
                    kind = self.kind.as_str(),
                    name = %name,
                    kept = ?existing.source,
                    ignored = ?source,
                    "Resource name already registered with another source"
                );
                Registration::Conflict
            }
            None => {
                tracing::debug!(kind = self.kind.as_str(), name = %name, source = ?source, "Registered resource");
                entries.insert(
                    name,
                    Arc::new(Entry {
                        source,
                        data: OnceCell::new(),
                    }),
                );
                Registration::Added
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    pub fn source(&self, name: &str) -> Option<ResourceSource> {
        self.entries.lock().get(name).map(|entry| entry.source.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Bytes of the resource registered as `name`, loading them on first use.
    /// A failed load is not cached; the next call retries.
    pub async fn resolve(&self, name: &str) -> Result<Arc<[u8]>, ResourceError> {
        let entry = self
            .entries
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::NotRegistered {
                kind: self.kind.as_str(),
                name: name.to_string(),
            })?;

        let data = entry
            .data
            .get_or_try_init(|| self.load(name, &entry.source))
            .await?;
        Ok(Arc::clone(data))
    }

    async fn load(&self, name: &str, source: &ResourceSource) -> Result<Arc<[u8]>, ResourceError> {
        match source {
            ResourceSource::File(path) => read_file(path).await,
            ResourceSource::Url(url) => {
                let cached = self.cache_path(name, url);
                if let Some(path) = &cached {
                    if let Ok(bytes) = tokio::fs::read(path).await {
                        tracing::debug!(name = %name, path = %path.display(), "Resource served from disk cache");
                        return Ok(bytes.into());
                    }
                }

                let bytes = self.fetcher.fetch(url).await?;
                tracing::info!(kind = self.kind.as_str(), name = %name, bytes = bytes.len(), "Fetched resource");

                if let Some(path) = &cached {
                    if let Err(err) = write_cache(path, &bytes).await {
                        tracing::warn!(path = %path.display(), error = %err, "Failed to write resource cache");
                    }
                }
                Ok(bytes.into())
            }
        }
    }

    /// `dir/<kind>/<name>-<digest>`, where the digest covers both the exact
    /// name and the URL: a changed URL misses the cache, and names that
    /// sanitize alike never share a file.
    fn cache_path(&self, name: &str, url: &str) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let readable: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(url.as_bytes());
        let digest: String = hasher.finalize()[..8]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();

        Some(dir.join(self.kind.as_str()).join(format!("{readable}-{digest}")))
    }
}

async fn read_file(path: &Path) -> Result<Arc<[u8]>, ResourceError> {
    tokio::fs::read(path)
        .await
        .map(Into::into)
        .map_err(|source| ResourceError::Read {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_cache(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
