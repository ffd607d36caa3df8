use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use color_eyre::eyre::{eyre, Result, WrapErr};
use reqwest::header::CACHE_CONTROL;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where raw feed payloads come from.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, cache_bust: i64) -> Result<Value>;
}

pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("calendar-kiosk/", env!("CARGO_PKG_VERSION")))
            .build()
            .wrap_err("failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Fetch for HttpFeed {
    async fn fetch(&self, cache_bust: i64) -> Result<Value> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("_", cache_bust)])
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await
            .wrap_err_with(|| format!("request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(eyre!("HTTP {}", status));
        }
        resp.json::<Value>()
            .await
            .wrap_err("feed body is not valid JSON")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub data: Value,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.timestamp_millis() - self.timestamp;
        age < ttl.as_millis() as i64
    }
}

/// A single JSON file holding the last good payload.
pub struct FeedCache {
    path: PathBuf,
}

impl FeedCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<cache_dir>/calendar-kiosk/<key>.json`
    pub fn in_cache_dir(key: &str) -> Option<Self> {
        dirs::cache_dir().map(|d| Self::new(d.join("calendar-kiosk").join(format!("{key}.json"))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored entry, if one exists and holds a list.
    pub fn read(&self) -> Option<CacheEntry> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) if entry.data.is_array() => Some(entry),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "ignoring unreadable feed cache");
                None
            }
        }
    }

    pub fn write(&self, entry: &CacheEntry) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(entry)?)
            .wrap_err_with(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .wrap_err_with(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// Cached access to the remote feed. Never fails: stale data beats a blank screen.
pub struct Store<F> {
    remote: F,
    cache: FeedCache,
    ttl: Duration,
}

impl<F: Fetch> Store<F> {
    pub fn new(remote: F, cache: FeedCache, ttl: Duration) -> Self {
        Self { remote, cache, ttl }
    }

    pub async fn load(&self, force_refresh: bool) -> Value {
        self.load_at(force_refresh, Utc::now()).await
    }

    pub async fn load_at(&self, force_refresh: bool, now: DateTime<Utc>) -> Value {
        let cached = self.cache.read();
        if !force_refresh {
            if let Some(entry) = cached.as_ref().filter(|e| e.is_fresh(now, self.ttl)) {
                tracing::debug!(timestamp = entry.timestamp, "feed cache hit");
                return entry.data.clone();
            }
        }

        let now_ms = now.timestamp_millis();
        match self.remote.fetch(now_ms).await {
            Ok(data) => {
                let entry = CacheEntry {
                    timestamp: now_ms,
                    data,
                };
                if let Err(err) = self.cache.write(&entry) {
                    tracing::warn!("failed to persist feed cache: {err:#}");
                }
                entry.data
            }
            Err(err) => match cached {
                Some(entry) => {
                    tracing::warn!(
                        cached_at = entry.timestamp,
                        "feed fetch failed, using cached copy: {err:#}"
                    );
                    entry.data
                }
                None => {
                    tracing::warn!("feed fetch failed and nothing is cached: {err:#}");
                    Value::Array(Vec::new())
                }
            },
        }
    }
}
