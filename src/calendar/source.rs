use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use super::normalize::{normalize_csv, normalize_feed};
use super::store::{Fetch, HttpFeed, Store};
use super::{filter, Event};

/// Fetch, normalize and narrow to the current month.
pub enum Source<F = HttpFeed> {
    Feed(Store<F>),
    Csv(PathBuf),
}

impl<F: Fetch> Source<F> {
    /// Events for the current month in source order. Never fails.
    pub async fn load_current_month(&self, force_refresh: bool) -> Vec<Event> {
        self.load_month_of(force_refresh, Local::now()).await
    }

    pub async fn load_month_of(&self, force_refresh: bool, now: DateTime<Local>) -> Vec<Event> {
        let normalized = match self {
            Source::Feed(store) => {
                let raw = store.load(force_refresh).await;
                normalize_feed(&raw, now)
            }
            Source::Csv(path) => match fs::read_to_string(path) {
                Ok(text) => normalize_csv(&text, now),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to read events CSV");
                    Vec::new()
                }
            },
        };

        let total = normalized.len();
        let month = filter::in_month(normalized, now);
        tracing::info!(items = total, this_month = month.len(), "loaded events");
        month
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::store::FeedCache;
    use color_eyre::eyre::{eyre, Result};
    use serde_json::{json, Value};
    use std::time::Duration;

    struct Offline;

    impl Fetch for Offline {
        async fn fetch(&self, _cache_bust: i64) -> Result<Value> {
            Err(eyre!("connection refused"))
        }
    }

    struct Canned(Value);

    impl Fetch for Canned {
        async fn fetch(&self, _cache_bust: i64) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn offline_without_cache_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::Feed(Store::new(
            Offline,
            FeedCache::new(dir.path().join("feed.json")),
            Duration::from_secs(3600),
        ));
        assert!(source.load_current_month(false).await.is_empty());
    }

    #[tokio::test]
    async fn feed_is_narrowed_to_this_month() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let this_month = now.format("%Y-%m-01T12:00:00").to_string();
        let source = Source::Feed(Store::new(
            Canned(json!([
                { "title": "Now", "start": this_month },
                { "title": "Ancient", "start": "1999-01-05T12:00:00" }
            ])),
            FeedCache::new(dir.path().join("feed.json")),
            Duration::from_secs(3600),
        ));

        let events = source.load_month_of(true, now).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Now");
    }

    #[tokio::test]
    async fn csv_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        fs::write(&path, "Day,Title,Type\n5,Career Fair,event\n12,Winter Break,holiday\n").unwrap();

        let source: Source = Source::Csv(path);
        let events = source.load_current_month(false).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Career Fair");
    }

    #[tokio::test]
    async fn missing_csv_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source: Source = Source::Csv(dir.path().join("nope.csv"));
        assert!(source.load_current_month(true).await.is_empty());
    }
}
