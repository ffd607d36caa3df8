use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;

use crate::calendar::{FeedCache, HttpFeed, Source, Store};
use crate::scheduler::Timings;
use crate::theme::ThemeConfig;

const DEFAULT_FEED_URL: &str =
    "https://news.csun.edu/wp-json/csunfeeds/v1/events-feed/career-center";
const DEFAULT_PAGE_URL: &str = "https://news.csun.edu/";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub timings: TimingsConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Feed { url: String },
    Csv { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Feed {
            url: DEFAULT_FEED_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub key: String,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: "events_feed_cache_v1".to_string(),
            ttl_secs: 60 * 60,
        }
    }
}

/// All durations in milliseconds except the refresh period.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingsConfig {
    pub loader_ms: u64,
    pub calendar_pause_ms: u64,
    pub card_dwell_ms: u64,
    pub between_events_ms: u64,
    pub pulse_lead_ms: u64,
    pub card_fade_ms: u64,
    pub frame_ms: u64,
    pub refresh_secs: u64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            loader_ms: 2_000,
            calendar_pause_ms: 20_000,
            card_dwell_ms: 15_000,
            between_events_ms: 1_200,
            pulse_lead_ms: 500,
            card_fade_ms: 600,
            frame_ms: 100,
            refresh_secs: 60 * 60,
        }
    }
}

impl TimingsConfig {
    pub fn scheduler(&self) -> Timings {
        Timings {
            calendar_pause: Duration::from_millis(self.calendar_pause_ms),
            card_dwell: Duration::from_millis(self.card_dwell_ms),
            between_events: Duration::from_millis(self.between_events_ms),
            pulse_lead: Duration::from_millis(self.pulse_lead_ms),
            refresh_every: Duration::from_secs(self.refresh_secs.max(1)),
        }
    }

    pub fn loader(&self) -> Duration {
        Duration::from_millis(self.loader_ms)
    }

    pub fn card_fade(&self) -> Duration {
        Duration::from_millis(self.card_fade_ms)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(10))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Shown after the month name, e.g. "November Events".
    pub heading: String,
    pub org_name: String,
    /// Encoded on cards whose event has no link.
    pub page_url: String,
    pub theme: ThemeConfig,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            heading: "Events".to_string(),
            org_name: "Career Center".to_string(),
            page_url: DEFAULT_PAGE_URL.to_string(),
            theme: ThemeConfig::default(),
        }
    }
}

impl KioskConfig {
    /// `<config_dir>/calendar-kiosk/config.toml`
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("calendar-kiosk").join("config.toml"))
    }

    /// Load overrides from the config file. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).wrap_err_with(|| format!("invalid config in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn source(&self) -> Result<Source> {
        match &self.source {
            SourceConfig::Feed { url } => {
                let cache = FeedCache::in_cache_dir(&self.cache.key).unwrap_or_else(|| {
                    FeedCache::new(std::env::temp_dir().join(format!("{}.json", self.cache.key)))
                });
                tracing::debug!(path = %cache.path().display(), "feed cache location");
                Ok(Source::Feed(Store::new(
                    HttpFeed::new(url.clone())?,
                    cache,
                    Duration::from_secs(self.cache.ttl_secs),
                )))
            }
            SourceConfig::Csv { path } => Ok(Source::Csv(path.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        let config = KioskConfig::from_toml("").unwrap();
        assert_eq!(config.source, SourceConfig::default());
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.timings.scheduler(), Timings::default());
        assert_eq!(config.display.heading, "Events");
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = KioskConfig::from_toml(
            r#"
            [source]
            kind = "csv"
            path = "/srv/kiosk/events.csv"

            [timings]
            card_dwell_ms = 8000

            [display]
            org_name = "Student Affairs"

            [display.theme]
            preset = "high-contrast"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.source,
            SourceConfig::Csv {
                path: PathBuf::from("/srv/kiosk/events.csv")
            }
        );
        let timings = config.timings.scheduler();
        assert_eq!(timings.card_dwell, Duration::from_secs(8));
        assert_eq!(timings.calendar_pause, Duration::from_secs(20));
        assert_eq!(config.display.org_name, "Student Affairs");
        assert_eq!(config.display.theme.preset.as_deref(), Some("high-contrast"));
        assert!(matches!(config.source().unwrap(), Source::Csv(_)));
    }

    #[test]
    fn unknown_source_kind_is_an_error() {
        assert!(KioskConfig::from_toml("[source]\nkind = \"ftp\"\n").is_err());
    }
}
