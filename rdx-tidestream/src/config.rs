//! Defines all configuration structures for the Tidestream pipelines.
//!
//! These structs are deserialized with `serde`, so the intervals, thresholds
//! and strategy choices of the derived pipelines can live in a TOML file or in
//! the environment instead of in application code. Every field has a default;
//! an empty source yields `TidestreamConfig::default()`.

use crate::operators::DedupRetention;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// The top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TidestreamConfig {
    /// Settings for the sampled "recent activity" view.
    pub recent: RecentConfig,
    /// Settings for the posts-per-minute rate.
    pub rate: RateConfig,
    /// Thresholds for the interesting-post filter.
    pub interesting: InterestThresholds,
    /// Settings for trending-tag detection.
    pub trending: TrendingConfig,
}

impl TidestreamConfig {
    /// Loads the configuration in layers: built-in defaults, then the TOML
    /// file at `path` (if given), then `TIDESTREAM__<SECTION>__<FIELD>`
    /// environment variables, e.g. `TIDESTREAM__RATE__STRATEGY=window`.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("TIDESTREAM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Settings for `recent_activity`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecentConfig {
    pub sample_interval_ms: u64,
}

impl RecentConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

impl Default for RecentConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 5_000,
        }
    }
}

/// How the per-minute rate is computed. Both produce identical output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateStrategy {
    /// Buffer each interval's posts and take the batch length. Simple, but
    /// holds every post of the interval in memory.
    #[default]
    Buffer,
    /// Count each tumbling window as it streams by. Retains no posts.
    Window,
}

/// Settings for `posts_per_minute`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub window_ms: u64,
    pub strategy: RateStrategy,
}

impl RateConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            strategy: RateStrategy::default(),
        }
    }
}

/// A post is interesting when any one count is strictly above its threshold.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterestThresholds {
    pub min_followers: u64,
    pub min_favorites: u64,
    pub min_reposts: u64,
    /// Caps the ids remembered for deduplication. Unbounded when absent.
    pub dedup_capacity: Option<usize>,
}

impl InterestThresholds {
    pub fn dedup_retention(&self) -> DedupRetention {
        match self.dedup_capacity {
            Some(capacity) => DedupRetention::Bounded { capacity },
            None => DedupRetention::Unbounded,
        }
    }
}

impl Default for InterestThresholds {
    fn default() -> Self {
        Self {
            min_followers: 100_000,
            min_favorites: 100,
            min_reposts: 100,
            dedup_capacity: None,
        }
    }
}

/// Settings for `trending_tags`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendingConfig {
    pub window_ms: u64,
    /// A tag trends when its count in one window is strictly greater.
    pub min_count: usize,
}

impl TrendingConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            min_count: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_feed_exercise() {
        let config = TidestreamConfig::default();
        assert_eq!(config.recent.sample_interval(), Duration::from_secs(5));
        assert_eq!(config.rate.window(), Duration::from_secs(60));
        assert_eq!(config.rate.strategy, RateStrategy::Buffer);
        assert_eq!(config.interesting.min_followers, 100_000);
        assert_eq!(config.interesting.dedup_retention(), DedupRetention::Unbounded);
        assert_eq!(config.trending.min_count, 5);
    }

    #[test]
    fn file_values_override_defaults() {
        let path = std::env::temp_dir().join(format!("tidestream-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[rate]\nstrategy = \"window\"\n\n[interesting]\ndedup_capacity = 1000\n\n[trending]\nmin_count = 10"
        )
        .unwrap();

        let config = TidestreamConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.rate.strategy, RateStrategy::Window);
        assert_eq!(config.rate.window_ms, 60_000);
        assert_eq!(
            config.interesting.dedup_retention(),
            DedupRetention::Bounded { capacity: 1000 }
        );
        assert_eq!(config.trending.min_count, 10);
        assert_eq!(config.recent.sample_interval_ms, 5_000);
    }
}
