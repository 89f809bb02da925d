// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Flowgate Authors
//
// This file is part of Flowgate.
//
// Flowgate is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// Flowgate is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Flowgate. If not, see <https://www.gnu.org/licenses/>.

//! # Flowgate Windowed Metrics
//!
//! ## Purpose
//! Records per-resource telemetry samples into bounded-lifetime series on
//! the shared KeyValue store, evicts samples past a retention horizon, and
//! maintains a per-app ranking of resources by recent traffic-rejection
//! volume.
//!
//! ## Store layout
//! - Series: hash `metrics:<app>:<resource>`, field = sample timestamp
//!   (epoch millis), value = JSON sample, TTL = retention horizon.
//! - Rank: scored set `resources:<app>`, member = resource name, score =
//!   rejection count summed over the ranking window, TTL = retention horizon.
//!
//! ## Eviction and scoring
//! Both happen lazily inside [`MetricsWindow::ingest`]: each write scans the
//! full series, deletes entries older than the retention horizon, and
//! recomputes (overwrites, never accumulates) that resource's rank score
//! from the entries inside the shorter ranking window plus the new sample.
//! A full scan per write is O(window size) and the window is bounded by
//! retention / sampling interval.
//!
//! Two documented consequences:
//! - A resource that stops sending samples keeps its last score until its
//!   keys expire wholesale; scores are not decayed by idle time.
//! - Concurrent ingests for the same (app, resource) race on the
//!   read-modify-write and may lose updates — accepted for best-effort
//!   telemetry, deliberately not locked.

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::Utc;
use flowgate_keyvalue::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

pub mod error;
pub mod model;

pub use error::{MetricsError, MetricsResult};
pub use model::MetricSample;

/// Default maximum age of a sample before it is eligible for eviction.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

/// Default span of the recent sub-window that rank scores are computed over.
pub const DEFAULT_RANKING_WINDOW: Duration = Duration::from_secs(60);

/// Window tuning for the metrics store.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Retention horizon: samples older than this (relative to ingest time)
    /// are evicted, and untouched series expire wholesale after it.
    pub retention: Duration,
    /// Ranking window: the recent span whose rejection counts make up a
    /// resource's rank score. Shorter than the retention horizon.
    pub ranking_window: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            ranking_window: DEFAULT_RANKING_WINDOW,
        }
    }
}

/// Time-windowed metrics store over the shared KeyValue store.
#[derive(Clone)]
pub struct MetricsWindow {
    store: Arc<dyn KeyValueStore>,
    config: MetricsConfig,
}

impl MetricsWindow {
    /// Create a metrics store with default windows (5 min retention, 60 s rank).
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, MetricsConfig::default())
    }

    /// Create a metrics store with explicit window tuning.
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: MetricsConfig) -> Self {
        Self { store, config }
    }

    /// Ingest one sample: evict expired series entries, write the sample,
    /// refresh TTLs, and recompute the resource's rank score.
    ///
    /// The rank score becomes the sum of `block_count` over series entries
    /// inside the ranking window, including this sample when its own
    /// timestamp is recent enough. The previous score is overwritten.
    pub async fn ingest(&self, sample: &MetricSample) -> MetricsResult<()> {
        Self::require_name(&sample.app, "app")?;
        Self::require_name(&sample.resource, "resource")?;
        if sample.timestamp_ms < 0 {
            return Err(MetricsError::InvalidArgument(
                "sample timestamp cannot be negative".to_string(),
            ));
        }

        let now_ms = Utc::now().timestamp_millis();
        let retention_cutoff = now_ms - self.config.retention.as_millis() as i64;
        let rank_cutoff = now_ms - self.config.ranking_window.as_millis() as i64;

        let series_key = Self::series_key(&sample.app, &sample.resource);
        let rank_key = Self::rank_key(&sample.app);

        let entries = self.store.hash_get_all(&series_key).await?;
        let mut expired: Vec<String> = Vec::new();
        let mut score = 0.0f64;
        for (field, value) in &entries {
            let Ok(ts) = field.parse::<i64>() else {
                warn!(series = %series_key, field = %field, "evicting sample with unparsable timestamp field");
                expired.push(field.clone());
                continue;
            };
            if ts < retention_cutoff {
                expired.push(field.clone());
            } else if ts > rank_cutoff {
                match serde_json::from_slice::<MetricSample>(value) {
                    Ok(stored) => score += stored.block_count as f64,
                    Err(e) => {
                        warn!(series = %series_key, field = %field, error = %e, "evicting undecodable sample");
                        expired.push(field.clone());
                    }
                }
            }
        }
        if !expired.is_empty() {
            trace!(series = %series_key, count = expired.len(), "evicting samples past the retention horizon");
            self.store.hash_delete(&series_key, &expired).await?;
        }
        if sample.timestamp_ms > rank_cutoff {
            score += sample.block_count as f64;
        }

        let bytes = serde_json::to_vec(sample)?;
        self.store
            .hash_put(&series_key, &sample.timestamp_ms.to_string(), bytes)
            .await?;
        self.store.expire(&series_key, self.config.retention).await?;

        self.store.sorted_put(&rank_key, &sample.resource, score).await?;
        self.store.expire(&rank_key, self.config.retention).await?;

        Ok(())
    }

    /// Ingest samples one by one. There is no atomicity across the batch: a
    /// failure partway leaves the earlier samples committed (acceptable for
    /// telemetry).
    pub async fn ingest_batch(&self, samples: &[MetricSample]) -> MetricsResult<()> {
        for sample in samples {
            self.ingest(sample).await?;
        }
        Ok(())
    }

    /// All stored samples for (app, resource) with timestamps inside
    /// `[start_ms, end_ms]`, ordered by timestamp.
    ///
    /// A blank app, an absent series or an empty match all yield an empty
    /// vec, never an error.
    pub async fn query(
        &self,
        app: &str,
        resource: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> MetricsResult<Vec<MetricSample>> {
        if app.trim().is_empty() {
            return Ok(Vec::new());
        }
        if start_ms < 0 || end_ms < 0 {
            return Err(MetricsError::InvalidArgument(
                "query timestamps cannot be negative".to_string(),
            ));
        }

        let entries = self.store.hash_get_all(&Self::series_key(app, resource)).await?;
        let mut samples = Vec::new();
        for (field, value) in entries {
            let Ok(ts) = field.parse::<i64>() else {
                continue;
            };
            if ts >= start_ms && ts <= end_ms {
                samples.push(serde_json::from_slice::<MetricSample>(&value)?);
            }
        }
        samples.sort_by_key(|s| s.timestamp_ms);
        Ok(samples)
    }

    /// Resource names for `app`, ordered by descending rank score (most
    /// recent rejections first). Ties are ordered arbitrarily.
    ///
    /// A blank app or an absent index yields an empty vec.
    pub async fn list_hot_resources(&self, app: &str) -> MetricsResult<Vec<String>> {
        if app.trim().is_empty() {
            return Ok(Vec::new());
        }
        let ranked = self.store.sorted_range_desc(&Self::rank_key(app)).await?;
        Ok(ranked.into_iter().map(|(resource, _)| resource).collect())
    }

    /// Store key of the sample series for (app, resource).
    pub fn series_key(app: &str, resource: &str) -> String {
        format!("metrics:{}:{}", app, resource)
    }

    /// Store key of the per-app resource rank.
    pub fn rank_key(app: &str) -> String {
        format!("resources:{}", app)
    }

    fn require_name(value: &str, what: &str) -> MetricsResult<()> {
        if value.trim().is_empty() {
            return Err(MetricsError::InvalidArgument(format!("{} cannot be blank", what)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_keyvalue::InMemoryStore;

    fn window() -> MetricsWindow {
        MetricsWindow::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_blank_names_rejected_on_ingest() {
        let metrics = window();
        let now = Utc::now().timestamp_millis();

        let blank_app = MetricSample::new(" ", "/orders", now);
        assert!(matches!(
            metrics.ingest(&blank_app).await,
            Err(MetricsError::InvalidArgument(_))
        ));

        let blank_resource = MetricSample::new("app-a", "", now);
        assert!(matches!(
            metrics.ingest(&blank_resource).await,
            Err(MetricsError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_negative_timestamps_rejected() {
        let metrics = window();

        let sample = MetricSample::new("app-a", "/orders", -1);
        assert!(matches!(
            metrics.ingest(&sample).await,
            Err(MetricsError::InvalidArgument(_))
        ));

        assert!(matches!(
            metrics.query("app-a", "/orders", -1, 100).await,
            Err(MetricsError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_reads_on_unknown_data_are_empty_not_errors() {
        let metrics = window();

        assert!(metrics.query("", "/orders", 0, i64::MAX).await.unwrap().is_empty());
        assert!(metrics
            .query("no-such-app", "/orders", 0, i64::MAX)
            .await
            .unwrap()
            .is_empty());
        assert!(metrics.list_hot_resources("").await.unwrap().is_empty());
        assert!(metrics.list_hot_resources("no-such-app").await.unwrap().is_empty());
    }
}
