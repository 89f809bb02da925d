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

//! Integration tests for the windowed metrics store: lazy eviction, rank
//! scoring over the ranking window, and the documented staleness behavior.

use chrono::Utc;
use flowgate_keyvalue::{InMemoryStore, KeyValueStore};
use flowgate_metrics::{MetricSample, MetricsConfig, MetricsError, MetricsWindow};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn ingest_then_query_returns_the_sample() {
    let metrics = MetricsWindow::new(Arc::new(InMemoryStore::new()));
    let now = Utc::now().timestamp_millis();

    let sample = MetricSample::new("app-a", "/orders", now)
        .with_pass_count(100)
        .with_block_count(4);
    metrics.ingest(&sample).await.unwrap();

    let results = metrics
        .query("app-a", "/orders", now - 1_000, now + 1_000)
        .await
        .unwrap();
    assert_eq!(results, vec![sample]);
}

#[tokio::test]
async fn query_is_ordered_and_bounded_by_the_time_range() {
    let metrics = MetricsWindow::new(Arc::new(InMemoryStore::new()));
    let now = Utc::now().timestamp_millis();

    // Ingest out of order; query must come back ordered by timestamp.
    for offset in [20_000i64, 5_000, 10_000] {
        let sample = MetricSample::new("app-a", "/orders", now - offset).with_block_count(1);
        metrics.ingest(&sample).await.unwrap();
    }

    let results = metrics
        .query("app-a", "/orders", now - 15_000, now)
        .await
        .unwrap();
    let timestamps: Vec<i64> = results.iter().map(|s| s.timestamp_ms).collect();
    assert_eq!(timestamps, vec![now - 10_000, now - 5_000]);
}

#[tokio::test]
async fn rank_score_sums_rejections_inside_the_ranking_window() {
    let store = Arc::new(InMemoryStore::new());
    let metrics = MetricsWindow::new(store.clone());
    let now = Utc::now().timestamp_millis();

    // Three samples for /hot inside the 60 s ranking window: 5 + 10 + 2.
    for (offset, blocked) in [(30_000i64, 5u64), (20_000, 10), (10_000, 2)] {
        let sample = MetricSample::new("app-a", "/hot", now - offset).with_block_count(blocked);
        metrics.ingest(&sample).await.unwrap();
    }
    // A colder resource with fewer rejections in its own window.
    metrics
        .ingest(&MetricSample::new("app-a", "/cold", now - 5_000).with_block_count(3))
        .await
        .unwrap();
    // A sample outside the ranking window (but inside retention) must not
    // contribute to the score.
    metrics
        .ingest(&MetricSample::new("app-a", "/hot", now - 90_000).with_block_count(50))
        .await
        .unwrap();

    let ranked = store
        .sorted_range_desc(&MetricsWindow::rank_key("app-a"))
        .await
        .unwrap();
    assert_eq!(ranked[0], ("/hot".to_string(), 17.0));
    assert_eq!(ranked[1], ("/cold".to_string(), 3.0));

    let hot = metrics.list_hot_resources("app-a").await.unwrap();
    assert_eq!(hot, vec!["/hot".to_string(), "/cold".to_string()]);
}

#[tokio::test]
async fn hot_resources_come_back_in_non_increasing_score_order() {
    let store = Arc::new(InMemoryStore::new());
    let metrics = MetricsWindow::new(store.clone());
    let now = Utc::now().timestamp_millis();

    for (resource, blocked) in [("/a", 2u64), ("/b", 9), ("/c", 5)] {
        metrics
            .ingest(&MetricSample::new("app-a", resource, now).with_block_count(blocked))
            .await
            .unwrap();
    }

    let ranked = store
        .sorted_range_desc(&MetricsWindow::rank_key("app-a"))
        .await
        .unwrap();
    let scores: Vec<f64> = ranked.iter().map(|(_, s)| *s).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    let hot = metrics.list_hot_resources("app-a").await.unwrap();
    assert_eq!(hot, vec!["/b".to_string(), "/c".to_string(), "/a".to_string()]);
}

#[tokio::test]
async fn samples_past_the_retention_horizon_are_evicted_by_the_next_ingest() {
    let store = Arc::new(InMemoryStore::new());
    let config = MetricsConfig {
        retention: Duration::from_millis(150),
        ranking_window: Duration::from_millis(50),
    };
    let metrics = MetricsWindow::with_config(store, config);

    let t1 = Utc::now().timestamp_millis();
    metrics
        .ingest(&MetricSample::new("app-a", "/orders", t1).with_block_count(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Eviction is lazy: this write triggers it.
    let t2 = Utc::now().timestamp_millis();
    metrics
        .ingest(&MetricSample::new("app-a", "/orders", t2).with_block_count(1))
        .await
        .unwrap();

    let results = metrics.query("app-a", "/orders", 0, i64::MAX).await.unwrap();
    let timestamps: Vec<i64> = results.iter().map(|s| s.timestamp_ms).collect();
    assert_eq!(timestamps, vec![t2], "the first sample aged out of retention");
}

#[tokio::test]
async fn rank_score_is_overwritten_not_accumulated() {
    let store = Arc::new(InMemoryStore::new());
    let config = MetricsConfig {
        retention: Duration::from_secs(10),
        ranking_window: Duration::from_millis(50),
    };
    let metrics = MetricsWindow::with_config(store.clone(), config);

    metrics
        .ingest(&MetricSample::new("app-a", "/orders", Utc::now().timestamp_millis()).with_block_count(9))
        .await
        .unwrap();

    // Let the first sample fall out of the ranking window (it stays within
    // retention), then ingest again.
    tokio::time::sleep(Duration::from_millis(120)).await;
    metrics
        .ingest(&MetricSample::new("app-a", "/orders", Utc::now().timestamp_millis()).with_block_count(1))
        .await
        .unwrap();

    let ranked = store
        .sorted_range_desc(&MetricsWindow::rank_key("app-a"))
        .await
        .unwrap();
    assert_eq!(
        ranked,
        vec![("/orders".to_string(), 1.0)],
        "each ingest recomputes the score from its own window; 9 must not linger"
    );
}

#[tokio::test]
async fn idle_resource_keeps_its_last_score_until_expiry() {
    let store = Arc::new(InMemoryStore::new());
    let config = MetricsConfig {
        retention: Duration::from_secs(10),
        ranking_window: Duration::from_millis(50),
    };
    let metrics = MetricsWindow::with_config(store.clone(), config);

    metrics
        .ingest(&MetricSample::new("app-a", "/orders", Utc::now().timestamp_millis()).with_block_count(6))
        .await
        .unwrap();

    // Long after the ranking window has passed, the score is unchanged:
    // nothing recomputes it without a new ingest for that resource.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let ranked = store
        .sorted_range_desc(&MetricsWindow::rank_key("app-a"))
        .await
        .unwrap();
    assert_eq!(ranked, vec![("/orders".to_string(), 6.0)]);
}

#[tokio::test]
async fn batch_failure_leaves_earlier_samples_committed() {
    let metrics = MetricsWindow::new(Arc::new(InMemoryStore::new()));
    let now = Utc::now().timestamp_millis();

    let good = MetricSample::new("app-a", "/orders", now).with_block_count(2);
    let bad = MetricSample::new("app-a", " ", now);

    let result = metrics.ingest_batch(&[good.clone(), bad]).await;
    assert!(matches!(result, Err(MetricsError::InvalidArgument(_))));

    // No atomicity across the batch: the first sample went through.
    let results = metrics.query("app-a", "/orders", now - 1_000, now + 1_000).await.unwrap();
    assert_eq!(results, vec![good]);
}

#[tokio::test]
async fn series_for_different_resources_are_independent() {
    let metrics = MetricsWindow::new(Arc::new(InMemoryStore::new()));
    let now = Utc::now().timestamp_millis();

    metrics
        .ingest(&MetricSample::new("app-a", "/orders", now).with_block_count(1))
        .await
        .unwrap();
    metrics
        .ingest(&MetricSample::new("app-a", "/users", now).with_block_count(2))
        .await
        .unwrap();

    assert_eq!(metrics.query("app-a", "/orders", 0, i64::MAX).await.unwrap().len(), 1);
    assert_eq!(metrics.query("app-a", "/users", 0, i64::MAX).await.unwrap().len(), 1);
    assert!(metrics.query("app-b", "/orders", 0, i64::MAX).await.unwrap().is_empty());
}
