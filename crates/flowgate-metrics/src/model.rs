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

//! Metrics data model.

use serde::{Deserialize, Serialize};

/// One aggregated measurement for an (app, resource) pair at a timestamp.
/// Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    /// Application the traffic belongs to
    pub app: String,
    /// Resource (endpoint, method, ...) the traffic hit
    pub resource: String,
    /// Measurement time, epoch millis; also the sample's series key
    pub timestamp_ms: i64,
    /// Requests allowed through
    #[serde(default)]
    pub pass_count: u64,
    /// Requests rejected by traffic control — drives the hot-resource rank
    #[serde(default)]
    pub block_count: u64,
    /// Requests completed successfully
    #[serde(default)]
    pub success_count: u64,
    /// Requests that errored
    #[serde(default)]
    pub exception_count: u64,
    /// Average response time over the aggregation period, millis
    #[serde(default)]
    pub rt_millis: f64,
    /// Number of raw measurements aggregated into this sample
    #[serde(default)]
    pub count: u32,
}

impl MetricSample {
    /// Create a zeroed sample for (app, resource) at `timestamp_ms`.
    pub fn new(app: impl Into<String>, resource: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            app: app.into(),
            resource: resource.into(),
            timestamp_ms,
            pass_count: 0,
            block_count: 0,
            success_count: 0,
            exception_count: 0,
            rt_millis: 0.0,
            count: 0,
        }
    }

    /// Set the rejected-request count.
    pub fn with_block_count(mut self, block_count: u64) -> Self {
        self.block_count = block_count;
        self
    }

    /// Set the passed-request count.
    pub fn with_pass_count(mut self, pass_count: u64) -> Self {
        self.pass_count = pass_count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_round_trip() {
        let sample = MetricSample::new("app-a", "/orders", 1_700_000_000_000)
            .with_pass_count(120)
            .with_block_count(7);

        let bytes = serde_json::to_vec(&sample).unwrap();
        let parsed: MetricSample = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, sample);
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let parsed: MetricSample = serde_json::from_str(
            r#"{"app":"a","resource":"r","timestamp_ms":1000,"block_count":3}"#,
        )
        .unwrap();
        assert_eq!(parsed.block_count, 3);
        assert_eq!(parsed.pass_count, 0);
        assert_eq!(parsed.rt_millis, 0.0);
    }
}
