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

//! Registry data model: applications and their member instances.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One running process of an application.
///
/// Identity within an application is the `(address, port)` pair; repeat
/// registration of the same endpoint refreshes liveness metadata instead of
/// adding a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    /// Application this instance belongs to
    pub app: String,
    /// Application-type tag
    pub app_type: u32,
    /// Network address the instance is reachable at
    pub address: String,
    /// Port the instance is reachable at
    pub port: u16,
    /// Hostname, when the instance reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Last time this instance registered or re-registered (epoch millis)
    pub last_heartbeat_ms: i64,
}

impl Instance {
    /// Create an instance stamped with the current time as its heartbeat.
    pub fn new(app: impl Into<String>, app_type: u32, address: impl Into<String>, port: u16) -> Self {
        Self {
            app: app.into(),
            app_type,
            address: address.into(),
            port,
            hostname: None,
            last_heartbeat_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Attach the reported hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Whether this instance is the one registered at `(address, port)`.
    pub fn endpoint_matches(&self, address: &str, port: u16) -> bool {
        self.address == address && self.port == port
    }
}

/// Per-application registry record: the application's identity plus its set
/// of known member instances.
///
/// Invariant: no two instances share an `(address, port)` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppInfo {
    /// Application name (the registry key)
    pub app: String,
    /// Application-type tag
    pub app_type: u32,
    /// Known member instances
    pub instances: Vec<Instance>,
}

impl AppInfo {
    /// Create an empty record for `app`.
    pub fn new(app: impl Into<String>, app_type: u32) -> Self {
        Self {
            app: app.into(),
            app_type,
            instances: Vec::new(),
        }
    }

    /// Insert or refresh an instance, keyed by `(address, port)`.
    ///
    /// ## Returns
    /// `true` if a new endpoint was added, `false` if an existing one was
    /// refreshed in place.
    pub fn upsert_instance(&mut self, instance: Instance) -> bool {
        match self
            .instances
            .iter_mut()
            .find(|i| i.endpoint_matches(&instance.address, instance.port))
        {
            Some(existing) => {
                *existing = instance;
                false
            }
            None => {
                self.instances.push(instance);
                true
            }
        }
    }

    /// Remove the instance registered at `(address, port)`, if any.
    pub fn remove_instance(&mut self, address: &str, port: u16) -> bool {
        let before = self.instances.len();
        self.instances.retain(|i| !i.endpoint_matches(address, port));
        self.instances.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_deduplicates_by_endpoint() {
        let mut info = AppInfo::new("app-a", 0);

        let mut first = Instance::new("app-a", 0, "10.0.0.1", 8719);
        first.last_heartbeat_ms = 1_000;
        assert!(info.upsert_instance(first));

        let mut refreshed = Instance::new("app-a", 0, "10.0.0.1", 8719);
        refreshed.last_heartbeat_ms = 2_000;
        assert!(!info.upsert_instance(refreshed));

        assert_eq!(info.instances.len(), 1);
        assert_eq!(info.instances[0].last_heartbeat_ms, 2_000);
    }

    #[test]
    fn test_same_address_different_port_is_distinct() {
        let mut info = AppInfo::new("app-a", 0);

        assert!(info.upsert_instance(Instance::new("app-a", 0, "10.0.0.1", 8719)));
        assert!(info.upsert_instance(Instance::new("app-a", 0, "10.0.0.1", 8720)));
        assert_eq!(info.instances.len(), 2);
    }

    #[test]
    fn test_remove_instance() {
        let mut info = AppInfo::new("app-a", 0);
        info.upsert_instance(Instance::new("app-a", 0, "10.0.0.1", 8719));

        assert!(!info.remove_instance("10.0.0.1", 9999));
        assert!(info.remove_instance("10.0.0.1", 8719));
        assert!(info.instances.is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut info = AppInfo::new("app-a", 1);
        info.upsert_instance(Instance::new("app-a", 1, "10.0.0.1", 8719).with_hostname("node-1"));

        let bytes = serde_json::to_vec(&info).unwrap();
        let parsed: AppInfo = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, info);
    }
}
