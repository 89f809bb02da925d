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

//! # Flowgate Application Registry
//!
//! ## Purpose
//! Maintains the mapping from application name to its set of known member
//! instances, in one hash on the shared KeyValue store.
//!
//! ## Concurrency design
//! - **Fast path**: registering the first instance of a new application is
//!   a single atomic insert-if-absent on the apps hash — race-free by the
//!   store's single-key atomicity, no lock taken.
//! - **Slow path**: once the record exists, merging another instance is a
//!   read-modify-write, serialized through a per-application lock named
//!   `registry-lock:<app>`. Updates to *different* applications never
//!   contend; the lock scope is exactly one application name.
//! - **Removal** is best-effort: it takes the per-app lock non-blocking and
//!   abandons the removal (reported, not retried) when the lock is held.
//!
//! ## Caller contract
//! [`AppRegistry::remove_app`] deletes the record unconditionally, without
//! the lock. Callers must not invoke it concurrently with in-flight instance
//! updates for the same application.
//!
//! ## Examples
//! ```rust
//! use flowgate_keyvalue::InMemoryStore;
//! use flowgate_registry::{AppRegistry, Instance};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = AppRegistry::new(Arc::new(InMemoryStore::new()));
//!
//! registry.add_instance(Instance::new("order-svc", 0, "10.0.0.1", 8719)).await?;
//! let info = registry.get_app("order-svc").await?.unwrap();
//! assert_eq!(info.instances.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use flowgate_keyvalue::KeyValueStore;
use flowgate_lock::{AcquireOptions, DistributedLock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod error;
pub mod model;

pub use error::{RegistryError, RegistryResult};
pub use model::{AppInfo, Instance};

/// Store key of the hash holding every application record (field = app name).
pub const APPS_KEY: &str = "registry:apps";

/// Prefix of the per-application merge lock's name.
const APP_LOCK_PREFIX: &str = "registry-lock:";

/// Tuning for the registry's use of the distributed lock.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Lease duration of the per-app lock. Generous by default: the locked
    /// section is a read-modify-write over the network and must finish well
    /// inside it.
    pub lock_ttl: Duration,
    /// Poll interval while waiting on a contended merge.
    pub lock_poll_interval: Duration,
    /// Optional bound on how long a merge waits for the lock. `None` spins
    /// until the lock frees, which the current holder's TTL guarantees.
    pub lock_wait_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(60),
            lock_poll_interval: Duration::from_millis(200),
            lock_wait_timeout: None,
        }
    }
}

/// Application/instance registry over the shared KeyValue store.
#[derive(Clone)]
pub struct AppRegistry {
    store: Arc<dyn KeyValueStore>,
    lock: DistributedLock,
    config: RegistryConfig,
}

impl AppRegistry {
    /// Create a registry with default lock tuning.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    /// Create a registry with explicit lock tuning.
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: RegistryConfig) -> Self {
        let lock = DistributedLock::new(store.clone());
        Self { store, lock, config }
    }

    /// Ensure an application record exists for `instance`'s app and that its
    /// instance set contains `instance` (idempotent upsert keyed by
    /// `(address, port)`; repeat calls refresh liveness metadata).
    pub async fn add_instance(&self, instance: Instance) -> RegistryResult<()> {
        Self::require_app(&instance.app)?;

        // Fast path: first instance of a new application. A single atomic
        // insert-if-absent creates the record; no lock needed.
        let mut fresh = AppInfo::new(&instance.app, instance.app_type);
        fresh.upsert_instance(instance.clone());
        let bytes = serde_json::to_vec(&fresh)?;
        if self.store.hash_put_if_absent(APPS_KEY, &instance.app, bytes).await? {
            return Ok(());
        }

        // Slow path: the record exists, so the merge is a read-modify-write
        // and needs exclusion against other writers of the same app.
        let lock_name = Self::lock_name(&instance.app);
        let options = AcquireOptions {
            ttl: self.config.lock_ttl,
            poll_interval: self.config.lock_poll_interval,
            wait_timeout: self.config.lock_wait_timeout,
        };
        let token = self.lock.acquire(&lock_name, &options).await?;
        debug!(app = %instance.app, "merging instance under registry lock");

        let result = self.merge_instance(&instance).await;

        match self.lock.release(&lock_name, &token).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(app = %instance.app, "registry lock expired before release; merge may have raced")
            }
            Err(e) => warn!(app = %instance.app, error = %e, "failed to release registry lock"),
        }
        result
    }

    /// Remove the instance registered at `(address, port)` for `app`.
    ///
    /// Best-effort: the per-app lock is taken non-blocking, and a held lock
    /// abandons the removal.
    ///
    /// ## Returns
    /// - `Ok(true)` — the lock was obtained and the removal attempted (also
    ///   when the app or instance turned out not to exist)
    /// - `Ok(false)` — the lock was held by someone else; nothing was done
    pub async fn remove_instance(&self, app: &str, address: &str, port: u16) -> RegistryResult<bool> {
        Self::require_app(app)?;

        let lock_name = Self::lock_name(app);
        let Some(token) = self.lock.try_acquire(&lock_name, self.config.lock_ttl).await? else {
            debug!(app, "registry lock held; abandoning instance removal");
            return Ok(false);
        };

        let result = self.remove_locked(app, address, port).await;

        match self.lock.release(&lock_name, &token).await {
            Ok(true) => {}
            Ok(false) => warn!(app, "registry lock expired before release"),
            Err(e) => warn!(app, error = %e, "failed to release registry lock"),
        }
        result.map(|_| true)
    }

    /// All known application names. Snapshot read, no locking.
    pub async fn list_app_names(&self) -> RegistryResult<Vec<String>> {
        Ok(self.store.hash_keys(APPS_KEY).await?)
    }

    /// One application's full record. Snapshot read, no locking.
    pub async fn get_app(&self, app: &str) -> RegistryResult<Option<AppInfo>> {
        Self::require_app(app)?;
        match self.store.hash_get(APPS_KEY, app).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every application's record. Snapshot read, no locking.
    pub async fn list_all_apps(&self) -> RegistryResult<Vec<AppInfo>> {
        let values = self.store.hash_values(APPS_KEY).await?;
        let mut apps = Vec::with_capacity(values.len());
        for bytes in values {
            apps.push(serde_json::from_slice(&bytes)?);
        }
        Ok(apps)
    }

    /// Delete an application record unconditionally. No lock — see the
    /// caller contract in the crate docs.
    pub async fn remove_app(&self, app: &str) -> RegistryResult<()> {
        Self::require_app(app)?;
        self.store.hash_delete(APPS_KEY, &[app.to_string()]).await?;
        Ok(())
    }

    /// Read-merge-write of one instance; must run under the per-app lock.
    async fn merge_instance(&self, instance: &Instance) -> RegistryResult<()> {
        let mut info = match self.store.hash_get(APPS_KEY, &instance.app).await? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            // The record can vanish between the failed insert and the lock
            // grant (concurrent remove_app); recreate it.
            None => AppInfo::new(&instance.app, instance.app_type),
        };
        info.upsert_instance(instance.clone());
        let bytes = serde_json::to_vec(&info)?;
        self.store.hash_put(APPS_KEY, &instance.app, bytes).await?;
        Ok(())
    }

    async fn remove_locked(&self, app: &str, address: &str, port: u16) -> RegistryResult<()> {
        if let Some(bytes) = self.store.hash_get(APPS_KEY, app).await? {
            let mut info: AppInfo = serde_json::from_slice(&bytes)?;
            info.remove_instance(address, port);
            let bytes = serde_json::to_vec(&info)?;
            self.store.hash_put(APPS_KEY, app, bytes).await?;
        }
        Ok(())
    }

    fn require_app(app: &str) -> RegistryResult<()> {
        if app.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "application name cannot be blank".to_string(),
            ));
        }
        Ok(())
    }

    fn lock_name(app: &str) -> String {
        format!("{}{}", APP_LOCK_PREFIX, app)
    }
}
