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

//! # Flowgate Distributed Lock
//!
//! ## Purpose
//! Provides a named, time-bounded exclusive lock over the shared KeyValue
//! store, used to serialize concurrent read-modify-write updates (the
//! registry's contended merge path).
//!
//! ## Design
//! - Acquisition is one atomic insert-if-absent with TTL; the value is a
//!   fresh random token owned by the acquiring call.
//! - Release is one atomic compare-and-delete on that token, so a holder
//!   whose TTL expired can never delete a lock someone else re-acquired.
//! - The blocking acquire is a spin-wait: it polls at a configurable
//!   interval, yields between attempts, and optionally gives up after a
//!   wait deadline. There is no fairness — a late arrival can win over an
//!   earlier waiter.
//!
//! ## Safety caveat
//! This is a best-effort expiry lock, not a fencing-token lock. Mutual
//! exclusion holds only while the critical section completes within the
//! TTL: a holder that outlives its TTL keeps running unaware while another
//! caller acquires the lock, and writes from the two may interleave. Choose
//! TTLs with generous headroom over the slowest expected critical section.
//!
//! ## Examples
//! ```rust
//! use flowgate_keyvalue::InMemoryStore;
//! use flowgate_lock::{AcquireOptions, DistributedLock};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let lock = DistributedLock::new(Arc::new(InMemoryStore::new()));
//!
//! let token = lock.acquire("registry-lock:app-a", &AcquireOptions::default()).await?;
//! // ... critical section, shorter than the TTL ...
//! let released = lock.release("registry-lock:app-a", &token).await?;
//! assert!(released);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use flowgate_keyvalue::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub mod error;

pub use error::{LockError, LockResult};

/// Store key prefix for lock records.
const LOCK_KEY_PREFIX: &str = "lock:";

/// Default lease duration. Generous: a read-modify-write over the network
/// plus contention must fit inside it.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default interval between acquisition attempts in [`DistributedLock::acquire`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Opaque holder token, generated fresh per successful acquisition.
///
/// Only the call that acquired the lock holds its token; release compares
/// it against the stored value so a stale holder cannot free a lock that
/// has since been re-acquired by someone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The token's string form (what is stored under the lock key).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Options for the blocking [`DistributedLock::acquire`].
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    /// Lease duration of the lock record once acquired.
    pub ttl: Duration,
    /// Interval between acquisition attempts while contended.
    pub poll_interval: Duration,
    /// Overall wait deadline. `None` spins until acquired — the caller must
    /// then impose any bound itself.
    pub wait_timeout: Option<Duration>,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: None,
        }
    }
}

/// Distributed mutual-exclusion lock over the shared KeyValue store.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
}

impl DistributedLock {
    /// Create a lock facility over the given store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Attempt a single, non-blocking acquisition of lock `name`.
    ///
    /// ## Returns
    /// - `Ok(Some(token))` — the lock was free and is now held by this call
    /// - `Ok(None)` — a live (non-expired) record exists; held by someone else
    /// - `Err(LockError::Store)` — the store call failed; this is NOT
    ///   contention and must not be treated as "retry later"
    pub async fn try_acquire(&self, name: &str, ttl: Duration) -> LockResult<Option<LockToken>> {
        if name.trim().is_empty() {
            return Err(LockError::InvalidName);
        }
        let token = LockToken::generate();
        let inserted = self
            .store
            .put_if_absent_with_ttl(&Self::record_key(name), token.as_str().as_bytes().to_vec(), ttl)
            .await?;
        Ok(inserted.then_some(token))
    }

    /// Acquire lock `name`, polling until it is free.
    ///
    /// Spin-waits at `options.poll_interval`, sleeping (and thereby yielding
    /// to the runtime) between attempts. Store errors abort the wait
    /// immediately; only "held by someone else" is retried. With
    /// `wait_timeout: None` the wait is unbounded, ended at the latest by the
    /// current holder's TTL expiring.
    pub async fn acquire(&self, name: &str, options: &AcquireOptions) -> LockResult<LockToken> {
        let started = tokio::time::Instant::now();
        let mut attempts = 0u32;
        loop {
            if let Some(token) = self.try_acquire(name, options.ttl).await? {
                if attempts > 0 {
                    debug!(lock = name, attempts, "lock acquired after contention");
                }
                return Ok(token);
            }
            attempts += 1;
            if let Some(limit) = options.wait_timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(LockError::AcquireTimeout {
                        name: name.to_string(),
                        waited,
                    });
                }
            }
            tokio::time::sleep(options.poll_interval).await;
        }
    }

    /// Release lock `name`, deleting its record only if `token` still owns it.
    ///
    /// ## Returns
    /// - `Ok(true)` — the record was this holder's and was deleted
    /// - `Ok(false)` — the record had already expired (and possibly been
    ///   re-acquired under a different token); nothing was deleted. This
    ///   usually means the critical section overran the TTL.
    pub async fn release(&self, name: &str, token: &LockToken) -> LockResult<bool> {
        if name.trim().is_empty() {
            return Err(LockError::InvalidName);
        }
        let deleted = self
            .store
            .compare_and_delete(&Self::record_key(name), token.as_str().as_bytes())
            .await?;
        Ok(deleted)
    }

    fn record_key(name: &str) -> String {
        format!("{}{}", LOCK_KEY_PREFIX, name)
    }
}
