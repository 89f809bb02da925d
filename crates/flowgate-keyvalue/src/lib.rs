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

//! # Flowgate KeyValue Store
//!
//! ## Purpose
//! Provides the shared key-value storage abstraction that the Flowgate core
//! facilities (distributed lock, application registry, windowed metrics) are
//! built on. The store is the single source of truth: no component keeps an
//! in-process cache that can diverge from it.
//!
//! ## Operation families
//! - **Plain keys**: `get` / `put` / `delete` / `exists`, plus the two atomic
//!   primitives the lock is built on: [`KeyValueStore::put_if_absent_with_ttl`]
//!   (insert-if-absent with expiry) and [`KeyValueStore::compare_and_delete`]
//!   (delete only when the current value matches).
//! - **Hashes**: field-addressed records under one key — registry records
//!   keyed by application name, metric series keyed by sample timestamp.
//! - **Scored sets**: the hot-resource ranking index, enumerated in
//!   descending score order.
//!
//! ## Backend Support
//! - **InMemory**: HashMap-based with lazy TTL expiry (always available)
//! - **Redis**: distributed, native TTL (feature: `redis-backend`)
//!
//! ## Examples
//! ```rust
//! use flowgate_keyvalue::{KeyValueStore, InMemoryStore};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let kv = InMemoryStore::new();
//!
//! // Atomic insert-if-absent with expiry (lock acquisition primitive)
//! let acquired = kv
//!     .put_if_absent_with_ttl("lock:app-a", b"token".to_vec(), Duration::from_secs(60))
//!     .await?;
//! assert!(acquired);
//!
//! // Token-checked delete (lock release primitive)
//! let released = kv.compare_and_delete("lock:app-a", b"token").await?;
//! assert!(released);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub mod config;
pub mod error;
pub mod memory;

#[cfg(feature = "redis-backend")]
pub mod redis;

pub use config::{create_store_from_config, create_store_from_env, BackendType, KVConfig};
pub use error::{KVError, KVResult};
pub use memory::InMemoryStore;

#[cfg(feature = "redis-backend")]
pub use redis::RedisStore;

/// KeyValue store trait defining all operations the Flowgate core consumes.
///
/// ## Semantics
/// - A key whose TTL has elapsed is indistinguishable from an absent key.
/// - `put` and `put_if_absent_with_ttl` replace any previous TTL; `hash_put`
///   and `sorted_put` leave the containing key's TTL untouched (refresh it
///   explicitly with [`KeyValueStore::expire`]).
/// - Hash and scored-set operations on a key holding a plain value return
///   [`KVError::InvalidValue`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    // =========================================================================
    // Plain keys
    // =========================================================================

    /// Get value by key (non-destructive read).
    async fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Put key-value pair, overwriting any existing value and clearing its TTL.
    async fn put(&self, key: &str, value: Vec<u8>) -> KVResult<()>;

    /// Delete key. Idempotent: succeeds even if the key does not exist.
    async fn delete(&self, key: &str) -> KVResult<()>;

    /// Check whether a live (non-expired) value exists for `key`.
    async fn exists(&self, key: &str) -> KVResult<bool>;

    /// Atomically insert `value` with a TTL, only if no live value exists.
    ///
    /// ## Returns
    /// - `Ok(true)` if the value was inserted
    /// - `Ok(false)` if a live value already existed (nothing changed)
    async fn put_if_absent_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> KVResult<bool>;

    /// Atomically delete `key` only if its current value equals `expected`.
    ///
    /// The comparison and the delete happen as one step against the backend
    /// (a Lua script on Redis). A separate get-then-delete is not equivalent:
    /// the key may expire and be re-created by another writer in between.
    ///
    /// ## Returns
    /// - `Ok(true)` if the key existed with the expected value and was deleted
    /// - `Ok(false)` otherwise (absent, expired, or a different value)
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> KVResult<bool>;

    /// Set or refresh the TTL of an existing key.
    ///
    /// ## Returns
    /// - `Ok(true)` if the key exists and its TTL was set
    /// - `Ok(false)` if the key does not exist
    async fn expire(&self, key: &str, ttl: Duration) -> KVResult<bool>;

    // =========================================================================
    // Hashes (field-addressed records under one key)
    // =========================================================================

    /// Get a single hash field.
    async fn hash_get(&self, key: &str, field: &str) -> KVResult<Option<Vec<u8>>>;

    /// Put a single hash field, creating the hash if absent.
    async fn hash_put(&self, key: &str, field: &str, value: Vec<u8>) -> KVResult<()>;

    /// Atomically put a hash field only if that field is absent.
    ///
    /// ## Returns
    /// - `Ok(true)` if the field was created
    /// - `Ok(false)` if the field already existed (nothing changed)
    async fn hash_put_if_absent(&self, key: &str, field: &str, value: Vec<u8>) -> KVResult<bool>;

    /// Delete hash fields, returning how many existed and were removed.
    async fn hash_delete(&self, key: &str, fields: &[String]) -> KVResult<usize>;

    /// Get all fields and values of a hash. Absent key yields an empty map.
    async fn hash_get_all(&self, key: &str) -> KVResult<HashMap<String, Vec<u8>>>;

    /// Get all field names of a hash. Absent key yields an empty vec.
    async fn hash_keys(&self, key: &str) -> KVResult<Vec<String>>;

    /// Get all values of a hash. Absent key yields an empty vec.
    async fn hash_values(&self, key: &str) -> KVResult<Vec<Vec<u8>>>;

    // =========================================================================
    // Scored sets (ranking indexes)
    // =========================================================================

    /// Add a member with the given score, overwriting the member's previous
    /// score if present.
    async fn sorted_put(&self, key: &str, member: &str, score: f64) -> KVResult<()>;

    /// Enumerate all members with their scores, descending by score.
    ///
    /// Members with equal scores are returned in a backend-defined order.
    /// Absent key yields an empty vec.
    async fn sorted_range_desc(&self, key: &str) -> KVResult<Vec<(String, f64)>>;
}
