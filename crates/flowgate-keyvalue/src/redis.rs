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

//! Redis-based KeyValueStore implementation.
//!
//! ## Purpose
//! Provides the distributed store backend used in production deployments.
//!
//! ## Mapping
//! - `put_if_absent_with_ttl` → `SET key value NX PX ttl`
//! - `compare_and_delete`     → Lua get/del script (single atomic step)
//! - hashes                   → `HGET`/`HSET`/`HSETNX`/`HDEL`/`HGETALL`
//! - scored sets              → `ZADD` / `ZREVRANGE WITHSCORES`
//! - TTLs                     → native `PX` / `PEXPIRE`
//!
//! All keys are prefixed with a namespace so several deployments can share
//! one Redis instance.

use crate::{KVError, KVResult, KeyValueStore};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, ExistenceCheck, Script, SetExpiry, SetOptions};
use std::collections::HashMap;
use std::time::Duration;

/// Deletes KEYS[1] only when its current value equals ARGV[1]. The check and
/// the delete must be one atomic step: between a plain GET and DEL the key
/// can expire and be re-created by another writer.
const COMPARE_AND_DELETE_SCRIPT: &str = r#"if redis.call("get",KEYS[1]) == ARGV[1] then return redis.call("del",KEYS[1]) else return 0 end"#;

/// Redis-based KeyValueStore implementation.
///
/// ## Architecture
/// - Uses the `redis` crate's async `ConnectionManager` (pooled, reconnecting)
/// - Namespace prefix on every key for deployment isolation
/// - TTLs enforced by Redis itself, no client-side bookkeeping
pub struct RedisStore {
    manager: ConnectionManager,
    namespace: String,
    compare_and_delete: Script,
}

impl RedisStore {
    /// Create a new Redis-backed KeyValueStore.
    ///
    /// ## Arguments
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `namespace` - key prefix for isolation (e.g., "flowgate")
    ///
    /// ## Errors
    /// [`KVError::Unavailable`] if the connection cannot be established.
    pub async fn new(url: &str, namespace: &str) -> KVResult<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self {
            manager,
            namespace: namespace.to_string(),
            compare_and_delete: Script::new(COMPARE_AND_DELETE_SCRIPT),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn
            .get(self.prefixed(key))
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis GET failed: {}", e)))?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> KVResult<()> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(self.prefixed(key), value)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis SET failed: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> KVResult<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(self.prefixed(key))
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis DEL failed: {}", e)))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> KVResult<bool> {
        let mut conn = self.manager.clone();
        let exists: bool = conn
            .exists(self.prefixed(key))
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis EXISTS failed: {}", e)))?;
        Ok(exists)
    }

    async fn put_if_absent_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> KVResult<bool> {
        let mut conn = self.manager.clone();
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .with_expiration(SetExpiry::PX(ttl.as_millis() as u64));
        // NX miss returns nil, which decodes to false.
        let set: bool = conn
            .set_options(self.prefixed(key), value, options)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis SET NX PX failed: {}", e)))?;
        Ok(set)
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> KVResult<bool> {
        let mut conn = self.manager.clone();
        let deleted: i64 = self
            .compare_and_delete
            .key(self.prefixed(key))
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis compare-and-delete script failed: {}", e)))?;
        Ok(deleted == 1)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KVResult<bool> {
        let mut conn = self.manager.clone();
        let set: bool = conn
            .pexpire(self.prefixed(key), ttl.as_millis() as i64)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis PEXPIRE failed: {}", e)))?;
        Ok(set)
    }

    async fn hash_get(&self, key: &str, field: &str) -> KVResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn
            .hget(self.prefixed(key), field)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis HGET failed: {}", e)))?;
        Ok(value)
    }

    async fn hash_put(&self, key: &str, field: &str, value: Vec<u8>) -> KVResult<()> {
        let mut conn = self.manager.clone();
        conn.hset::<_, _, _, ()>(self.prefixed(key), field, value)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis HSET failed: {}", e)))?;
        Ok(())
    }

    async fn hash_put_if_absent(&self, key: &str, field: &str, value: Vec<u8>) -> KVResult<bool> {
        let mut conn = self.manager.clone();
        let inserted: bool = conn
            .hset_nx(self.prefixed(key), field, value)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis HSETNX failed: {}", e)))?;
        Ok(inserted)
    }

    async fn hash_delete(&self, key: &str, fields: &[String]) -> KVResult<usize> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.manager.clone();
        let removed: usize = conn
            .hdel(self.prefixed(key), fields)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis HDEL failed: {}", e)))?;
        Ok(removed)
    }

    async fn hash_get_all(&self, key: &str) -> KVResult<HashMap<String, Vec<u8>>> {
        let mut conn = self.manager.clone();
        let entries: HashMap<String, Vec<u8>> = conn
            .hgetall(self.prefixed(key))
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis HGETALL failed: {}", e)))?;
        Ok(entries)
    }

    async fn hash_keys(&self, key: &str) -> KVResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let fields: Vec<String> = conn
            .hkeys(self.prefixed(key))
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis HKEYS failed: {}", e)))?;
        Ok(fields)
    }

    async fn hash_values(&self, key: &str) -> KVResult<Vec<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let values: Vec<Vec<u8>> = conn
            .hvals(self.prefixed(key))
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis HVALS failed: {}", e)))?;
        Ok(values)
    }

    async fn sorted_put(&self, key: &str, member: &str, score: f64) -> KVResult<()> {
        let mut conn = self.manager.clone();
        let _added: i64 = conn
            .zadd(self.prefixed(key), member, score)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis ZADD failed: {}", e)))?;
        Ok(())
    }

    async fn sorted_range_desc(&self, key: &str) -> KVResult<Vec<(String, f64)>> {
        let mut conn = self.manager.clone();
        let members: Vec<(String, f64)> = conn
            .zrevrange_withscores(self.prefixed(key), 0, -1)
            .await
            .map_err(|e| KVError::Unavailable(format!("Redis ZREVRANGE failed: {}", e)))?;
        Ok(members)
    }
}

// ============================================================================
// TESTS (require a running Redis instance)
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_store() -> RedisStore {
        RedisStore::new("redis://localhost:6379", "flowgate-test")
            .await
            .expect("Failed to connect to Redis (ensure Redis is running)")
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_basic_put_get() {
        let store = create_test_store().await;

        store.put("key1", b"value1".to_vec()).await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some(b"value1".to_vec()));

        store.delete("key1").await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_put_if_absent_and_compare_and_delete() {
        let store = create_test_store().await;
        store.delete("nx_key").await.unwrap();

        let first = store
            .put_if_absent_with_ttl("nx_key", b"holder-a".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(first);

        let second = store
            .put_if_absent_with_ttl("nx_key", b"holder-b".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        assert!(!second);

        assert!(!store.compare_and_delete("nx_key", b"holder-b").await.unwrap());
        assert!(store.compare_and_delete("nx_key", b"holder-a").await.unwrap());
        assert_eq!(store.get("nx_key").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_hash_operations() {
        let store = create_test_store().await;
        store.delete("h").await.unwrap();

        assert!(store.hash_put_if_absent("h", "f1", b"v1".to_vec()).await.unwrap());
        assert!(!store.hash_put_if_absent("h", "f1", b"v2".to_vec()).await.unwrap());
        store.hash_put("h", "f2", b"v2".to_vec()).await.unwrap();

        let all = store.hash_get_all("h").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("f1"), Some(&b"v1".to_vec()));

        let removed = store.hash_delete("h", &["f1".to_string()]).await.unwrap();
        assert_eq!(removed, 1);

        // Cleanup
        store.delete("h").await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_sorted_set_ordering() {
        let store = create_test_store().await;
        store.delete("rank").await.unwrap();

        store.sorted_put("rank", "a", 1.0).await.unwrap();
        store.sorted_put("rank", "b", 5.0).await.unwrap();
        store.sorted_put("rank", "c", 3.0).await.unwrap();

        let members = store.sorted_range_desc("rank").await.unwrap();
        let names: Vec<&str> = members.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);

        // Cleanup
        store.delete("rank").await.unwrap();
    }
}
