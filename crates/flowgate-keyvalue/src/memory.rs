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

//! In-memory KeyValue store implementation.
//!
//! ## Purpose
//! Provides a HashMap-based implementation for testing and single-process
//! scenarios. TTLs are enforced lazily: an expired entry is treated as absent
//! by every operation and physically removed on the next write that touches
//! its key.
//!
//! ## Limitations
//! - Not persistent (data lost on restart)
//! - Not distributed (single process only)

use crate::{KVError, KVResult, KeyValueStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Stored value, one variant per operation family.
#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
    Sorted(HashMap<String, f64>),
}

/// Entry in the in-memory store with optional TTL.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn new_with_ttl(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// In-memory KeyValue store implementation.
///
/// ## Example
/// ```rust
/// use flowgate_keyvalue::{KeyValueStore, InMemoryStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let kv = InMemoryStore::new();
///
/// kv.put("key", b"value".to_vec()).await?;
/// let value = kv.get("key").await?;
/// assert_eq!(value, Some(b"value".to_vec()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    data: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryStore {
    /// Create a new in-memory KeyValue store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop the entry for `key` if its TTL has elapsed.
    fn prune(data: &mut HashMap<String, Entry>, key: &str) {
        if data.get(key).is_some_and(|e| e.is_expired()) {
            data.remove(key);
        }
    }

    fn hash_of<'a>(entry: &'a Entry, key: &str) -> KVResult<&'a HashMap<String, Vec<u8>>> {
        match &entry.value {
            Value::Hash(h) => Ok(h),
            _ => Err(KVError::InvalidValue(format!("key '{}' does not hold a hash", key))),
        }
    }

    fn hash_mut<'a>(entry: &'a mut Entry, key: &str) -> KVResult<&'a mut HashMap<String, Vec<u8>>> {
        match &mut entry.value {
            Value::Hash(h) => Ok(h),
            _ => Err(KVError::InvalidValue(format!("key '{}' does not hold a hash", key))),
        }
    }

    fn sorted_mut<'a>(entry: &'a mut Entry, key: &str) -> KVResult<&'a mut HashMap<String, f64>> {
        match &mut entry.value {
            Value::Sorted(s) => Ok(s),
            _ => Err(KVError::InvalidValue(format!(
                "key '{}' does not hold a scored set",
                key
            ))),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        let data = self.data.read().await;
        match data.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => match &entry.value {
                Value::Bytes(b) => Ok(Some(b.clone())),
                _ => Err(KVError::InvalidValue(format!(
                    "key '{}' does not hold a plain value",
                    key
                ))),
            },
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> KVResult<()> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), Entry::new(Value::Bytes(value)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> KVResult<()> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> KVResult<bool> {
        let data = self.data.read().await;
        Ok(data.get(key).is_some_and(|e| !e.is_expired()))
    }

    async fn put_if_absent_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> KVResult<bool> {
        let mut data = self.data.write().await;
        Self::prune(&mut data, key);
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), Entry::new_with_ttl(Value::Bytes(value), ttl));
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> KVResult<bool> {
        let mut data = self.data.write().await;
        Self::prune(&mut data, key);
        let matches = match data.get(key) {
            Some(entry) => match &entry.value {
                Value::Bytes(b) => b.as_slice() == expected,
                _ => {
                    return Err(KVError::InvalidValue(format!(
                        "key '{}' does not hold a plain value",
                        key
                    )))
                }
            },
            None => false,
        };
        if matches {
            data.remove(key);
        }
        Ok(matches)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> KVResult<bool> {
        let mut data = self.data.write().await;
        Self::prune(&mut data, key);
        match data.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn hash_get(&self, key: &str, field: &str) -> KVResult<Option<Vec<u8>>> {
        let data = self.data.read().await;
        match data.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => Ok(Self::hash_of(entry, key)?.get(field).cloned()),
            None => Ok(None),
        }
    }

    async fn hash_put(&self, key: &str, field: &str, value: Vec<u8>) -> KVResult<()> {
        let mut data = self.data.write().await;
        Self::prune(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
        Self::hash_mut(entry, key)?.insert(field.to_string(), value);
        Ok(())
    }

    async fn hash_put_if_absent(&self, key: &str, field: &str, value: Vec<u8>) -> KVResult<bool> {
        let mut data = self.data.write().await;
        Self::prune(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
        let hash = Self::hash_mut(entry, key)?;
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value);
        Ok(true)
    }

    async fn hash_delete(&self, key: &str, fields: &[String]) -> KVResult<usize> {
        let mut data = self.data.write().await;
        Self::prune(&mut data, key);
        let Some(entry) = data.get_mut(key) else {
            return Ok(0);
        };
        let (removed, now_empty) = {
            let hash = Self::hash_mut(entry, key)?;
            let removed = fields.iter().filter(|f| hash.remove(f.as_str()).is_some()).count();
            (removed, hash.is_empty())
        };
        // An emptied hash disappears, matching the remote store.
        if now_empty {
            data.remove(key);
        }
        Ok(removed)
    }

    async fn hash_get_all(&self, key: &str) -> KVResult<HashMap<String, Vec<u8>>> {
        let data = self.data.read().await;
        match data.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => Ok(Self::hash_of(entry, key)?.clone()),
            None => Ok(HashMap::new()),
        }
    }

    async fn hash_keys(&self, key: &str) -> KVResult<Vec<String>> {
        let data = self.data.read().await;
        match data.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => Ok(Self::hash_of(entry, key)?.keys().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn hash_values(&self, key: &str) -> KVResult<Vec<Vec<u8>>> {
        let data = self.data.read().await;
        match data.get(key).filter(|e| !e.is_expired()) {
            Some(entry) => Ok(Self::hash_of(entry, key)?.values().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn sorted_put(&self, key: &str, member: &str, score: f64) -> KVResult<()> {
        let mut data = self.data.write().await;
        Self::prune(&mut data, key);
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::Sorted(HashMap::new())));
        Self::sorted_mut(entry, key)?.insert(member.to_string(), score);
        Ok(())
    }

    async fn sorted_range_desc(&self, key: &str) -> KVResult<Vec<(String, f64)>> {
        let data = self.data.read().await;
        let Some(entry) = data.get(key).filter(|e| !e.is_expired()) else {
            return Ok(Vec::new());
        };
        let set = match &entry.value {
            Value::Sorted(s) => s,
            _ => {
                return Err(KVError::InvalidValue(format!(
                    "key '{}' does not hold a scored set",
                    key
                )))
            }
        };
        let mut members: Vec<(String, f64)> = set.iter().map(|(m, s)| (m.clone(), *s)).collect();
        members.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(members)
    }
}
