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

//! Configuration support for KeyValue store backends.
//!
//! ## Environment Variables
//! - `FLOWGATE_KV_BACKEND`: backend type (default: "memory")
//!   - "memory" | "in-memory" → [`InMemoryStore`]
//!   - "redis" → `RedisStore`
//! - `FLOWGATE_KV_REDIS_URL`: Redis server URL (default: "redis://localhost:6379")
//! - `FLOWGATE_KV_REDIS_NAMESPACE`: key prefix for isolation (default: "flowgate")

use crate::{InMemoryStore, KVError, KVResult, KeyValueStore};
use std::sync::Arc;

/// Backend type configuration.
#[derive(Clone, Debug)]
pub enum BackendType {
    /// In-memory HashMap backend (default, always available)
    InMemory,
    /// Redis backend (requires redis-backend feature)
    Redis {
        /// Redis server URL
        url: String,
        /// Redis key namespace prefix
        namespace: String,
    },
}

impl Default for BackendType {
    fn default() -> Self {
        Self::InMemory
    }
}

/// KeyValue store configuration.
#[derive(Clone, Debug, Default)]
pub struct KVConfig {
    /// Backend type
    pub backend: BackendType,
}

impl KVConfig {
    /// Create configuration with an explicit backend.
    pub fn new(backend: BackendType) -> Self {
        Self { backend }
    }

    /// Create configuration from environment variables.
    ///
    /// See the module documentation for the variable list.
    pub fn from_env() -> KVResult<Self> {
        let backend_str = std::env::var("FLOWGATE_KV_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase();

        let backend = match backend_str.as_str() {
            "memory" | "in-memory" => BackendType::InMemory,

            "redis" => {
                let url = std::env::var("FLOWGATE_KV_REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string());
                let namespace = std::env::var("FLOWGATE_KV_REDIS_NAMESPACE")
                    .unwrap_or_else(|_| "flowgate".to_string());
                BackendType::Redis { url, namespace }
            }

            other => {
                return Err(KVError::Config(format!(
                    "Unknown backend type: {}. Valid options: memory, redis",
                    other
                )));
            }
        };

        Ok(Self { backend })
    }
}

/// Create a KeyValue store from environment configuration.
pub async fn create_store_from_env() -> KVResult<Arc<dyn KeyValueStore>> {
    let config = KVConfig::from_env()?;
    create_store_from_config(config).await
}

/// Create a KeyValue store from explicit configuration.
pub async fn create_store_from_config(config: KVConfig) -> KVResult<Arc<dyn KeyValueStore>> {
    match config.backend {
        BackendType::InMemory => Ok(Arc::new(InMemoryStore::new())),

        #[cfg(feature = "redis-backend")]
        BackendType::Redis { url, namespace } => {
            let store = crate::redis::RedisStore::new(&url, &namespace).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "redis-backend"))]
        BackendType::Redis { .. } => Err(KVError::Config(
            "Redis backend requires the 'redis-backend' feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_default() {
        std::env::remove_var("FLOWGATE_KV_BACKEND");

        let config = KVConfig::from_env().unwrap();
        assert!(matches!(config.backend, BackendType::InMemory));
    }

    #[test]
    #[serial]
    fn test_config_from_env_redis() {
        std::env::set_var("FLOWGATE_KV_BACKEND", "redis");
        std::env::set_var("FLOWGATE_KV_REDIS_URL", "redis://redis.internal:6379");
        std::env::set_var("FLOWGATE_KV_REDIS_NAMESPACE", "staging");

        let config = KVConfig::from_env().unwrap();
        match config.backend {
            BackendType::Redis { url, namespace } => {
                assert_eq!(url, "redis://redis.internal:6379");
                assert_eq!(namespace, "staging");
            }
            _ => panic!("Expected Redis backend"),
        }

        std::env::remove_var("FLOWGATE_KV_BACKEND");
        std::env::remove_var("FLOWGATE_KV_REDIS_URL");
        std::env::remove_var("FLOWGATE_KV_REDIS_NAMESPACE");
    }

    #[test]
    #[serial]
    fn test_config_from_env_invalid_backend() {
        std::env::set_var("FLOWGATE_KV_BACKEND", "etcd");

        let result = KVConfig::from_env();
        match result {
            Err(KVError::Config(msg)) => assert!(msg.contains("Unknown backend type")),
            other => panic!("Expected config error, got {:?}", other.map(|_| ())),
        }

        std::env::remove_var("FLOWGATE_KV_BACKEND");
    }

    #[tokio::test]
    async fn test_create_store_in_memory() {
        let store = create_store_from_config(KVConfig::new(BackendType::InMemory))
            .await
            .unwrap();
        store.put("test", b"value".to_vec()).await.unwrap();
        assert_eq!(store.get("test").await.unwrap(), Some(b"value".to_vec()));
    }
}
