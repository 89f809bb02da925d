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

//! Error types for KeyValue store operations.

use thiserror::Error;

/// Result type for KeyValue store operations.
pub type KVResult<T> = Result<T, KVError>;

/// Errors that can occur during KeyValue store operations.
#[derive(Error, Debug)]
pub enum KVError {
    /// Key not found
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Invalid key format
    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    /// Invalid value format (e.g. hash operation on a plain key)
    #[error("Invalid value format: {0}")]
    InvalidValue(String),

    /// Store unreachable or backend failure (network, server error)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for KVError {
    fn from(err: redis::RedisError) -> Self {
        KVError::Unavailable(format!("Redis error: {}", err))
    }
}
