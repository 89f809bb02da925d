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

//! Error types for distributed lock operations.

use std::time::Duration;
use thiserror::Error;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur during lock operations.
///
/// Contention is NOT an error: `try_acquire` reports a held lock as
/// `Ok(None)` and the blocking `acquire` keeps polling through it. Only
/// store failures and an elapsed wait deadline surface here.
#[derive(Error, Debug)]
pub enum LockError {
    /// Lock name was blank
    #[error("lock name cannot be blank")]
    InvalidName,

    /// The wait deadline elapsed before the lock could be acquired
    #[error("timed out after {waited:?} waiting for lock '{name}'")]
    AcquireTimeout {
        /// Lock name that was contended
        name: String,
        /// How long the caller waited
        waited: Duration,
    },

    /// Store failure (network, backend) — never retried by the lock itself
    #[error(transparent)]
    Store(#[from] flowgate_keyvalue::KVError),
}
