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

//! Error types for metrics operations.

use thiserror::Error;

/// Result type for metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors that can occur during metrics operations.
///
/// Absent data is never an error: queries over unknown apps, resources or
/// empty windows return empty results.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Invalid argument (blank names, negative timestamps), rejected before
    /// any store call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Store failure, surfaced uncaught — callers decide whether telemetry
    /// is worth failing the request over
    #[error(transparent)]
    Store(#[from] flowgate_keyvalue::KVError),

    /// A stored sample could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MetricsError {
    fn from(err: serde_json::Error) -> Self {
        MetricsError::Serialization(err.to_string())
    }
}
