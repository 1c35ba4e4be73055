// Copyright (C) 2026 the organ-sampler contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Load-time error taxonomy.
//!
//! Three kinds, so the organ-load orchestrator can react differently to each:
//! a bad definition field aborts the enclosing load unit, a bad sample file
//! aborts only that pipe, and an allocation failure can trigger cache
//! shrinking before the whole load is given up on. A cache miss is not an
//! error anywhere in this crate.

use std::sync::Arc;

use crate::provider::wave::WaveError;

/// Typed error for the pipe load path. Rank and pipe identification is kept
/// as structured fields so the user-facing message is a presentation concern.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A definition-file value was missing without a default, out of its
    /// declared bound, or unparseable. Always identifies the field.
    #[error("invalid value for [{group}] {key}: {reason}")]
    ConfigField {
        group: String,
        key: String,
        reason: FieldError,
    },

    /// A referenced sample file was missing or corrupt.
    #[error("rank {rank} pipe {pipe}: {source}")]
    File {
        rank: Arc<str>,
        pipe: String,
        #[source]
        source: WaveError,
    },

    /// Buffer allocation failed while decoding or restoring from cache.
    #[error("rank {rank} pipe {pipe}: out of memory while loading sample data")]
    OutOfMemory { rank: Arc<str>, pipe: String },
}

impl LoadError {
    /// Whether this failure should trigger resource-pressure handling
    /// (e.g. shrinking caches and retrying) rather than being treated as a
    /// data problem.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, LoadError::OutOfMemory { .. })
    }
}

/// Why a single configuration field failed to read.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("required value is missing")]
    Missing,

    #[error("value {value} is outside the allowed range {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },

    #[error("value {value} is outside the allowed range {min}..={max}")]
    FloatOutOfRange { value: f32, min: f32, max: f32 },

    #[error("cannot parse {value:?} as {expected}")]
    Malformed {
        value: String,
        expected: &'static str,
    },
}
