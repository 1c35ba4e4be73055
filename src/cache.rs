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

//! Decoded-sample caching: the pipe fingerprint and the blob store.

pub mod fingerprint;
pub mod store;

pub use fingerprint::{Digest, Fingerprint};
pub use store::{CacheError, CacheReader, CacheWriter, DiskCache, MemoryCache};
