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

//! The per-pipe sample store: wave decoding, format conversion and the
//! in-memory representation handed to the render context.

pub mod buffer;
pub mod store;
pub mod wave;

pub use store::{LoadParams, PlaybackParams, ProviderError, SoundProvider};
pub use wave::{FileStore, WaveError};
