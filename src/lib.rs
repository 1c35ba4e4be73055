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

//! Sampled-audio engine for a virtual pipe organ.
//!
//! This crate owns the audio-data side of an organ simulator:
//! - Per-pipe attack/loop/release descriptor parsing from a definition file
//! - Wave decoding, format conversion and loop/crossfade materialization
//! - A persistent binary cache keyed by a content fingerprint
//! - Tuning and temperament math producing a cents-based pitch adjustment
//! - The per-pipe runtime state machine driving a voice allocator
//!
//! The graphical console, the definition-file parser's generic layer, the
//! mixer callback and the voice allocator itself are external collaborators;
//! their boundaries are the traits in [`config`], [`provider`], [`cache`]
//! and [`voice`].

pub mod cache;
pub mod config;
pub mod error;
pub mod pipe;
pub mod provider;
pub mod voice;

pub use error::LoadError;
pub use pipe::sounding::SoundingPipe;
pub use provider::store::SoundProvider;
