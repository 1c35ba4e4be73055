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

//! Per-pipe model: load descriptors, effective parameters, tuning math and
//! the runtime state machine.

pub mod descriptor;
pub mod params;
pub mod sounding;
pub mod tuning;

use std::sync::Arc;

/// Immutable identity of one playable pipe, fixed at organ-definition load.
#[derive(Debug, Clone)]
pub struct PipeIdentity {
    /// Name of the owning rank, for diagnostics and error context.
    pub rank_name: Arc<str>,
    /// The MIDI key this pipe sounds for.
    pub midi_key: u8,
    /// Overtone multiple relative to nominal 8' pitch, >= 1.
    pub harmonic_number: u32,
    /// Whether the sample is self-terminating (no sustained loop).
    pub percussive: bool,
    /// 1-based windchest group the pipe belongs to.
    pub windchest_group: u16,
}
