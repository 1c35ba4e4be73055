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

//! Temperament tables and the pure tuning math.
//!
//! Everything in this module is computation only; no I/O, no state. The
//! output is a single cents-based pitch adjustment applied by the sampler.

/// A per-pitch-class tuning offset table relative to equal temperament.
#[derive(Debug, Clone)]
pub struct Temperament {
    name: String,
    /// Offset in cents per pitch class (index = MIDI key mod 12).
    offsets: [f32; 12],
    /// Original-based temperaments keep whatever tuning is baked into the
    /// recordings and contribute no extra offset.
    original_based: bool,
}

impl Temperament {
    /// The "original" pseudo-temperament: play recordings as tuned.
    pub fn original() -> Self {
        Self {
            name: "Original".to_string(),
            offsets: [0.0; 12],
            original_based: true,
        }
    }

    /// Plain equal temperament.
    pub fn equal() -> Self {
        Self {
            name: "Equal".to_string(),
            offsets: [0.0; 12],
            original_based: false,
        }
    }

    /// A historic temperament given by its twelve pitch-class offsets.
    pub fn new(name: &str, offsets: [f32; 12]) -> Self {
        Self {
            name: name.to_string(),
            offsets,
            original_based: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_original_based(&self) -> bool {
        self.original_based
    }

    /// Offset in cents for a pitch class (0..12).
    pub fn offset(&self, pitch_class: u8) -> f32 {
        self.offsets[usize::from(pitch_class) % 12]
    }
}

/// Inputs to the pitch-adjustment computation for one pipe.
#[derive(Debug, Clone, Copy)]
pub struct TuningInputs {
    /// Effective user tuning in cents.
    pub tuning_cents: f32,
    /// Rank-level pitch correction in cents.
    pub pitch_correction_cents: f32,
    /// ODF-declared tuning baseline in cents (removed again so only the
    /// user's delta remains).
    pub pitch_tuning_cents: f32,
    /// Disables pitch tracking from the recording.
    pub ignore_pitch: bool,
    /// MIDI key recovered from the recording; 0 = unknown.
    pub recorded_key: u8,
    /// Sub-semitone pitch of the recording in cents.
    pub recorded_pitch_fraction_cents: f32,
    /// The key this pipe is played at.
    pub target_key: u8,
    /// Overtone multiple relative to 8' pitch, >= 1.
    pub harmonic_number: u32,
}

/// Correction from the recording's own pitch to concert pitch, in cents.
/// Zero when pitch tracking is off or the recording carries no key number.
pub fn concert_pitch_correction(inputs: &TuningInputs) -> f32 {
    if inputs.ignore_pitch || inputs.recorded_key == 0 {
        return 0.0;
    }
    100.0 * f32::from(inputs.recorded_key) - 100.0 * f32::from(inputs.target_key)
        + 1200.0 * (8.0 / inputs.harmonic_number as f32).log2()
        + inputs.recorded_pitch_fraction_cents
}

/// The cents-based playback pitch adjustment for one pipe, before the
/// temperament offset is added.
///
/// Original-based temperaments use the effective tuning alone; anything else
/// converts from the recording's tuning to equal temperament first.
pub fn pitch_adjustment(original_based: bool, inputs: &TuningInputs) -> f32 {
    if original_based {
        inputs.tuning_cents
    } else {
        inputs.tuning_cents + inputs.pitch_correction_cents
            - inputs.pitch_tuning_cents
            - concert_pitch_correction(inputs)
    }
}

/// Load-time retune offset in semitones, used only for diagnostics.
pub fn retune_offset(inputs: &TuningInputs) -> f64 {
    f64::from(inputs.recorded_key) + (8.0 / f64::from(inputs.harmonic_number)).log2() * 12.0
        - f64::from(
            inputs.recorded_pitch_fraction_cents - inputs.pitch_tuning_cents
                + inputs.pitch_correction_cents,
        ) / 100.0
        - f64::from(inputs.target_key)
}

/// Severity of a retune offset. Thresholds are fixed engineering constants:
/// 18 semitones and above is an error, above 6 a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSeverity {
    Acceptable,
    Warning,
    Error,
}

pub fn classify_retune_offset(offset: f64) -> OffsetSeverity {
    let magnitude = offset.abs();
    if magnitude >= 18.0 {
        OffsetSeverity::Error
    } else if magnitude > 6.0 {
        OffsetSeverity::Warning
    } else {
        OffsetSeverity::Acceptable
    }
}
