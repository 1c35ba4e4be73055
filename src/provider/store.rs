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

//! The sound provider: owns the decoded representation of all segments of
//! one pipe.
//!
//! Buffers are produced entirely in the loader context; the render context
//! reads the buffers and a tear-free [`PlaybackParams`] snapshot. On any
//! load failure the provider is cleared, so it is always either fully
//! populated or empty.

use arc_swap::ArcSwap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::buffer::{crossfade_frames, OutOfMemory, SampleBuffer};
use super::wave::{decode_wave, FileStore, WaveData, WaveError};
use crate::pipe::descriptor::{
    AttackDescriptor, LoopRegion, ReleaseDescriptor, SampleGroup,
};
use crate::pipe::params::{LoopLoadPolicy, SectionLoadPolicy};

/// Failure while populating a provider. File problems and memory exhaustion
/// are distinct so the organ-load orchestrator can react differently.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    File(#[from] WaveError),

    #[error(transparent)]
    OutOfMemory(#[from] OutOfMemory),
}

/// Effective decode parameters, resolved by the parameter cascade before the
/// provider is asked to load. Every field here affects decoded output and is
/// therefore part of the cache fingerprint.
#[derive(Debug, Clone)]
pub struct LoadParams {
    pub bits_per_sample: u8,
    pub channels: u8,
    pub compress: bool,
    pub loop_load: LoopLoadPolicy,
    pub attack_load: SectionLoadPolicy,
    pub release_load: SectionLoadPolicy,
    /// Overrides the MIDI key recovered from the recording; -1 = use the
    /// recording's own metadata.
    pub sample_key_override: i32,
    pub loop_crossfade_ms: u32,
    pub release_crossfade_ms: u32,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
            channels: 2,
            compress: false,
            loop_load: LoopLoadPolicy::All,
            attack_load: SectionLoadPolicy::All,
            release_load: SectionLoadPolicy::All,
            sample_key_override: -1,
            loop_crossfade_ms: 0,
            release_crossfade_ms: 0,
        }
    }
}

/// A materialized attack segment with its loop table (frame positions are
/// relative to the buffer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackSection {
    pub buffer: SampleBuffer,
    pub sample_group: SampleGroup,
    pub min_attack_velocity: u8,
    pub max_released_time_ms: i32,
    pub max_playback_time_ms: i32,
    pub cue_point: i32,
    pub loops: Vec<LoopRegion>,
}

/// A materialized release segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSection {
    pub buffer: SampleBuffer,
    pub sample_group: SampleGroup,
    pub max_playback_time_ms: i32,
    pub cue_point: i32,
}

/// The small value struct the render context reads. Swapped atomically as a
/// whole so a reader never observes a torn amplitude/pitch pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    /// Linear amplitude scalar (percent amplitude and dB gain combined).
    pub amplitude: f32,
    /// Playback pitch adjustment in cents.
    pub pitch_cents: f32,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            pitch_cents: 0.0,
        }
    }
}

/// Owns the decoded in-memory representation of all segments for one pipe.
pub struct SoundProvider {
    attacks: Vec<AttackSection>,
    releases: Vec<ReleaseSection>,
    percussive: bool,
    is_oneshot: bool,
    /// MIDI key recovered from the recording (or overridden); 0 = unknown.
    midi_key_number: u8,
    midi_pitch_fraction_cents: f32,
    velocity_min: f32,
    velocity_max: f32,
    /// 0 = normal samples, 1 = tremulant samples.
    active_group: u8,
    release_tail_ms: u32,
    loaded: bool,
    params: ArcSwap<PlaybackParams>,
}

impl Default for SoundProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundProvider {
    pub fn new() -> Self {
        Self {
            attacks: Vec::new(),
            releases: Vec::new(),
            percussive: false,
            is_oneshot: false,
            midi_key_number: 0,
            midi_pitch_fraction_cents: 0.0,
            velocity_min: 100.0,
            velocity_max: 100.0,
            active_group: 0,
            release_tail_ms: 0,
            loaded: false,
            params: ArcSwap::from_pointee(PlaybackParams::default()),
        }
    }

    /// Reads, converts and materializes every referenced segment. On failure
    /// the provider is cleared before the error is returned; no partial
    /// state survives.
    pub fn load_from_file(
        &mut self,
        files: &dyn FileStore,
        attacks: &[AttackDescriptor],
        releases: &[ReleaseDescriptor],
        params: &LoadParams,
    ) -> Result<(), ProviderError> {
        self.clear_data();
        match self.load_inner(files, attacks, releases, params) {
            Ok(()) => {
                self.loaded = true;
                debug!(
                    attacks = self.attacks.len(),
                    releases = self.releases.len(),
                    oneshot = self.is_oneshot,
                    memory_kb = self.memory_size() / 1024,
                    "Pipe sample data loaded"
                );
                Ok(())
            }
            Err(e) => {
                self.clear_data();
                Err(e)
            }
        }
    }

    fn load_inner(
        &mut self,
        files: &dyn FileStore,
        attacks: &[AttackDescriptor],
        releases: &[ReleaseDescriptor],
        params: &LoadParams,
    ) -> Result<(), ProviderError> {
        self.percussive = attacks.iter().any(|a| a.percussive);

        // An effective channel count of zero marks the pipe silent/unused:
        // nothing is decoded and all diagnostics are short-circuited.
        if params.channels == 0 {
            self.is_oneshot = true;
            return Ok(());
        }

        let selected_attacks: &[AttackDescriptor] = match params.attack_load {
            SectionLoadPolicy::First => &attacks[..attacks.len().min(1)],
            SectionLoadPolicy::All => attacks,
        };

        let mut first_wave_pitch: Option<(u8, f32)> = None;
        for descriptor in selected_attacks {
            let wave = decode_wave(&files.read(&descriptor.file)?)?;
            if first_wave_pitch.is_none() {
                first_wave_pitch = Some((wave.midi_key_number, wave.midi_pitch_fraction_cents));
            }
            self.load_attack(&wave, descriptor, params)?;
        }

        let selected_releases: &[ReleaseDescriptor] = match params.release_load {
            SectionLoadPolicy::First => &releases[..releases.len().min(1)],
            SectionLoadPolicy::All => releases,
        };
        for descriptor in selected_releases {
            let wave = decode_wave(&files.read(&descriptor.file)?)?;
            self.load_release(&wave, descriptor, params)?;
        }

        let (recovered_key, recovered_fraction) = first_wave_pitch.unwrap_or((0, 0.0));
        if params.sample_key_override >= 0 {
            self.midi_key_number = params.sample_key_override as u8;
            self.midi_pitch_fraction_cents = 0.0;
        } else {
            self.midi_key_number = recovered_key;
            self.midi_pitch_fraction_cents = recovered_fraction;
        }

        self.is_oneshot = self.attacks.iter().all(|a| a.loops.is_empty());
        Ok(())
    }

    /// Materializes one attack section (and, when requested, the release
    /// embedded after its last loop).
    fn load_attack(
        &mut self,
        wave: &WaveData,
        descriptor: &AttackDescriptor,
        params: &LoadParams,
    ) -> Result<(), ProviderError> {
        let frames = wave.frames();
        let attack_start = descriptor.attack_start as usize;
        let file_end = if descriptor.release_end >= 0 {
            (descriptor.release_end as usize + 1).min(frames)
        } else {
            frames
        };
        if attack_start >= file_end {
            return Err(WaveError::Format(format!(
                "attack start {attack_start} is beyond the usable {file_end}-frame range of {}",
                descriptor.file.as_str()
            ))
            .into());
        }

        // Loops must fit inside the release_end-truncated range, or their
        // stored positions would point past the buffer.
        let loops = select_loops(&descriptor.loops, params.loop_load);
        for region in &loops {
            if (region.start as usize) < attack_start || (region.end as usize) > file_end {
                return Err(WaveError::Format(format!(
                    "loop {}..{} is outside the usable range of {}",
                    region.start,
                    region.end,
                    descriptor.file.as_str()
                ))
                .into());
            }
        }
        let last_loop_end = loops.iter().map(|l| l.end as usize).max();
        let attack_end = match last_loop_end {
            // Without the embedded release the buffer can stop at the loop end.
            Some(end) if !descriptor.load_release => end,
            _ => file_end,
        };

        let mut buffer = SampleBuffer::build(
            wave,
            attack_start,
            attack_end,
            params.channels,
            params.bits_per_sample,
            params.compress,
        )?;

        // Rebase loop positions onto the buffer and materialize the seams.
        let fade = crossfade_frames(params.loop_crossfade_ms, wave.sample_rate);
        let loops: Vec<LoopRegion> = loops
            .iter()
            .map(|l| LoopRegion {
                start: l.start - attack_start as u32,
                end: l.end - attack_start as u32,
            })
            .collect();
        for region in &loops {
            buffer.crossfade_loop(*region, fade);
        }

        self.attacks.push(AttackSection {
            buffer,
            sample_group: descriptor.sample_group,
            min_attack_velocity: descriptor.min_attack_velocity,
            max_released_time_ms: descriptor.max_released_time_ms,
            max_playback_time_ms: descriptor.max_playback_time_ms,
            cue_point: descriptor.cue_point,
            loops,
        });

        // The portion after the last loop is the embedded release.
        if descriptor.load_release {
            if let Some(release_start) = last_loop_end {
                if release_start < file_end {
                    let mut buffer = SampleBuffer::build(
                        wave,
                        release_start,
                        file_end,
                        params.channels,
                        params.bits_per_sample,
                        params.compress,
                    )?;
                    buffer.crossfade_head(crossfade_frames(
                        params.release_crossfade_ms,
                        wave.sample_rate,
                    ));
                    self.releases.push(ReleaseSection {
                        buffer,
                        sample_group: descriptor.sample_group,
                        max_playback_time_ms: descriptor.max_playback_time_ms,
                        cue_point: descriptor.cue_point,
                    });
                }
            }
        }

        Ok(())
    }

    fn load_release(
        &mut self,
        wave: &WaveData,
        descriptor: &ReleaseDescriptor,
        params: &LoadParams,
    ) -> Result<(), ProviderError> {
        let frames = wave.frames();
        let end = if descriptor.release_end >= 0 {
            (descriptor.release_end as usize + 1).min(frames)
        } else {
            frames
        };
        let mut buffer = SampleBuffer::build(
            wave,
            0,
            end,
            params.channels,
            params.bits_per_sample,
            params.compress,
        )?;
        buffer.crossfade_head(crossfade_frames(
            params.release_crossfade_ms,
            wave.sample_rate,
        ));
        self.releases.push(ReleaseSection {
            buffer,
            sample_group: descriptor.sample_group,
            max_playback_time_ms: descriptor.max_playback_time_ms,
            cue_point: descriptor.cue_point,
        });
        Ok(())
    }

    /// Discards all decoded data, returning the provider to its empty state.
    pub fn clear_data(&mut self) {
        self.attacks.clear();
        self.releases.clear();
        self.is_oneshot = false;
        self.midi_key_number = 0;
        self.midi_pitch_fraction_cents = 0.0;
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn attacks(&self) -> &[AttackSection] {
        &self.attacks
    }

    pub fn releases(&self) -> &[ReleaseSection] {
        &self.releases
    }

    /// Whether the sound is self-terminating (no sustained loop): the voice
    /// plays through once and needs no stop request.
    pub fn is_oneshot(&self) -> bool {
        self.is_oneshot
    }

    pub fn midi_key_number(&self) -> u8 {
        self.midi_key_number
    }

    pub fn midi_pitch_fraction(&self) -> f32 {
        self.midi_pitch_fraction_cents
    }

    /// Selects which sample-group variant is served: 0 = normal,
    /// 1 = tremulant.
    pub fn use_sample_group(&mut self, selector: u8) {
        self.active_group = selector;
    }

    pub fn active_sample_group(&self) -> u8 {
        self.active_group
    }

    pub fn set_velocity_volume_range(&mut self, min: f32, max: f32) {
        self.velocity_min = min;
        self.velocity_max = max;
    }

    pub fn velocity_volume_range(&self) -> (f32, f32) {
        (self.velocity_min, self.velocity_max)
    }

    /// Linear volume scale for a MIDI velocity, interpolated across the
    /// configured velocity volume range (percent).
    pub fn volume_for_velocity(&self, velocity: u8) -> f32 {
        let t = f32::from(velocity) / 127.0;
        (self.velocity_min + (self.velocity_max - self.velocity_min) * t) / 100.0
    }

    pub fn set_release_tail(&mut self, ms: u32) {
        self.release_tail_ms = ms;
    }

    pub fn release_tail_ms(&self) -> u32 {
        self.release_tail_ms
    }

    /// The tear-free snapshot the render context reads every buffer cycle.
    pub fn playback_params(&self) -> PlaybackParams {
        **self.params.load()
    }

    /// Combines percent amplitude with dB gain into the linear scalar.
    /// Takes `&self`: the update is an atomic snapshot swap.
    pub fn set_amplitude(&self, amplitude_percent: f32, gain_db: f32) {
        let amplitude = amplitude_percent / 100.0 * 10f32.powf(gain_db / 20.0);
        let current = self.playback_params();
        self.params.store(Arc::new(PlaybackParams {
            amplitude,
            ..current
        }));
    }

    pub fn set_tuning(&self, pitch_cents: f32) {
        let current = self.playback_params();
        self.params.store(Arc::new(PlaybackParams {
            pitch_cents,
            ..current
        }));
    }

    /// Total memory used by decoded buffers.
    pub fn memory_size(&self) -> usize {
        self.attacks
            .iter()
            .map(|a| a.buffer.memory_size())
            .chain(self.releases.iter().map(|r| r.buffer.memory_size()))
            .sum()
    }

    // Diagnostics queries (§ load validation); never load-blocking.

    /// The attack table lacks an entry applicable regardless of the time
    /// since the last release.
    pub fn missing_unbounded_attack(&self) -> bool {
        !self.attacks.iter().any(|a| a.max_released_time_ms == -1)
    }

    /// Releases exist, but none is the default/fallback release.
    pub fn missing_default_release(&self) -> bool {
        !self.releases.is_empty()
            && !self.releases.iter().any(|r| r.max_playback_time_ms == -1)
    }

    /// A sustained pipe has no release at all.
    pub fn missing_release(&self) -> bool {
        !self.percussive && self.releases.is_empty()
    }

    /// A self-terminating pipe carries a release it will never use.
    pub fn unnecessary_release(&self) -> bool {
        self.percussive && !self.releases.is_empty()
    }

    pub(crate) fn to_cached(&self) -> Option<CachedProvider> {
        if !self.loaded {
            return None;
        }
        Some(CachedProvider {
            attacks: self.attacks.clone(),
            releases: self.releases.clone(),
            percussive: self.percussive,
            is_oneshot: self.is_oneshot,
            midi_key_number: self.midi_key_number,
            midi_pitch_fraction_cents: self.midi_pitch_fraction_cents,
        })
    }

    pub(crate) fn restore_cached(&mut self, cached: CachedProvider) {
        self.attacks = cached.attacks;
        self.releases = cached.releases;
        self.percussive = cached.percussive;
        self.is_oneshot = cached.is_oneshot;
        self.midi_key_number = cached.midi_key_number;
        self.midi_pitch_fraction_cents = cached.midi_pitch_fraction_cents;
        self.loaded = true;
    }
}

impl std::fmt::Debug for SoundProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundProvider")
            .field("attacks", &self.attacks.len())
            .field("releases", &self.releases.len())
            .field("loaded", &self.loaded)
            .field("oneshot", &self.is_oneshot)
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}

/// Persisted form of a fully loaded provider, keyed in the cache by the
/// pipe's fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CachedProvider {
    pub attacks: Vec<AttackSection>,
    pub releases: Vec<ReleaseSection>,
    pub percussive: bool,
    pub is_oneshot: bool,
    pub midi_key_number: u8,
    pub midi_pitch_fraction_cents: f32,
}

fn select_loops(loops: &[LoopRegion], policy: LoopLoadPolicy) -> Vec<LoopRegion> {
    match policy {
        LoopLoadPolicy::All => loops.to_vec(),
        LoopLoadPolicy::First => loops.first().copied().into_iter().collect(),
        LoopLoadPolicy::Longest => loops
            .iter()
            .max_by_key(|l| l.frames())
            .copied()
            .into_iter()
            .collect(),
    }
}
