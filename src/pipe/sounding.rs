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

//! The sounding pipe: configuration parsing, data loading, caching, tuning
//! and the runtime on/off/tremulant state machine.
//!
//! One `SoundingPipe` lives per playable pipe for the whole organ session.
//! Loading happens in the loader context; the state machine runs in the
//! control context and only talks to the render side through the
//! [`VoiceAllocator`] boundary and the provider's atomic parameter snapshot.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheError, CacheReader, CacheWriter, Digest, Fingerprint};
use crate::config::ConfigReader;
use crate::error::LoadError;
use crate::pipe::descriptor::{AttackDescriptor, ReleaseDescriptor, SampleRef};
use crate::pipe::params::{
    LoopLoadPolicy, OrganDefaults, PipeConfigNode, PipeUpdateListener, RankDefaults,
    SectionLoadPolicy,
};
use crate::pipe::tuning::{
    classify_retune_offset, pitch_adjustment, retune_offset, OffsetSeverity, Temperament,
    TuningInputs,
};
use crate::pipe::PipeIdentity;
use crate::provider::store::LoadParams;
use crate::provider::wave::FileStore;
use crate::provider::{ProviderError, SoundProvider};
use crate::voice::{StartRequest, VoiceAllocator, VoiceHandle};

/// One non-fatal finding from post-load validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// No attack applies regardless of the time since the last release.
    MissingUnboundedAttack,
    /// Releases exist but none is the default/fallback.
    MissingDefaultRelease,
    /// A sustained pipe has no release at all.
    MissingRelease,
    /// A self-terminating pipe carries a release it will never use.
    UnnecessaryRelease,
    /// Retuning was requested but the recording carries no pitch metadata
    /// and no key override was given.
    NoPitchInformation,
    /// Retune offset in semitones, warning level.
    RetuneWarning { offset: f64 },
    /// Retune offset in semitones, error level. The load is suspect but
    /// not aborted.
    RetuneError { offset: f64 },
}

/// Runtime state and load pipeline for one pipe.
pub struct SoundingPipe {
    identity: PipeIdentity,
    node: PipeConfigNode,
    provider: SoundProvider,
    attacks: Vec<AttackDescriptor>,
    releases: Vec<ReleaseDescriptor>,

    /// Error-context label, typically the definition prefix ("Pipe001").
    pipe_title: String,
    pitch_correction_cents: f32,
    /// Overrides the recording's MIDI key; -1 = use the recording.
    sample_midi_key_override: i32,
    loop_crossfade_ms: u32,
    release_crossfade_ms: u32,
    /// Whether this pipe participates in temperament retuning.
    retune: bool,
    min_velocity_volume: f32,
    max_velocity_volume: f32,
    temperament_offset_cents: f32,
    temperament_original_based: bool,

    instances: u32,
    tremulant: bool,
    handle: Option<VoiceHandle>,
    last_stop: u64,
    velocity: u8,
}

impl SoundingPipe {
    pub fn new(
        rank_name: Arc<str>,
        midi_key: u8,
        windchest_group: u16,
        shared: Arc<RankDefaults>,
        organ: Arc<OrganDefaults>,
    ) -> Self {
        Self {
            identity: PipeIdentity {
                rank_name,
                midi_key,
                harmonic_number: 8,
                percussive: false,
                windchest_group,
            },
            node: PipeConfigNode::new(shared, organ),
            provider: SoundProvider::new(),
            attacks: Vec::new(),
            releases: Vec::new(),
            pipe_title: String::new(),
            pitch_correction_cents: 0.0,
            sample_midi_key_override: -1,
            loop_crossfade_ms: 0,
            release_crossfade_ms: 0,
            retune: true,
            min_velocity_volume: 100.0,
            max_velocity_volume: 100.0,
            temperament_offset_cents: 0.0,
            temperament_original_based: true,
            instances: 0,
            tremulant: false,
            handle: None,
            last_stop: 0,
            velocity: 0,
        }
    }

    /// Parses the full pipe definition: pipe-level fields, the parameter
    /// node, the default attack, indexed extra attacks and indexed releases.
    pub fn load(
        &mut self,
        cfg: &impl ConfigReader,
        group: &str,
        prefix: &str,
    ) -> Result<(), LoadError> {
        self.pipe_title = prefix.to_string();

        self.identity.percussive =
            cfg.read_boolean(group, &format!("{prefix}Percussive"), Some(false))?;
        self.identity.harmonic_number = cfg.read_integer(
            group,
            &format!("{prefix}HarmonicNumber"),
            1,
            1024,
            Some(i64::from(self.identity.harmonic_number)),
        )? as u32;
        self.pitch_correction_cents = cfg.read_float(
            group,
            &format!("{prefix}PitchCorrection"),
            -1800.0,
            1800.0,
            Some(0.0),
        )?;
        self.sample_midi_key_override = cfg.read_integer(
            group,
            &format!("{prefix}MIDIKeyNumber"),
            -1,
            127,
            Some(-1),
        )? as i32;
        self.loop_crossfade_ms = cfg.read_integer(
            group,
            &format!("{prefix}LoopCrossfadeLength"),
            0,
            120,
            Some(0),
        )? as u32;
        self.release_crossfade_ms = cfg.read_integer(
            group,
            &format!("{prefix}ReleaseCrossfadeLength"),
            0,
            200,
            Some(0),
        )? as u32;
        self.retune =
            cfg.read_boolean(group, &format!("{prefix}AcceptsRetuning"), Some(self.retune))?;
        self.min_velocity_volume = cfg.read_float(
            group,
            &format!("{prefix}MinVelocityVolume"),
            0.0,
            1000.0,
            Some(self.min_velocity_volume),
        )?;
        self.max_velocity_volume = cfg.read_float(
            group,
            &format!("{prefix}MaxVelocityVolume"),
            0.0,
            1000.0,
            Some(self.max_velocity_volume),
        )?;

        self.node.load(cfg, group, prefix)?;

        self.attacks = vec![AttackDescriptor::parse(
            cfg,
            group,
            prefix,
            self.identity.percussive,
        )?];
        let attack_count =
            cfg.read_integer(group, &format!("{prefix}AttackCount"), 0, 100, Some(0))?;
        for i in 1..=attack_count {
            self.attacks.push(AttackDescriptor::parse(
                cfg,
                group,
                &format!("{prefix}Attack{i:03}"),
                self.identity.percussive,
            )?);
        }

        self.releases.clear();
        let release_count =
            cfg.read_integer(group, &format!("{prefix}ReleaseCount"), 0, 100, Some(0))?;
        for i in 1..=release_count {
            self.releases.push(ReleaseDescriptor::parse(
                cfg,
                group,
                &format!("{prefix}Release{i:03}"),
            )?);
        }

        Ok(())
    }

    /// Sets up a pipe defined by a bare sample reference with no indexed
    /// sections: one implicit attack, percussive-aware defaults.
    pub fn init(&mut self, title: &str, file: SampleRef, percussive: bool) {
        self.pipe_title = title.to_string();
        self.identity.percussive = percussive;
        self.attacks = vec![AttackDescriptor::default_for(file, percussive)];
        self.releases.clear();
    }

    pub fn identity(&self) -> &PipeIdentity {
        &self.identity
    }

    pub fn provider(&self) -> &SoundProvider {
        &self.provider
    }

    pub fn config(&self) -> &PipeConfigNode {
        &self.node
    }

    fn load_params(&self) -> LoadParams {
        LoadParams {
            bits_per_sample: self.node.effective_bits_per_sample(),
            channels: self.node.effective_channels(),
            compress: self.node.effective_compress(),
            loop_load: self.node.effective_loop_load(),
            attack_load: self.node.effective_attack_load(),
            release_load: self.node.effective_release_load(),
            sample_key_override: self.sample_midi_key_override,
            loop_crossfade_ms: self.loop_crossfade_ms,
            release_crossfade_ms: self.release_crossfade_ms,
        }
    }

    /// Decodes all referenced sample files into the provider. On failure the
    /// provider is left empty and the error carries rank/pipe context.
    pub fn load_data(&mut self, files: &dyn FileStore) -> Result<(), LoadError> {
        let params = self.load_params();
        self.provider
            .load_from_file(files, &self.attacks, &self.releases, &params)
            .map_err(|e| self.wrap_provider_error(e))?;
        self.apply_loaded_state();
        Ok(())
    }

    fn wrap_provider_error(&self, e: ProviderError) -> LoadError {
        match e {
            ProviderError::File(source) => LoadError::File {
                rank: Arc::clone(&self.identity.rank_name),
                pipe: self.pipe_title.clone(),
                source,
            },
            ProviderError::OutOfMemory(_) => LoadError::OutOfMemory {
                rank: Arc::clone(&self.identity.rank_name),
                pipe: self.pipe_title.clone(),
            },
        }
    }

    /// Forwards node state into the freshly populated provider and derives
    /// the playback scalars.
    fn apply_loaded_state(&mut self) {
        self.provider
            .set_velocity_volume_range(self.min_velocity_volume, self.max_velocity_volume);
        self.provider
            .set_release_tail(self.node.effective_release_tail_ms());
        self.on_amplitude_changed();
        self.on_tuning_changed();
    }

    /// Folds every decode-affecting input into the cache fingerprint, in the
    /// fixed documented order. Diagnostic-only and playback-scalar fields
    /// (amplitude, tuning, retune flags) are deliberately absent.
    pub fn fingerprint(&self) -> Digest {
        let params = self.load_params();
        let mut fp = Fingerprint::new();
        fp.update_str(self.attacks.first().map(|a| a.file.as_str()).unwrap_or(""))
            .update_u8(params.bits_per_sample)
            .update_bool(params.compress)
            .update_u8(params.channels)
            .update_u8(loop_load_code(params.loop_load))
            .update_u8(section_load_code(params.attack_load))
            .update_u8(section_load_code(params.release_load))
            .update_i32(params.sample_key_override)
            .update_u32(params.loop_crossfade_ms)
            .update_u32(params.release_crossfade_ms);

        fp.update_usize(self.attacks.len());
        for attack in &self.attacks {
            fp.update_str(attack.file.as_str())
                .update_i8(attack.sample_group.as_i8())
                .update_i32(attack.max_playback_time_ms)
                .update_bool(attack.load_release)
                .update_bool(attack.percussive)
                .update_i32(attack.cue_point)
                .update_usize(attack.loops.len())
                .update_u32(attack.attack_start)
                .update_i32(attack.release_end);
            for region in &attack.loops {
                fp.update_u32(region.start).update_u32(region.end);
            }
        }

        fp.update_usize(self.releases.len());
        for release in &self.releases {
            fp.update_str(release.file.as_str())
                .update_i8(release.sample_group.as_i8())
                .update_i32(release.max_playback_time_ms)
                .update_i32(release.cue_point)
                .update_i32(release.release_end);
        }

        fp.finish()
    }

    /// Tries to restore the provider from a cache entry. A miss or a corrupt
    /// entry returns `Ok(false)`; only backend I/O failures are errors.
    pub fn load_cache(&mut self, cache: &dyn CacheReader) -> Result<bool, CacheError> {
        let digest = self.fingerprint();
        let Some(blob) = cache.read(&digest)? else {
            return Ok(false);
        };
        match bincode::deserialize(&blob) {
            Ok(cached) => {
                self.provider.restore_cached(cached);
                self.apply_loaded_state();
                debug!(pipe = %self.pipe_title, fingerprint = %digest, "Pipe restored from cache");
                Ok(true)
            }
            Err(e) => {
                // Corrupt entries degrade to a decode.
                warn!(
                    pipe = %self.pipe_title,
                    fingerprint = %digest,
                    error = %e,
                    "Discarding corrupt cache entry"
                );
                Ok(false)
            }
        }
    }

    /// Persists the loaded provider under the pipe's fingerprint. Returns
    /// `false` when skipped (provider not loaded, or entry already present).
    pub fn save_cache(&self, cache: &dyn CacheWriter) -> Result<bool, CacheError> {
        let Some(cached) = self.provider.to_cached() else {
            return Ok(false);
        };
        let blob = match bincode::serialize(&cached) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(pipe = %self.pipe_title, error = %e, "Cannot serialize pipe for caching");
                return Ok(false);
            }
        };
        cache.write(&self.fingerprint(), &blob)
    }

    fn tuning_inputs(&self) -> TuningInputs {
        TuningInputs {
            tuning_cents: self.node.effective_tuning(),
            pitch_correction_cents: self.pitch_correction_cents,
            pitch_tuning_cents: self.node.effective_pitch_tuning(),
            ignore_pitch: self.node.effective_ignore_pitch(),
            recorded_key: self.provider.midi_key_number(),
            recorded_pitch_fraction_cents: self.provider.midi_pitch_fraction(),
            target_key: self.identity.midi_key,
            harmonic_number: self.identity.harmonic_number,
        }
    }

    /// Installs a temperament and recomputes the playback pitch before the
    /// next buffer is rendered for this pipe.
    pub fn set_temperament(&mut self, temperament: &Temperament) {
        self.temperament_original_based = temperament.is_original_based();
        self.temperament_offset_cents = if self.retune {
            temperament.offset(self.identity.midi_key % 12)
        } else {
            0.0
        };
        self.on_tuning_changed();
    }

    /// Live amplitude adjustment (percent).
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.node.set_amplitude(amplitude);
        self.on_amplitude_changed();
    }

    /// Live tuning adjustment in cents.
    pub fn set_tuning(&mut self, cents: f32) {
        self.node.set_tuning(cents);
        self.on_tuning_changed();
    }

    /// Post-load consistency checks. Gated on the strict flag; a channel
    /// count of zero marks the pipe silent and short-circuits everything.
    pub fn validate(&self, strict: bool) -> Vec<Diagnostic> {
        let mut findings = Vec::new();
        if !strict || self.node.effective_channels() == 0 {
            return findings;
        }

        if self.provider.missing_unbounded_attack() {
            findings.push(Diagnostic::MissingUnboundedAttack);
        }
        if self.provider.missing_default_release() {
            findings.push(Diagnostic::MissingDefaultRelease);
        }
        if self.provider.missing_release() {
            findings.push(Diagnostic::MissingRelease);
        }
        if self.provider.unnecessary_release() {
            findings.push(Diagnostic::UnnecessaryRelease);
        }

        if self.retune {
            if self.provider.midi_key_number() == 0
                && self.provider.midi_pitch_fraction() == 0.0
                && self.sample_midi_key_override < 0
            {
                findings.push(Diagnostic::NoPitchInformation);
            } else {
                let offset = retune_offset(&self.tuning_inputs());
                match classify_retune_offset(offset) {
                    OffsetSeverity::Error => findings.push(Diagnostic::RetuneError { offset }),
                    OffsetSeverity::Warning => {
                        findings.push(Diagnostic::RetuneWarning { offset })
                    }
                    OffsetSeverity::Acceptable => {}
                }
            }
        }

        for finding in &findings {
            warn!(
                rank = %self.identity.rank_name,
                pipe = %self.pipe_title,
                finding = ?finding,
                "Pipe validation finding"
            );
        }
        findings
    }

    // Runtime state machine.

    pub fn is_sounding(&self) -> bool {
        self.instances > 0
    }

    pub fn instances(&self) -> u32 {
        self.instances
    }

    /// Reacts to a velocity edge: silence to sound starts a voice, sound to
    /// silence stops it, a velocity change while sounding updates in place.
    pub fn change(&mut self, allocator: &mut dyn VoiceAllocator, velocity: u8, last_velocity: u8) {
        if self.instances == 0 && velocity > 0 {
            self.set_on(allocator, velocity);
        } else if self.instances > 0 && velocity == 0 {
            self.set_off(allocator);
        } else if velocity > 0 && velocity != last_velocity {
            self.velocity = velocity;
            if let Some(handle) = self.handle {
                allocator.update_velocity(&self.provider, handle, velocity);
            }
        }
    }

    /// Requests a voice. Pool refusal is silent: no instance is counted and
    /// that attack simply produces no sound.
    pub fn set_on(&mut self, allocator: &mut dyn VoiceAllocator, velocity: u8) {
        let request = StartRequest {
            windchest_group: self.identity.windchest_group,
            audio_group: self.node.effective_audio_group(),
            velocity,
            delay_ms: self.node.effective_delay_ms(),
            last_stop: self.last_stop,
        };
        let Some(handle) = allocator.start_voice(&self.provider, request) else {
            debug!(
                rank = %self.identity.rank_name,
                pipe = %self.pipe_title,
                "Voice pool refused start"
            );
            return;
        };
        self.instances += 1;
        self.velocity = velocity;
        // One-shot samples run to completion on their own; the handle is not
        // kept for a later stop or update.
        if !self.provider.is_oneshot() {
            self.handle = Some(handle);
        }
    }

    /// Releases the held voice and records the stop timestamp for the next
    /// start's "time since release" reference.
    pub fn set_off(&mut self, allocator: &mut dyn VoiceAllocator) {
        if self.instances == 0 {
            return;
        }
        self.instances -= 1;
        if let Some(handle) = self.handle.take() {
            self.last_stop = allocator.stop_voice(&self.provider, handle);
        }
    }

    /// Switches between normal and tremulant sample groups. An active voice
    /// gets its data hot-swapped with the playback position preserved, so no
    /// articulation retrigger occurs.
    pub fn set_tremulant(&mut self, allocator: &mut dyn VoiceAllocator, on: bool) {
        if self.tremulant == on {
            return;
        }
        self.tremulant = on;
        self.provider.use_sample_group(u8::from(on));
        if let Some(handle) = self.handle {
            allocator.switch_sample(&self.provider, handle);
        }
    }

    pub fn is_tremulant(&self) -> bool {
        self.tremulant
    }

    /// Emergency reset: back to idle with no allocator notification.
    pub fn abort_playback(&mut self) {
        self.instances = 0;
        self.tremulant = false;
        self.handle = None;
        self.last_stop = 0;
        self.velocity = 0;
        self.provider.use_sample_group(0);
    }
}

impl PipeUpdateListener for SoundingPipe {
    fn on_amplitude_changed(&mut self) {
        self.provider.set_amplitude(
            self.node.effective_amplitude(),
            self.node.effective_gain_db(),
        );
    }

    fn on_tuning_changed(&mut self) {
        let adjustment =
            pitch_adjustment(self.temperament_original_based, &self.tuning_inputs());
        self.provider
            .set_tuning(adjustment + self.temperament_offset_cents);
    }
}

fn loop_load_code(policy: LoopLoadPolicy) -> u8 {
    match policy {
        LoopLoadPolicy::First => 0,
        LoopLoadPolicy::Longest => 1,
        LoopLoadPolicy::All => 2,
    }
}

fn section_load_code(policy: SectionLoadPolicy) -> u8 {
    match policy {
        SectionLoadPolicy::First => 0,
        SectionLoadPolicy::All => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::MemoryConfig;
    use crate::provider::wave::testdata::wav_bytes;
    use crate::provider::wave::MemoryFileStore;
    use crate::voice::{AllocatorCall, MockAllocator};

    fn pipe() -> SoundingPipe {
        SoundingPipe::new(
            Arc::from("Principal 8"),
            60,
            1,
            Arc::new(RankDefaults::default()),
            Arc::new(OrganDefaults {
                channels: 1,
                ..OrganDefaults::default()
            }),
        )
    }

    fn looped_config() -> MemoryConfig {
        let mut cfg = MemoryConfig::new();
        cfg.set("Rank001", "Pipe001", "samples/c2.wav")
            .set("Rank001", "Pipe001LoopCount", "1")
            .set("Rank001", "Pipe001Loop001Start", "400")
            .set("Rank001", "Pipe001Loop001End", "1400");
        cfg
    }

    fn file_store(frames: usize, smpl: Option<(u8, u32)>) -> MemoryFileStore {
        let data: Vec<i16> = (0..frames).map(|i| (i % 500) as i16).collect();
        let mut store = MemoryFileStore::new();
        store.insert("samples/c2.wav", wav_bytes(&data, 44100, smpl));
        store
    }

    fn loaded_pipe() -> SoundingPipe {
        let mut p = pipe();
        p.load(&looped_config(), "Rank001", "Pipe001").unwrap();
        p.load_data(&file_store(2000, Some((60, 0)))).unwrap();
        p
    }

    #[test]
    fn test_change_edges_drive_allocator() {
        let mut p = loaded_pipe();
        let mut allocator = MockAllocator::new();

        p.change(&mut allocator, 80, 0);
        assert!(p.is_sounding());
        assert_eq!(allocator.starts(), 1);

        p.change(&mut allocator, 40, 80);
        assert_eq!(allocator.starts(), 1);
        assert_eq!(allocator.stops(), 0);
        assert!(matches!(
            allocator.calls.last(),
            Some(AllocatorCall::UpdateVelocity { velocity: 40, .. })
        ));

        p.change(&mut allocator, 0, 40);
        assert!(!p.is_sounding());
        assert_eq!(allocator.stops(), 1);
        assert!(p.last_stop > 0);
    }

    #[test]
    fn test_voice_pool_refusal_is_silent() {
        let mut p = loaded_pipe();
        let mut allocator = MockAllocator::new();
        allocator.refuse_starts = true;

        p.change(&mut allocator, 80, 0);
        assert!(!p.is_sounding());
        assert_eq!(p.instances(), 0);

        // A later stop edge does nothing.
        p.change(&mut allocator, 0, 80);
        assert_eq!(allocator.stops(), 0);
    }

    #[test]
    fn test_oneshot_drops_handle() {
        let mut p = pipe();
        let mut cfg = MemoryConfig::new();
        cfg.set("Rank001", "Pipe001", "samples/c2.wav")
            .set("Rank001", "Pipe001Percussive", "Y");
        p.load(&cfg, "Rank001", "Pipe001").unwrap();
        p.load_data(&file_store(800, None)).unwrap();
        assert!(p.provider().is_oneshot());

        let mut allocator = MockAllocator::new();
        p.change(&mut allocator, 80, 0);
        assert_eq!(p.instances(), 1);

        // The voice finishes on its own; the off edge issues no stop call.
        p.change(&mut allocator, 0, 80);
        assert_eq!(p.instances(), 0);
        assert_eq!(allocator.stops(), 0);
    }

    #[test]
    fn test_tremulant_hot_swap() {
        let mut p = loaded_pipe();
        let mut allocator = MockAllocator::new();
        p.change(&mut allocator, 80, 0);

        p.set_tremulant(&mut allocator, true);
        assert!(p.is_tremulant());
        assert_eq!(p.provider().active_sample_group(), 1);
        assert!(matches!(
            allocator.calls.last(),
            Some(AllocatorCall::SwitchSample { .. })
        ));

        // No-op when already in the requested state.
        let calls = allocator.calls.len();
        p.set_tremulant(&mut allocator, true);
        assert_eq!(allocator.calls.len(), calls);
    }

    #[test]
    fn test_abort_playback_resets_without_allocator_calls() {
        let mut p = loaded_pipe();
        let mut allocator = MockAllocator::new();
        p.change(&mut allocator, 80, 0);
        p.set_tremulant(&mut allocator, true);
        let calls = allocator.calls.len();

        p.abort_playback();
        assert!(!p.is_sounding());
        assert!(!p.is_tremulant());
        assert_eq!(p.provider().active_sample_group(), 0);
        assert_eq!(allocator.calls.len(), calls);
    }

    #[test]
    fn test_harmonic_number_zero_fails_with_field_error() {
        let mut p = pipe();
        let mut cfg = looped_config();
        cfg.set("Rank001", "Pipe001HarmonicNumber", "0");
        let err = p.load(&cfg, "Rank001", "Pipe001").unwrap_err();
        match err {
            LoadError::ConfigField { key, .. } => {
                assert_eq!(key, "Pipe001HarmonicNumber");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_carries_rank_and_pipe_context() {
        let mut p = pipe();
        p.load(&looped_config(), "Rank001", "Pipe001").unwrap();
        let err = p.load_data(&MemoryFileStore::new()).unwrap_err();
        match err {
            LoadError::File { rank, pipe, .. } => {
                assert_eq!(&*rank, "Principal 8");
                assert_eq!(pipe, "Pipe001");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!p.provider().is_loaded());
    }

    #[test]
    fn test_amplitude_and_tuning_reach_playback_params() {
        let mut p = loaded_pipe();

        p.set_amplitude(50.0);
        assert!((p.provider().playback_params().amplitude - 0.5).abs() < 1e-6);

        p.set_tuning(50.0);
        // Recorded key 60 at target 60, harmonic 8: the concert pitch
        // correction vanishes and the user tuning passes through.
        assert!((p.provider().playback_params().pitch_cents - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_temperament_offset_applies_per_pitch_class() {
        let mut p = loaded_pipe();
        let mut offsets = [0.0f32; 12];
        offsets[0] = 10.0; // key 60 is pitch class 0
        p.set_temperament(&Temperament::new("Test", offsets));
        assert!((p.provider().playback_params().pitch_cents - 10.0).abs() < 1e-3);

        p.set_temperament(&Temperament::original());
        assert!(p.provider().playback_params().pitch_cents.abs() < 1e-3);
    }

    #[test]
    fn test_cache_round_trip_is_identical() {
        let cache = MemoryCache::new();
        let original = loaded_pipe();
        assert!(original.save_cache(&cache).unwrap());

        let mut restored = pipe();
        restored.load(&looped_config(), "Rank001", "Pipe001").unwrap();
        assert!(restored.load_cache(&cache).unwrap());

        assert_eq!(original.provider().attacks(), restored.provider().attacks());
        assert_eq!(
            original.provider().releases(),
            restored.provider().releases()
        );
        assert_eq!(
            original.provider().is_oneshot(),
            restored.provider().is_oneshot()
        );
        assert_eq!(
            original.provider().velocity_volume_range(),
            restored.provider().velocity_volume_range()
        );
    }

    #[test]
    fn test_corrupt_cache_entry_is_a_miss() {
        let cache = MemoryCache::new();
        let original = loaded_pipe();
        original.save_cache(&cache).unwrap();
        cache.corrupt(&original.fingerprint(), vec![0xde, 0xad]);

        let mut restored = pipe();
        restored.load(&looped_config(), "Rank001", "Pipe001").unwrap();
        assert!(!restored.load_cache(&cache).unwrap());
        assert!(!restored.provider().is_loaded());
    }

    #[test]
    fn test_save_cache_skipped_when_not_loaded() {
        let cache = MemoryCache::new();
        let mut p = pipe();
        p.load(&looped_config(), "Rank001", "Pipe001").unwrap();
        assert!(!p.save_cache(&cache).unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fingerprint_ignores_irrelevant_fields() {
        let mut a = pipe();
        a.load(&looped_config(), "Rank001", "Pipe001").unwrap();

        // Amplitude and retuning do not affect decoded output.
        let mut cfg = looped_config();
        cfg.set("Rank001", "Pipe001AmplitudeLevel", "85")
            .set("Rank001", "Pipe001AcceptsRetuning", "N");
        let mut b = pipe();
        b.load(&cfg, "Rank001", "Pipe001").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        // Bit depth does.
        let mut cfg = looped_config();
        cfg.set("Rank001", "Pipe001BitsPerSample", "8");
        let mut c = pipe();
        c.load(&cfg, "Rank001", "Pipe001").unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_validate_flags_missing_release() {
        let mut p = pipe();
        let mut cfg = looped_config();
        // Keep only the looped attack, no release material after the loop.
        cfg.set("Rank001", "Pipe001LoadRelease", "N");
        p.load(&cfg, "Rank001", "Pipe001").unwrap();
        p.load_data(&file_store(2000, Some((60, 0)))).unwrap();

        let findings = p.validate(true);
        assert!(findings.contains(&Diagnostic::MissingRelease));
        assert!(p.validate(false).is_empty());
    }

    #[test]
    fn test_validate_warns_on_missing_pitch_metadata() {
        let mut p = pipe();
        p.load(&looped_config(), "Rank001", "Pipe001").unwrap();
        p.load_data(&file_store(2000, None)).unwrap();
        let findings = p.validate(true);
        assert!(findings.contains(&Diagnostic::NoPitchInformation));

        // An explicit key override silences the warning.
        let mut cfg = looped_config();
        cfg.set("Rank001", "Pipe001MIDIKeyNumber", "60");
        let mut q = pipe();
        q.load(&cfg, "Rank001", "Pipe001").unwrap();
        q.load_data(&file_store(2000, None)).unwrap();
        assert!(!q.validate(true).contains(&Diagnostic::NoPitchInformation));
    }

    #[test]
    fn test_validate_flags_extreme_retune_offset() {
        let mut p = pipe();
        let mut cfg = looped_config();
        // Harmonic 1 sounds three octaves below 8': a 36-semitone offset.
        cfg.set("Rank001", "Pipe001HarmonicNumber", "1");
        p.load(&cfg, "Rank001", "Pipe001").unwrap();
        p.load_data(&file_store(2000, Some((60, 0)))).unwrap();

        let findings = p.validate(true);
        assert!(findings
            .iter()
            .any(|f| matches!(f, Diagnostic::RetuneError { .. })));
    }

    #[test]
    fn test_ignore_pitch_does_not_suppress_retune_diagnostics() {
        let mut p = pipe();
        let mut cfg = looped_config();
        cfg.set("Rank001", "Pipe001HarmonicNumber", "1")
            .set("Rank001", "Pipe001IgnorePitch", "Y");
        p.load(&cfg, "Rank001", "Pipe001").unwrap();
        p.load_data(&file_store(2000, Some((60, 0)))).unwrap();

        // IgnorePitch only disables pitch tracking; the load-time offset
        // check still runs while retuning is enabled.
        let findings = p.validate(true);
        assert!(findings
            .iter()
            .any(|f| matches!(f, Diagnostic::RetuneError { .. })));
    }

    #[test]
    fn test_temperament_offset_requires_retune() {
        let mut p = pipe();
        let mut cfg = looped_config();
        cfg.set("Rank001", "Pipe001AcceptsRetuning", "N");
        p.load(&cfg, "Rank001", "Pipe001").unwrap();
        p.load_data(&file_store(2000, Some((60, 0)))).unwrap();

        let mut offsets = [0.0f32; 12];
        offsets[0] = 10.0;
        p.set_temperament(&Temperament::new("Test", offsets));
        assert!(p.provider().playback_params().pitch_cents.abs() < 1e-3);
    }

    #[test]
    fn test_zero_channels_short_circuits_validation() {
        let mut p = SoundingPipe::new(
            Arc::from("Principal 8"),
            60,
            1,
            Arc::new(RankDefaults::default()),
            Arc::new(OrganDefaults {
                channels: 0,
                ..OrganDefaults::default()
            }),
        );
        p.load(&looped_config(), "Rank001", "Pipe001").unwrap();
        p.load_data(&MemoryFileStore::new()).unwrap();
        assert!(p.validate(true).is_empty());
    }

    #[test]
    fn test_init_builds_default_attack() {
        let mut p = pipe();
        p.init("Pipe001", SampleRef::Path("samples/c2.wav".to_string()), false);
        p.load_data(&file_store(600, None)).unwrap();
        assert_eq!(p.provider().attacks().len(), 1);
        assert!(p.provider().is_oneshot());
    }
}
