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

//! Effective pipe parameters resolved through a cascade.
//!
//! A pipe-level explicit value wins, otherwise the rank-level value, otherwise
//! the organ-wide default. Effective values are derived on demand through
//! [`resolve`] and never stored redundantly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigReader, ConfigWriter};
use crate::error::{FieldError, LoadError};

/// Which loops of an attack file are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopLoadPolicy {
    First,
    Longest,
    All,
}

/// Which attack/release segments of a pipe are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionLoadPolicy {
    First,
    All,
}

/// Organ-wide defaults, the bottom of the cascade.
#[derive(Debug, Clone)]
pub struct OrganDefaults {
    pub amplitude: f32,
    pub gain_db: f32,
    pub tuning_cents: f32,
    pub bits_per_sample: u8,
    pub channels: u8,
    pub compress: bool,
    pub loop_load: LoopLoadPolicy,
    pub attack_load: SectionLoadPolicy,
    pub release_load: SectionLoadPolicy,
    pub delay_ms: u32,
    pub release_tail_ms: u32,
    pub audio_group: u8,
    pub ignore_pitch: bool,
}

impl Default for OrganDefaults {
    fn default() -> Self {
        Self {
            amplitude: 100.0,
            gain_db: 0.0,
            tuning_cents: 0.0,
            bits_per_sample: 16,
            channels: 2,
            compress: false,
            loop_load: LoopLoadPolicy::All,
            attack_load: SectionLoadPolicy::All,
            release_load: SectionLoadPolicy::All,
            delay_ms: 0,
            release_tail_ms: 0,
            audio_group: 0,
            ignore_pitch: false,
        }
    }
}

/// Rank-level overrides sitting between the organ defaults and the pipe.
#[derive(Debug, Clone, Default)]
pub struct RankDefaults {
    pub amplitude: Option<f32>,
    pub gain_db: Option<f32>,
    pub tuning_cents: Option<f32>,
    pub bits_per_sample: Option<u8>,
    pub channels: Option<u8>,
    pub compress: Option<bool>,
    pub loop_load: Option<LoopLoadPolicy>,
    pub attack_load: Option<SectionLoadPolicy>,
    pub release_load: Option<SectionLoadPolicy>,
    pub delay_ms: Option<u32>,
    pub release_tail_ms: Option<u32>,
    pub audio_group: Option<u8>,
    pub ignore_pitch: Option<bool>,
}

/// The cascade itself: pipe override, else rank override, else default.
pub fn resolve<T: Copy>(pipe: Option<T>, rank: Option<T>, default: T) -> T {
    pipe.or(rank).unwrap_or(default)
}

/// Capability interface for the single observer relationship in the engine:
/// whoever owns derived playback scalars reacts to amplitude/tuning changes
/// before the next playback-affecting read.
pub trait PipeUpdateListener {
    fn on_amplitude_changed(&mut self);
    fn on_tuning_changed(&mut self);
}

/// Per-pipe parameter node. Loaded values become the defaults; live user
/// adjustment moves `amplitude`/`tuning` away from them, and `save` only
/// writes back what differs.
#[derive(Debug, Clone)]
pub struct PipeConfigNode {
    shared: Arc<RankDefaults>,
    organ: Arc<OrganDefaults>,

    amplitude: f32,
    default_amplitude: f32,
    tuning_cents: f32,
    default_tuning_cents: f32,

    gain_db: Option<f32>,
    /// ODF-declared tuning baseline, removed again in equal-temperament math.
    pitch_tuning_cents: f32,
    bits_per_sample: Option<u8>,
    channels: Option<u8>,
    compress: Option<bool>,
    loop_load: Option<LoopLoadPolicy>,
    attack_load: Option<SectionLoadPolicy>,
    release_load: Option<SectionLoadPolicy>,
    delay_ms: Option<u32>,
    release_tail_ms: Option<u32>,
    audio_group: Option<u8>,
    ignore_pitch: Option<bool>,
}

impl PipeConfigNode {
    pub fn new(shared: Arc<RankDefaults>, organ: Arc<OrganDefaults>) -> Self {
        let default_amplitude = resolve(None, shared.amplitude, organ.amplitude);
        let default_tuning = resolve(None, shared.tuning_cents, organ.tuning_cents);
        Self {
            shared,
            organ,
            amplitude: default_amplitude,
            default_amplitude,
            tuning_cents: default_tuning,
            default_tuning_cents: default_tuning,
            gain_db: None,
            pitch_tuning_cents: 0.0,
            bits_per_sample: None,
            channels: None,
            compress: None,
            loop_load: None,
            attack_load: None,
            release_load: None,
            delay_ms: None,
            release_tail_ms: None,
            audio_group: None,
            ignore_pitch: None,
        }
    }

    /// Parses pipe-level overrides. Every field is optional; bounds are
    /// enforced without clamping.
    pub fn load(
        &mut self,
        cfg: &impl ConfigReader,
        group: &str,
        prefix: &str,
    ) -> Result<(), LoadError> {
        self.default_amplitude = cfg.read_float(
            group,
            &format!("{prefix}AmplitudeLevel"),
            0.0,
            1000.0,
            Some(self.default_amplitude),
        )?;
        self.amplitude = self.default_amplitude;

        self.gain_db = read_optional_float(cfg, group, &format!("{prefix}Gain"), -120.0, 40.0)?;

        self.pitch_tuning_cents = cfg.read_float(
            group,
            &format!("{prefix}PitchTuning"),
            -1800.0,
            1800.0,
            Some(0.0),
        )?;
        self.default_tuning_cents = self.pitch_tuning_cents
            + resolve(None, self.shared.tuning_cents, self.organ.tuning_cents);
        self.tuning_cents = self.default_tuning_cents;

        self.bits_per_sample = match cfg.read_integer(
            group,
            &format!("{prefix}BitsPerSample"),
            -1,
            24,
            Some(-1),
        )? {
            -1 => None,
            v @ (8 | 16 | 24) => Some(v as u8),
            v => {
                return Err(LoadError::ConfigField {
                    group: group.to_string(),
                    key: format!("{prefix}BitsPerSample"),
                    reason: FieldError::Malformed {
                        value: v.to_string(),
                        expected: "8, 16 or 24",
                    },
                })
            }
        };

        self.channels =
            match cfg.read_integer(group, &format!("{prefix}Channels"), -1, 2, Some(-1))? {
                -1 => None,
                v => Some(v as u8),
            };

        self.compress = read_optional_boolean(cfg, group, &format!("{prefix}Compress"))?;

        self.loop_load =
            match cfg.read_integer(group, &format!("{prefix}LoopLoad"), -1, 2, Some(-1))? {
                -1 => None,
                0 => Some(LoopLoadPolicy::First),
                1 => Some(LoopLoadPolicy::Longest),
                _ => Some(LoopLoadPolicy::All),
            };
        self.attack_load =
            match cfg.read_integer(group, &format!("{prefix}AttackLoad"), -1, 1, Some(-1))? {
                -1 => None,
                0 => Some(SectionLoadPolicy::First),
                _ => Some(SectionLoadPolicy::All),
            };
        self.release_load =
            match cfg.read_integer(group, &format!("{prefix}ReleaseLoad"), -1, 1, Some(-1))? {
                -1 => None,
                0 => Some(SectionLoadPolicy::First),
                _ => Some(SectionLoadPolicy::All),
            };

        self.delay_ms = match cfg.read_integer(group, &format!("{prefix}Delay"), -1, 10_000, Some(-1))?
        {
            -1 => None,
            v => Some(v as u32),
        };

        self.release_tail_ms = match cfg.read_integer(
            group,
            &format!("{prefix}ReleaseTail"),
            -1,
            3_000,
            Some(-1),
        )? {
            -1 => None,
            v => Some(v as u32),
        };

        self.audio_group =
            match cfg.read_integer(group, &format!("{prefix}AudioGroup"), -1, 255, Some(-1))? {
                -1 => None,
                v => Some(v as u8),
            };

        self.ignore_pitch = read_optional_boolean(cfg, group, &format!("{prefix}IgnorePitch"))?;

        Ok(())
    }

    /// Serializes the live adjustments; only values that differ from their
    /// defaults are written unless `force_full` is set.
    pub fn save(&self, out: &mut dyn ConfigWriter, group: &str, prefix: &str, force_full: bool) {
        if force_full || self.amplitude != self.default_amplitude {
            out.write_float(group, &format!("{prefix}Amplitude"), self.amplitude);
        }
        if force_full || self.tuning_cents != self.default_tuning_cents {
            out.write_float(group, &format!("{prefix}Tuning"), self.tuning_cents);
        }
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn default_amplitude(&self) -> f32 {
        self.default_amplitude
    }

    /// Live amplitude adjustment. The caller must notify its
    /// [`PipeUpdateListener`] afterwards.
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    pub fn tuning(&self) -> f32 {
        self.tuning_cents
    }

    pub fn default_tuning(&self) -> f32 {
        self.default_tuning_cents
    }

    /// Live tuning adjustment in cents.
    pub fn set_tuning(&mut self, cents: f32) {
        self.tuning_cents = cents;
    }

    pub fn effective_amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn effective_gain_db(&self) -> f32 {
        resolve(self.gain_db, self.shared.gain_db, self.organ.gain_db)
    }

    pub fn effective_tuning(&self) -> f32 {
        self.tuning_cents
    }

    pub fn effective_pitch_tuning(&self) -> f32 {
        self.pitch_tuning_cents
    }

    pub fn effective_bits_per_sample(&self) -> u8 {
        resolve(
            self.bits_per_sample,
            self.shared.bits_per_sample,
            self.organ.bits_per_sample,
        )
    }

    pub fn effective_channels(&self) -> u8 {
        resolve(self.channels, self.shared.channels, self.organ.channels)
    }

    pub fn effective_compress(&self) -> bool {
        resolve(self.compress, self.shared.compress, self.organ.compress)
    }

    pub fn effective_loop_load(&self) -> LoopLoadPolicy {
        resolve(self.loop_load, self.shared.loop_load, self.organ.loop_load)
    }

    pub fn effective_attack_load(&self) -> SectionLoadPolicy {
        resolve(
            self.attack_load,
            self.shared.attack_load,
            self.organ.attack_load,
        )
    }

    pub fn effective_release_load(&self) -> SectionLoadPolicy {
        resolve(
            self.release_load,
            self.shared.release_load,
            self.organ.release_load,
        )
    }

    pub fn effective_delay_ms(&self) -> u32 {
        resolve(self.delay_ms, self.shared.delay_ms, self.organ.delay_ms)
    }

    pub fn effective_release_tail_ms(&self) -> u32 {
        resolve(
            self.release_tail_ms,
            self.shared.release_tail_ms,
            self.organ.release_tail_ms,
        )
    }

    pub fn effective_audio_group(&self) -> u8 {
        resolve(
            self.audio_group,
            self.shared.audio_group,
            self.organ.audio_group,
        )
    }

    pub fn effective_ignore_pitch(&self) -> bool {
        resolve(
            self.ignore_pitch,
            self.shared.ignore_pitch,
            self.organ.ignore_pitch,
        )
    }
}

/// Reads a float that may be absent (absent = inherit from the cascade).
fn read_optional_float(
    cfg: &impl ConfigReader,
    group: &str,
    key: &str,
    min: f32,
    max: f32,
) -> Result<Option<f32>, LoadError> {
    if cfg.raw_value(group, key).is_none() {
        return Ok(None);
    }
    Ok(Some(cfg.read_float(group, key, min, max, None)?))
}

/// Reads a boolean that may be absent (absent = inherit from the cascade).
fn read_optional_boolean(
    cfg: &impl ConfigReader,
    group: &str,
    key: &str,
) -> Result<Option<bool>, LoadError> {
    if cfg.raw_value(group, key).is_none() {
        return Ok(None);
    }
    Ok(Some(cfg.read_boolean(group, key, None)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;

    fn node_with(rank: RankDefaults) -> PipeConfigNode {
        PipeConfigNode::new(Arc::new(rank), Arc::new(OrganDefaults::default()))
    }

    #[test]
    fn test_resolve_cascade() {
        assert_eq!(resolve(Some(8u8), Some(24), 16), 8);
        assert_eq!(resolve(None, Some(24u8), 16), 24);
        assert_eq!(resolve(None::<u8>, None, 16), 16);
    }

    #[test]
    fn test_effective_falls_back_through_cascade() {
        let node = node_with(RankDefaults {
            bits_per_sample: Some(24),
            ..Default::default()
        });
        // Rank override wins over the organ default.
        assert_eq!(node.effective_bits_per_sample(), 24);
        // No override anywhere: organ default.
        assert_eq!(node.effective_channels(), 2);
        assert!(!node.effective_compress());
    }

    #[test]
    fn test_load_pipe_overrides() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Rank001", "Pipe001BitsPerSample", "8")
            .set("Rank001", "Pipe001Channels", "1")
            .set("Rank001", "Pipe001Compress", "Y")
            .set("Rank001", "Pipe001LoopLoad", "1")
            .set("Rank001", "Pipe001Gain", "-6")
            .set("Rank001", "Pipe001PitchTuning", "25");

        let mut node = node_with(RankDefaults::default());
        node.load(&cfg, "Rank001", "Pipe001").unwrap();

        assert_eq!(node.effective_bits_per_sample(), 8);
        assert_eq!(node.effective_channels(), 1);
        assert!(node.effective_compress());
        assert_eq!(node.effective_loop_load(), LoopLoadPolicy::Longest);
        assert_eq!(node.effective_gain_db(), -6.0);
        assert_eq!(node.effective_pitch_tuning(), 25.0);
        // The ODF baseline seeds the adjustable tuning.
        assert_eq!(node.effective_tuning(), 25.0);
    }

    #[test]
    fn test_invalid_bits_rejected() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Rank001", "Pipe001BitsPerSample", "12");
        let mut node = node_with(RankDefaults::default());
        assert!(node.load(&cfg, "Rank001", "Pipe001").is_err());
    }

    #[test]
    fn test_save_writes_only_adjusted_values() {
        let cfg = MemoryConfig::new();
        let mut node = node_with(RankDefaults::default());
        node.load(&cfg, "Rank001", "Pipe001").unwrap();

        let mut out = MemoryConfig::new();
        node.save(&mut out, "Rank001", "Pipe001", false);
        assert!(out.is_empty());

        node.set_amplitude(85.0);
        node.save(&mut out, "Rank001", "Pipe001", false);
        assert_eq!(out.get("Rank001", "Pipe001Amplitude"), Some("85"));
        assert_eq!(out.get("Rank001", "Pipe001Tuning"), None);

        let mut full = MemoryConfig::new();
        node.save(&mut full, "Rank001", "Pipe001", true);
        assert!(full.get("Rank001", "Pipe001Tuning").is_some());
    }
}
