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

//! Load descriptors for attack and release segments.
//!
//! Parsing is purely declarative: it builds descriptors from the definition
//! file and never touches audio data. All integer fields carry an explicit
//! inclusive bound; loop ends must strictly exceed loop starts, enforced
//! here rather than deferred to decode time.

use serde::{Deserialize, Serialize};

use crate::config::ConfigReader;
use crate::error::LoadError;

/// Upper bound on any sample position in the definition file
/// (one hour of audio at 44.1 kHz).
pub const MAX_SAMPLE_LENGTH: i64 = 158_760_000;

/// Applicability window of a segment with respect to the tremulant state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleGroup {
    /// Usable whether or not the tremulant is active.
    Any,
    /// Only when the tremulant is off.
    Normal,
    /// Only when the tremulant is on.
    Tremulant,
}

impl SampleGroup {
    fn read(cfg: &impl ConfigReader, group: &str, key: &str) -> Result<Self, LoadError> {
        Ok(match cfg.read_integer(group, key, -1, 1, Some(-1))? {
            0 => SampleGroup::Normal,
            1 => SampleGroup::Tremulant,
            _ => SampleGroup::Any,
        })
    }

    /// Encoding used by the definition format and the cache fingerprint.
    pub fn as_i8(self) -> i8 {
        match self {
            SampleGroup::Any => -1,
            SampleGroup::Normal => 0,
            SampleGroup::Tremulant => 1,
        }
    }

    /// Whether a segment in this group serves the given tremulant selector
    /// (0 = normal, 1 = tremulant).
    pub fn serves(self, selector: u8) -> bool {
        match self {
            SampleGroup::Any => true,
            SampleGroup::Normal => selector == 0,
            SampleGroup::Tremulant => selector == 1,
        }
    }
}

/// Reference to the audio bytes of a segment: a file path relative to the
/// organ package, or a resource embedded in the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRef {
    Path(String),
    Resource(String),
}

impl SampleRef {
    pub fn as_str(&self) -> &str {
        match self {
            SampleRef::Path(p) => p,
            SampleRef::Resource(r) => r,
        }
    }
}

/// One sustained loop within an attack segment. Invariant: `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopRegion {
    pub start: u32,
    pub end: u32,
}

impl LoopRegion {
    /// Loop length in frames.
    pub fn frames(&self) -> u32 {
        self.end - self.start
    }
}

/// One attack segment of a pipe: the onset recording, its applicability
/// window and its loop table.
#[derive(Debug, Clone)]
pub struct AttackDescriptor {
    pub file: SampleRef,
    pub sample_group: SampleGroup,
    /// Whether the release portion of this file should be loaded too.
    pub load_release: bool,
    /// Marks the segment as self-terminating.
    pub percussive: bool,
    /// Maximum key-press time this attack applies to; -1 = unbounded.
    pub max_playback_time_ms: i32,
    /// Release alignment cue; -1 = unset.
    pub cue_point: i32,
    /// Minimum velocity for this attack to be selected.
    pub min_attack_velocity: u8,
    /// Maximum time since the last release for this attack to be selected;
    /// -1 = unbounded.
    pub max_released_time_ms: i32,
    /// First frame of the attack within the file.
    pub attack_start: u32,
    /// Last frame of the embedded release; -1 = end of file.
    pub release_end: i32,
    pub loops: Vec<LoopRegion>,
}

impl AttackDescriptor {
    /// Parses one attack section. `prefix` is both the filename key and the
    /// prefix of every per-attack field (`IsTremulant`, `LoopCount`, ...).
    pub fn parse(
        cfg: &impl ConfigReader,
        group: &str,
        prefix: &str,
        percussive: bool,
    ) -> Result<Self, LoadError> {
        let file = SampleRef::Path(cfg.read_file_name(group, prefix)?);
        let sample_group = SampleGroup::read(cfg, group, &format!("{prefix}IsTremulant"))?;
        let load_release = cfg.read_boolean(
            group,
            &format!("{prefix}LoadRelease"),
            Some(!percussive),
        )?;
        let max_playback_time_ms = cfg.read_integer(
            group,
            &format!("{prefix}MaxKeyPressTime"),
            -1,
            100_000,
            Some(-1),
        )? as i32;
        let cue_point = cfg.read_integer(
            group,
            &format!("{prefix}CuePoint"),
            -1,
            MAX_SAMPLE_LENGTH,
            Some(-1),
        )? as i32;
        let min_attack_velocity =
            cfg.read_integer(group, &format!("{prefix}AttackVelocity"), 0, 127, Some(0))? as u8;
        let max_released_time_ms = cfg.read_integer(
            group,
            &format!("{prefix}MaxTimeSinceLastRelease"),
            -1,
            100_000,
            Some(-1),
        )? as i32;
        let attack_start = cfg.read_integer(
            group,
            &format!("{prefix}AttackStart"),
            0,
            MAX_SAMPLE_LENGTH,
            Some(0),
        )? as u32;
        let release_end = cfg.read_integer(
            group,
            &format!("{prefix}ReleaseEnd"),
            -1,
            MAX_SAMPLE_LENGTH,
            Some(-1),
        )? as i32;

        let loop_count = cfg.read_integer(group, &format!("{prefix}LoopCount"), 0, 100, Some(0))?;
        let mut loops = Vec::with_capacity(loop_count as usize);
        for j in 1..=loop_count {
            let start = cfg.read_integer(
                group,
                &format!("{prefix}Loop{j:03}Start"),
                0,
                MAX_SAMPLE_LENGTH,
                Some(0),
            )? as u32;
            // The end is required and its lower bound is start + 1, so a
            // loop with end <= start fails at parse time.
            let end = cfg.read_integer(
                group,
                &format!("{prefix}Loop{j:03}End"),
                i64::from(start) + 1,
                MAX_SAMPLE_LENGTH,
                None,
            )? as u32;
            loops.push(LoopRegion { start, end });
        }

        Ok(Self {
            file,
            sample_group,
            load_release,
            percussive,
            max_playback_time_ms,
            cue_point,
            min_attack_velocity,
            max_released_time_ms,
            attack_start,
            release_end,
            loops,
        })
    }

    /// Builds the implicit default attack used when a pipe is defined by a
    /// bare file reference with no indexed sections.
    pub fn default_for(file: SampleRef, percussive: bool) -> Self {
        Self {
            file,
            sample_group: SampleGroup::Any,
            load_release: !percussive,
            percussive,
            max_playback_time_ms: -1,
            cue_point: -1,
            min_attack_velocity: 0,
            max_released_time_ms: -1,
            attack_start: 0,
            release_end: -1,
            loops: Vec::new(),
        }
    }
}

/// One standalone release segment, independent from the attack table.
#[derive(Debug, Clone)]
pub struct ReleaseDescriptor {
    pub file: SampleRef,
    pub sample_group: SampleGroup,
    /// Maximum key-press time this release applies to; -1 = default/fallback.
    pub max_playback_time_ms: i32,
    pub cue_point: i32,
    pub release_end: i32,
}

impl ReleaseDescriptor {
    pub fn parse(cfg: &impl ConfigReader, group: &str, prefix: &str) -> Result<Self, LoadError> {
        Ok(Self {
            file: SampleRef::Path(cfg.read_file_name(group, prefix)?),
            sample_group: SampleGroup::read(cfg, group, &format!("{prefix}IsTremulant"))?,
            max_playback_time_ms: cfg.read_integer(
                group,
                &format!("{prefix}MaxKeyPressTime"),
                -1,
                100_000,
                Some(-1),
            )? as i32,
            cue_point: cfg.read_integer(
                group,
                &format!("{prefix}CuePoint"),
                -1,
                MAX_SAMPLE_LENGTH,
                Some(-1),
            )? as i32,
            release_end: cfg.read_integer(
                group,
                &format!("{prefix}ReleaseEnd"),
                -1,
                MAX_SAMPLE_LENGTH,
                Some(-1),
            )? as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;

    fn attack_config() -> MemoryConfig {
        let mut cfg = MemoryConfig::new();
        cfg.set("Rank001", "Pipe001", "samples/c2.wav")
            .set("Rank001", "Pipe001IsTremulant", "0")
            .set("Rank001", "Pipe001MaxKeyPressTime", "2500")
            .set("Rank001", "Pipe001AttackVelocity", "64")
            .set("Rank001", "Pipe001LoopCount", "2")
            .set("Rank001", "Pipe001Loop001Start", "4000")
            .set("Rank001", "Pipe001Loop001End", "9000")
            .set("Rank001", "Pipe001Loop002Start", "10000")
            .set("Rank001", "Pipe001Loop002End", "15000");
        cfg
    }

    #[test]
    fn test_parse_attack() {
        let cfg = attack_config();
        let attack = AttackDescriptor::parse(&cfg, "Rank001", "Pipe001", false).unwrap();

        assert_eq!(attack.file.as_str(), "samples/c2.wav");
        assert_eq!(attack.sample_group, SampleGroup::Normal);
        assert!(attack.load_release);
        assert_eq!(attack.max_playback_time_ms, 2500);
        assert_eq!(attack.cue_point, -1);
        assert_eq!(attack.min_attack_velocity, 64);
        assert_eq!(attack.max_released_time_ms, -1);
        assert_eq!(
            attack.loops,
            vec![
                LoopRegion { start: 4000, end: 9000 },
                LoopRegion { start: 10000, end: 15000 },
            ]
        );
    }

    #[test]
    fn test_loop_end_must_exceed_start() {
        let mut cfg = attack_config();
        cfg.set("Rank001", "Pipe001LoopCount", "1")
            .set("Rank001", "Pipe001Loop001Start", "4000")
            .set("Rank001", "Pipe001Loop001End", "4000");
        let err = AttackDescriptor::parse(&cfg, "Rank001", "Pipe001", false).unwrap_err();
        match err {
            crate::error::LoadError::ConfigField { key, .. } => {
                assert_eq!(key, "Pipe001Loop001End");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_loop_end_is_required() {
        let mut cfg = attack_config();
        cfg.set("Rank001", "Pipe001LoopCount", "3");
        // Loop003 has no end defined.
        cfg.set("Rank001", "Pipe001Loop003Start", "16000");
        assert!(AttackDescriptor::parse(&cfg, "Rank001", "Pipe001", false).is_err());
    }

    #[test]
    fn test_percussive_defaults_skip_release() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Rank001", "Pipe001", "samples/c2.wav");
        let attack = AttackDescriptor::parse(&cfg, "Rank001", "Pipe001", true).unwrap();
        assert!(!attack.load_release);
        assert!(attack.percussive);
    }

    #[test]
    fn test_parse_release() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Rank001", "Pipe001Release001", "samples/c2_rel.wav")
            .set("Rank001", "Pipe001Release001IsTremulant", "1")
            .set("Rank001", "Pipe001Release001MaxKeyPressTime", "800");
        let release =
            ReleaseDescriptor::parse(&cfg, "Rank001", "Pipe001Release001").unwrap();
        assert_eq!(release.file.as_str(), "samples/c2_rel.wav");
        assert_eq!(release.sample_group, SampleGroup::Tremulant);
        assert_eq!(release.max_playback_time_ms, 800);
        assert_eq!(release.release_end, -1);
    }

    #[test]
    fn test_sample_group_serves() {
        assert!(SampleGroup::Any.serves(0));
        assert!(SampleGroup::Any.serves(1));
        assert!(SampleGroup::Normal.serves(0));
        assert!(!SampleGroup::Normal.serves(1));
        assert!(SampleGroup::Tremulant.serves(1));
        assert!(!SampleGroup::Tremulant.serves(0));
    }
}
