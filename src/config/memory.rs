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

//! In-memory key/value source, used by tests and for definitions assembled
//! programmatically (e.g. the demo organ shipped with the application).

use std::collections::HashMap;

use super::reader::{ConfigReader, ConfigWriter};

/// A `HashMap`-backed definition source.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfig {
    values: HashMap<(String, String), String>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, replacing any previous one.
    pub fn set(&mut self, group: &str, key: &str, value: &str) -> &mut Self {
        self.values
            .insert((group.to_string(), key.to_string()), value.to_string());
        self
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the stored value for a key, if any. Used by tests to inspect
    /// what a save pass emitted.
    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        self.values
            .get(&(group.to_string(), key.to_string()))
            .map(String::as_str)
    }
}

impl ConfigReader for MemoryConfig {
    fn raw_value(&self, group: &str, key: &str) -> Option<String> {
        self.values
            .get(&(group.to_string(), key.to_string()))
            .cloned()
    }
}

impl ConfigWriter for MemoryConfig {
    fn write_string(&mut self, group: &str, key: &str, value: &str) {
        self.set(group, key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;

    #[test]
    fn test_read_integer_bounds() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Pipe001", "HarmonicNumber", "8");

        assert_eq!(
            cfg.read_integer("Pipe001", "HarmonicNumber", 1, 1024, None)
                .unwrap(),
            8
        );

        // Out of range fails with the field identified, no clamping.
        cfg.set("Pipe001", "HarmonicNumber", "0");
        let err = cfg
            .read_integer("Pipe001", "HarmonicNumber", 1, 1024, None)
            .unwrap_err();
        match err {
            LoadError::ConfigField { group, key, .. } => {
                assert_eq!(group, "Pipe001");
                assert_eq!(key, "HarmonicNumber");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_integer_missing_without_default() {
        let cfg = MemoryConfig::new();
        assert!(cfg.read_integer("Pipe001", "CuePoint", -1, 100, None).is_err());
        assert_eq!(
            cfg.read_integer("Pipe001", "CuePoint", -1, 100, Some(-1))
                .unwrap(),
            -1
        );
    }

    #[test]
    fn test_read_integer_malformed() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Pipe001", "LoopCount", "three");
        assert!(cfg
            .read_integer("Pipe001", "LoopCount", 0, 100, Some(0))
            .is_err());
    }

    #[test]
    fn test_read_boolean_forms() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Pipe001", "Percussive", "Y");
        assert!(cfg.read_boolean("Pipe001", "Percussive", None).unwrap());
        cfg.set("Pipe001", "Percussive", "N");
        assert!(!cfg.read_boolean("Pipe001", "Percussive", None).unwrap());
        cfg.set("Pipe001", "Percussive", "maybe");
        assert!(cfg.read_boolean("Pipe001", "Percussive", None).is_err());
    }

    #[test]
    fn test_read_float_rejects_non_finite() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Pipe001", "PitchCorrection", "NaN");
        assert!(cfg
            .read_float("Pipe001", "PitchCorrection", -1800.0, 1800.0, Some(0.0))
            .is_err());
    }

    #[test]
    fn test_read_file_name_normalizes_separators() {
        let mut cfg = MemoryConfig::new();
        cfg.set("Pipe001", "Attack001", "samples\\008\\c.wav");
        assert_eq!(
            cfg.read_file_name("Pipe001", "Attack001").unwrap(),
            "samples/008/c.wav"
        );
    }
}
