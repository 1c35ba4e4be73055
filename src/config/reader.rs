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

//! Bounded read accessors over a raw key/value source.
//!
//! Implementors supply only `raw_value`; the bounded accessors are shared so
//! every source enforces ranges and defaults identically. There is no silent
//! clamping anywhere: an out-of-range value is an error naming the field.

use crate::error::{FieldError, LoadError};

/// Read access to one organ-definition section, keyed by `(group, key)`.
pub trait ConfigReader {
    /// Returns the raw string for a key, or `None` when the key is absent.
    fn raw_value(&self, group: &str, key: &str) -> Option<String>;

    /// Reads a whitespace-trimmed string. `None` default means required.
    fn read_string_trim(
        &self,
        group: &str,
        key: &str,
        default: Option<&str>,
    ) -> Result<String, LoadError> {
        match self.raw_value(group, key) {
            Some(v) => Ok(v.trim().to_string()),
            None => match default {
                Some(d) => Ok(d.to_string()),
                None => Err(field_error(group, key, FieldError::Missing)),
            },
        }
    }

    /// Reads a sample file reference. Always required; the definition format
    /// uses backslash separators which are normalized here.
    fn read_file_name(&self, group: &str, key: &str) -> Result<String, LoadError> {
        let name = self.read_string_trim(group, key, None)?;
        Ok(name.replace('\\', "/"))
    }

    /// Reads an integer with an inclusive bound. `None` default means the
    /// key is required.
    fn read_integer(
        &self,
        group: &str,
        key: &str,
        min: i64,
        max: i64,
        default: Option<i64>,
    ) -> Result<i64, LoadError> {
        let raw = match self.raw_value(group, key) {
            Some(v) => v,
            None => {
                return match default {
                    Some(d) => Ok(d),
                    None => Err(field_error(group, key, FieldError::Missing)),
                }
            }
        };
        let value: i64 = raw.trim().parse().map_err(|_| {
            field_error(
                group,
                key,
                FieldError::Malformed {
                    value: raw.clone(),
                    expected: "integer",
                },
            )
        })?;
        if value < min || value > max {
            return Err(field_error(
                group,
                key,
                FieldError::OutOfRange { value, min, max },
            ));
        }
        Ok(value)
    }

    /// Reads a float with an inclusive bound.
    fn read_float(
        &self,
        group: &str,
        key: &str,
        min: f32,
        max: f32,
        default: Option<f32>,
    ) -> Result<f32, LoadError> {
        let raw = match self.raw_value(group, key) {
            Some(v) => v,
            None => {
                return match default {
                    Some(d) => Ok(d),
                    None => Err(field_error(group, key, FieldError::Missing)),
                }
            }
        };
        let value: f32 = raw.trim().parse().map_err(|_| {
            field_error(
                group,
                key,
                FieldError::Malformed {
                    value: raw.clone(),
                    expected: "number",
                },
            )
        })?;
        if !value.is_finite() || value < min || value > max {
            return Err(field_error(
                group,
                key,
                FieldError::FloatOutOfRange { value, min, max },
            ));
        }
        Ok(value)
    }

    /// Reads a boolean. Accepts `Y`/`N` (the definition format) as well as
    /// `true`/`false`.
    fn read_boolean(
        &self,
        group: &str,
        key: &str,
        default: Option<bool>,
    ) -> Result<bool, LoadError> {
        let raw = match self.raw_value(group, key) {
            Some(v) => v,
            None => {
                return match default {
                    Some(d) => Ok(d),
                    None => Err(field_error(group, key, FieldError::Missing)),
                }
            }
        };
        match raw.trim() {
            "Y" | "y" | "true" => Ok(true),
            "N" | "n" | "false" => Ok(false),
            other => Err(field_error(
                group,
                key,
                FieldError::Malformed {
                    value: other.to_string(),
                    expected: "boolean (Y/N)",
                },
            )),
        }
    }
}

/// Write access for saving adjusted settings back to a combination file.
pub trait ConfigWriter {
    fn write_string(&mut self, group: &str, key: &str, value: &str);

    fn write_float(&mut self, group: &str, key: &str, value: f32) {
        self.write_string(group, key, &format!("{value}"));
    }

    fn write_integer(&mut self, group: &str, key: &str, value: i64) {
        self.write_string(group, key, &format!("{value}"));
    }

    fn write_boolean(&mut self, group: &str, key: &str, value: bool) {
        self.write_string(group, key, if value { "Y" } else { "N" });
    }
}

fn field_error(group: &str, key: &str, reason: FieldError) -> LoadError {
    LoadError::ConfigField {
        group: group.to_string(),
        key: key.to_string(),
        reason,
    }
}
