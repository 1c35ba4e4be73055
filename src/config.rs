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

//! Definition-file key/value boundary.
//!
//! The organ-definition parser lives outside this crate; what this crate owns
//! is the bounded-read contract: every numeric field is read with an explicit
//! `(min, max)` bound and an optional default, and any out-of-range or
//! malformed value fails the enclosing load with a field-identified error.

mod memory;
mod reader;

pub use memory::MemoryConfig;
pub use reader::{ConfigReader, ConfigWriter};
