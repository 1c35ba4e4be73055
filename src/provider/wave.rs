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

//! WAV decoding and the file/resource store boundary.
//!
//! Samples are decoded through `hound` into interleaved f32. The RIFF `smpl`
//! chunk (MIDI unity note and pitch fraction, written by most sample-set
//! tools) is not exposed by `hound`, so a small chunk scan recovers it from
//! the raw bytes.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;

use hound::WavReader;

use crate::pipe::descriptor::SampleRef;

/// Error decoding or resolving a referenced sample file.
#[derive(Debug, thiserror::Error)]
pub enum WaveError {
    #[error("audio file error: {0}")]
    Wav(#[from] hound::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown sample resource {0:?}")]
    UnknownResource(String),

    #[error("{0}")]
    Format(String),
}

/// Resolves a logical sample reference to raw file bytes. The organ package
/// layer implements this; the engine never walks the filesystem itself.
pub trait FileStore {
    fn read(&self, sample: &SampleRef) -> Result<Vec<u8>, WaveError>;
}

/// File store rooted at an organ package directory. Embedded resources are
/// not available through this store.
#[derive(Debug, Clone)]
pub struct DiskFileStore {
    base: PathBuf,
}

impl DiskFileStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl FileStore for DiskFileStore {
    fn read(&self, sample: &SampleRef) -> Result<Vec<u8>, WaveError> {
        match sample {
            SampleRef::Path(p) => Ok(std::fs::read(self.base.join(p))?),
            SampleRef::Resource(r) => Err(WaveError::UnknownResource(r.clone())),
        }
    }
}

/// In-memory file store for embedded demo resources and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, bytes: Vec<u8>) -> &mut Self {
        self.files.insert(name.to_string(), bytes);
        self
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, sample: &SampleRef) -> Result<Vec<u8>, WaveError> {
        self.files
            .get(sample.as_str())
            .cloned()
            .ok_or_else(|| WaveError::UnknownResource(sample.as_str().to_string()))
    }
}

/// A decoded wave: interleaved f32 plus the pitch metadata recovered from
/// the recording itself.
#[derive(Debug, Clone)]
pub struct WaveData {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    /// MIDI unity note from the `smpl` chunk; 0 when absent.
    pub midi_key_number: u8,
    /// Sub-semitone pitch of the recording in cents; 0 when absent.
    pub midi_pitch_fraction_cents: f32,
}

impl WaveData {
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }
}

/// Decodes a WAV file from raw bytes.
pub fn decode_wave(bytes: &[u8]) -> Result<WaveData, WaveError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let (midi_key_number, midi_pitch_fraction_cents) = scan_smpl_chunk(bytes).unwrap_or((0, 0.0));

    Ok(WaveData {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        midi_key_number,
        midi_pitch_fraction_cents,
    })
}

/// Scans the RIFF chunk list for a `smpl` chunk and extracts the MIDI unity
/// note and pitch fraction. Returns `None` when the chunk is absent or the
/// container is too malformed to walk (hound will report real corruption).
fn scan_smpl_chunk(bytes: &[u8]) -> Option<(u8, f32)> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().ok()?) as usize;
        let data_start = pos + 8;
        let data_end = data_start.checked_add(size)?;
        if data_end > bytes.len() {
            return None;
        }
        if id == b"smpl" && size >= 20 {
            let unity =
                u32::from_le_bytes(bytes[data_start + 12..data_start + 16].try_into().ok()?);
            let fraction =
                u32::from_le_bytes(bytes[data_start + 16..data_start + 20].try_into().ok()?);
            // The pitch fraction is a 32-bit fixed-point fraction of a
            // semitone; convert to cents.
            let cents = (fraction as f64 / 4_294_967_296.0 * 100.0) as f32;
            return Some((unity.min(127) as u8, cents));
        }
        // Chunks are word-aligned.
        pos = data_end + (size & 1);
    }
    None
}

#[cfg(test)]
pub(crate) mod testdata {
    //! Fixture WAV construction used across the provider and cache tests.

    use std::io::Cursor;

    /// Builds a 16-bit mono WAV from frame values, optionally appending a
    /// `smpl` chunk carrying the given unity note and pitch fraction.
    pub fn wav_bytes(frames: &[i16], sample_rate: u32, smpl: Option<(u8, u32)>) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &frame in frames {
                writer.write_sample(frame).unwrap();
            }
            writer.finalize().unwrap();
        }
        let mut bytes = cursor.into_inner();

        if let Some((unity, fraction)) = smpl {
            let mut chunk = Vec::with_capacity(8 + 36);
            chunk.extend_from_slice(b"smpl");
            chunk.extend_from_slice(&36u32.to_le_bytes());
            chunk.extend_from_slice(&[0u8; 12]); // manufacturer, product, period
            chunk.extend_from_slice(&u32::from(unity).to_le_bytes());
            chunk.extend_from_slice(&fraction.to_le_bytes());
            chunk.extend_from_slice(&[0u8; 16]); // SMPTE, loop count, sampler data
            bytes.extend_from_slice(&chunk);

            // Patch the RIFF size to cover the appended chunk.
            let riff_size = (bytes.len() - 8) as u32;
            bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());
        }
        bytes
    }
}
