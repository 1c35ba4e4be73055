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

//! Sample buffer construction: channel conversion, bit-depth quantization,
//! compressed storage and loop/release crossfade materialization.
//!
//! All buffer allocation here is fallible so that memory exhaustion surfaces
//! as a distinct condition instead of an abort; the orchestrator reacts to
//! it by shrinking caches, not by blaming the sample set.

use serde::{Deserialize, Serialize};

use crate::pipe::descriptor::LoopRegion;
use crate::provider::wave::WaveData;

/// Marker for a failed buffer allocation.
#[derive(Debug, thiserror::Error)]
#[error("sample buffer allocation failed")]
pub struct OutOfMemory;

/// In-memory representation of decoded audio. The compressed form stores
/// 16-bit integers at half the footprint of f32.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleData {
    F32(Vec<f32>),
    I16(Vec<i16>),
}

/// One playable, fully materialized segment buffer (interleaved).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBuffer {
    data: SampleData,
    channels: u8,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Builds a buffer from a frame range of a decoded wave, applying the
    /// effective channel count, bit depth and storage representation.
    pub fn build(
        wave: &WaveData,
        start_frame: usize,
        end_frame: usize,
        channels: u8,
        bits_per_sample: u8,
        compress: bool,
    ) -> Result<Self, OutOfMemory> {
        let src_channels = usize::from(wave.channels.max(1));
        let start = start_frame.min(wave.frames()) * src_channels;
        let end = end_frame.min(wave.frames()) * src_channels;

        let mut samples = convert_channels(&wave.samples[start..end], wave.channels, channels)?;
        quantize(&mut samples, bits_per_sample);

        let data = if compress {
            let mut ints = Vec::new();
            ints.try_reserve_exact(samples.len()).map_err(|_| OutOfMemory)?;
            ints.extend(
                samples
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16),
            );
            SampleData::I16(ints)
        } else {
            SampleData::F32(samples)
        };

        Ok(Self {
            data,
            channels,
            sample_rate: wave.sample_rate,
        })
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        let len = match &self.data {
            SampleData::F32(v) => v.len(),
            SampleData::I16(v) => v.len(),
        };
        len / usize::from(self.channels.max(1))
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.data, SampleData::I16(_))
    }

    /// Memory footprint of the stored samples in bytes.
    pub fn memory_size(&self) -> usize {
        match &self.data {
            SampleData::F32(v) => v.len() * std::mem::size_of::<f32>(),
            SampleData::I16(v) => v.len() * std::mem::size_of::<i16>(),
        }
    }

    /// Reads one sample as f32 regardless of the storage representation.
    pub fn sample(&self, frame: usize, channel: u8) -> f32 {
        let idx = frame * usize::from(self.channels) + usize::from(channel);
        match &self.data {
            SampleData::F32(v) => v.get(idx).copied().unwrap_or(0.0),
            SampleData::I16(v) => v.get(idx).map(|&s| f32::from(s) / 32767.0).unwrap_or(0.0),
        }
    }

    /// Blends the tail of a loop with the audio preceding the loop start so
    /// the end-to-start jump is seamless. `fade_frames` is shortened when the
    /// loop or its lead-in is too small to support it.
    pub fn crossfade_loop(&mut self, region: LoopRegion, fade_frames: usize) {
        let start = region.start as usize;
        let end = region.end as usize;
        if end > self.frames() || end <= start {
            return;
        }
        let fade = fade_frames.min(start).min(end - start);
        let channels = usize::from(self.channels);
        for i in 0..fade {
            let t = (i + 1) as f32 / (fade + 1) as f32;
            for ch in 0..channels {
                let out_idx = (end - fade + i) * channels + ch;
                let in_idx = (start - fade + i) * channels + ch;
                let blended = self.read_idx(out_idx) * (1.0 - t) + self.read_idx(in_idx) * t;
                self.write_idx(out_idx, blended);
            }
        }
    }

    /// Applies a fade-in ramp at the head of a release buffer, the seam the
    /// sampler lands on when crossfading out of the sustained loop.
    pub fn crossfade_head(&mut self, fade_frames: usize) {
        let fade = fade_frames.min(self.frames());
        let channels = usize::from(self.channels);
        for i in 0..fade {
            let t = (i + 1) as f32 / (fade + 1) as f32;
            for ch in 0..channels {
                let idx = i * channels + ch;
                let faded = self.read_idx(idx) * t;
                self.write_idx(idx, faded);
            }
        }
    }

    fn read_idx(&self, idx: usize) -> f32 {
        match &self.data {
            SampleData::F32(v) => v[idx],
            SampleData::I16(v) => f32::from(v[idx]) / 32767.0,
        }
    }

    fn write_idx(&mut self, idx: usize, value: f32) {
        match &mut self.data {
            SampleData::F32(v) => v[idx] = value,
            SampleData::I16(v) => v[idx] = (value.clamp(-1.0, 1.0) * 32767.0).round() as i16,
        }
    }
}

/// Converts interleaved samples between channel layouts: mono to stereo
/// duplicates, stereo to mono averages. A target of 0 channels produces an
/// empty buffer (silent pipe).
pub fn convert_channels(src: &[f32], from: u16, to: u8) -> Result<Vec<f32>, OutOfMemory> {
    let from = usize::from(from.max(1));
    let to = usize::from(to);
    let frames = src.len() / from;

    let mut out = Vec::new();
    out.try_reserve_exact(frames * to).map_err(|_| OutOfMemory)?;

    for frame in 0..frames {
        let base = frame * from;
        for ch in 0..to {
            let value = if from == 1 {
                src[base]
            } else if to < from {
                // Downmix: average all source channels.
                src[base..base + from].iter().sum::<f32>() / from as f32
            } else if ch < from {
                src[base + ch]
            } else {
                src[base]
            };
            out.push(value);
        }
    }

    Ok(out)
}

/// Quantizes samples in place to the effective bit depth. 24-bit and above
/// is treated as full precision.
pub fn quantize(samples: &mut [f32], bits_per_sample: u8) {
    if bits_per_sample >= 24 {
        return;
    }
    let scale = (1i32 << (bits_per_sample - 1)) as f32;
    for s in samples.iter_mut() {
        *s = (s.clamp(-1.0, 1.0) * scale).round() / scale;
    }
}

/// Converts a crossfade length in milliseconds to frames at a sample rate.
pub fn crossfade_frames(ms: u32, sample_rate: u32) -> usize {
    (u64::from(ms) * u64::from(sample_rate) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(samples: Vec<f32>, channels: u16) -> WaveData {
        WaveData {
            samples,
            channels,
            sample_rate: 44100,
            midi_key_number: 0,
            midi_pitch_fraction_cents: 0.0,
        }
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let out = convert_channels(&[0.1, 0.2, 0.3], 1, 2).unwrap();
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let out = convert_channels(&[1.0, 0.0, 0.0, 1.0], 2, 1).unwrap();
        assert_eq!(out, vec![0.5, 0.5]);
    }

    #[test]
    fn test_quantize_reduces_precision() {
        let mut eight = [0.12345f32];
        quantize(&mut eight, 8);
        let mut sixteen = [0.12345f32];
        quantize(&mut sixteen, 16);
        assert_ne!(eight[0], sixteen[0]);
        assert!((eight[0] - 0.12345).abs() < 1.0 / 128.0);

        let mut full = [0.12345f32];
        quantize(&mut full, 24);
        assert_eq!(full[0], 0.12345);
    }

    #[test]
    fn test_build_compressed_buffer() {
        let w = wave(vec![0.0, 0.5, -0.5, 1.0], 1);
        let buffer = SampleBuffer::build(&w, 0, 4, 1, 16, true).unwrap();
        assert!(buffer.is_compressed());
        assert_eq!(buffer.frames(), 4);
        assert!((buffer.sample(1, 0) - 0.5).abs() < 1e-3);
        assert_eq!(buffer.memory_size(), 8);
    }

    #[test]
    fn test_build_respects_frame_range() {
        let w = wave(vec![0.1, 0.2, 0.3, 0.4], 1);
        let buffer = SampleBuffer::build(&w, 1, 3, 1, 24, false).unwrap();
        assert_eq!(buffer.frames(), 2);
        assert!((buffer.sample(0, 0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_crossfade_loop_blends_tail() {
        // Constant 1.0 before the loop, constant 0.0 inside: after the fade
        // the loop tail ramps toward the pre-loop material.
        let mut samples = vec![1.0f32; 4];
        samples.extend(vec![0.0f32; 8]);
        let w = wave(samples, 1);
        let mut buffer = SampleBuffer::build(&w, 0, 12, 1, 24, false).unwrap();
        buffer.crossfade_loop(LoopRegion { start: 4, end: 12 }, 2);

        // Unfaded part of the loop untouched.
        assert_eq!(buffer.sample(5, 0), 0.0);
        // Tail blends toward the lead-in value 1.0.
        assert!(buffer.sample(10, 0) > 0.0);
        assert!(buffer.sample(11, 0) > buffer.sample(10, 0));
    }

    #[test]
    fn test_crossfade_head_ramps_in() {
        let w = wave(vec![1.0f32; 6], 1);
        let mut buffer = SampleBuffer::build(&w, 0, 6, 1, 24, false).unwrap();
        buffer.crossfade_head(4);
        assert!(buffer.sample(0, 0) < buffer.sample(1, 0));
        assert!(buffer.sample(3, 0) < 1.0);
        assert_eq!(buffer.sample(5, 0), 1.0);
    }

    #[test]
    fn test_crossfade_frames_conversion() {
        assert_eq!(crossfade_frames(120, 44100), 5292);
        assert_eq!(crossfade_frames(0, 44100), 0);
    }
}
