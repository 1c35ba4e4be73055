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

//! The voice-allocation boundary.
//!
//! The sampler backend that actually mixes voices lives behind
//! [`VoiceAllocator`]; the pipe state machine only issues requests across it.
//! Handles are opaque and owned by the allocator. Calls must not block on
//! render-context timing.

use crate::provider::SoundProvider;

/// Opaque reference to a sounding voice, valid until stopped or swapped out
/// by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle(pub u64);

/// Request parameters for starting a voice.
#[derive(Debug, Clone, Copy)]
pub struct StartRequest {
    pub windchest_group: u16,
    pub audio_group: u8,
    pub velocity: u8,
    pub delay_ms: u32,
    /// Timestamp of the pipe's last stop, for "time since release" attack
    /// selection; 0 = never released.
    pub last_stop: u64,
}

/// The windchest/organ controller granting and tracking voices.
pub trait VoiceAllocator {
    /// Requests a new voice. `None` means the voice pool refused (pool
    /// exhaustion); that is a normal outcome, not an error.
    fn start_voice(&mut self, provider: &SoundProvider, request: StartRequest)
        -> Option<VoiceHandle>;

    /// Releases a voice into its release phase. Returns the stop timestamp
    /// used as the next start's "time since release" reference.
    fn stop_voice(&mut self, provider: &SoundProvider, handle: VoiceHandle) -> u64;

    /// Adjusts the velocity of a sounding voice in place.
    fn update_velocity(&mut self, provider: &SoundProvider, handle: VoiceHandle, velocity: u8);

    /// Hot-swaps the sample data under a sounding voice, preserving the
    /// in-flight playback position. Used for tremulant group switches.
    fn switch_sample(&mut self, provider: &SoundProvider, handle: VoiceHandle);
}

/// Call record kept by [`MockAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorCall {
    Start { velocity: u8, delay_ms: u32, last_stop: u64 },
    Stop { handle: VoiceHandle },
    UpdateVelocity { handle: VoiceHandle, velocity: u8 },
    SwitchSample { handle: VoiceHandle },
}

/// Recording allocator for tests. Grants sequential handles unless told to
/// refuse, and returns a monotonically increasing stop timestamp.
#[derive(Debug, Default)]
pub struct MockAllocator {
    pub calls: Vec<AllocatorCall>,
    pub refuse_starts: bool,
    next_handle: u64,
    clock: u64,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, AllocatorCall::Start { .. }))
            .count()
    }

    pub fn stops(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, AllocatorCall::Stop { .. }))
            .count()
    }
}

impl VoiceAllocator for MockAllocator {
    fn start_voice(
        &mut self,
        _provider: &SoundProvider,
        request: StartRequest,
    ) -> Option<VoiceHandle> {
        self.calls.push(AllocatorCall::Start {
            velocity: request.velocity,
            delay_ms: request.delay_ms,
            last_stop: request.last_stop,
        });
        if self.refuse_starts {
            return None;
        }
        self.next_handle += 1;
        Some(VoiceHandle(self.next_handle))
    }

    fn stop_voice(&mut self, _provider: &SoundProvider, handle: VoiceHandle) -> u64 {
        self.calls.push(AllocatorCall::Stop { handle });
        self.clock += 1;
        self.clock
    }

    fn update_velocity(&mut self, _provider: &SoundProvider, handle: VoiceHandle, velocity: u8) {
        self.calls
            .push(AllocatorCall::UpdateVelocity { handle, velocity });
    }

    fn switch_sample(&mut self, _provider: &SoundProvider, handle: VoiceHandle) {
        self.calls.push(AllocatorCall::SwitchSample { handle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_grants_sequential_handles() {
        let provider = SoundProvider::new();
        let mut allocator = MockAllocator::new();
        let request = StartRequest {
            windchest_group: 1,
            audio_group: 0,
            velocity: 80,
            delay_ms: 0,
            last_stop: 0,
        };
        let a = allocator.start_voice(&provider, request).unwrap();
        let b = allocator.start_voice(&provider, request).unwrap();
        assert_ne!(a, b);
        assert_eq!(allocator.starts(), 2);
    }

    #[test]
    fn test_mock_refusal_still_records_call() {
        let provider = SoundProvider::new();
        let mut allocator = MockAllocator::new();
        allocator.refuse_starts = true;
        let request = StartRequest {
            windchest_group: 1,
            audio_group: 0,
            velocity: 80,
            delay_ms: 0,
            last_stop: 0,
        };
        assert!(allocator.start_voice(&provider, request).is_none());
        assert_eq!(allocator.starts(), 1);
    }

    #[test]
    fn test_mock_stop_timestamps_increase() {
        let provider = SoundProvider::new();
        let mut allocator = MockAllocator::new();
        let t1 = allocator.stop_voice(&provider, VoiceHandle(1));
        let t2 = allocator.stop_voice(&provider, VoiceHandle(1));
        assert!(t2 > t1);
    }
}
