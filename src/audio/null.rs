// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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
use std::{fmt, sync::Arc, time::Duration};

use crate::audio::{BackendError, Clip, FinishedCallback, VoiceId};
use crate::bank::Sample;

/// Device name that selects this backend.
pub const DEVICE_NAME: &str = "null";

/// A muted backend. Voices report themselves as stopped, so the pool frees
/// them on the next tick.
#[derive(Default)]
pub struct Backend {
    next_voice: VoiceId,
}

impl Backend {
    pub fn new() -> Backend {
        Backend { next_voice: 1 }
    }
}

impl crate::audio::Backend for Backend {
    fn create_voice(&mut self) -> Result<VoiceId, BackendError> {
        let id = self.next_voice.max(1);
        self.next_voice = id + 1;
        Ok(id)
    }

    fn destroy_voice(&mut self, _voice: VoiceId) -> Result<(), BackendError> {
        Ok(())
    }

    fn play(&mut self, _voice: VoiceId, _sample: &Sample, _looping: bool) -> Result<(), BackendError> {
        Ok(())
    }

    fn stop(&mut self, _voice: VoiceId) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_gain(&mut self, _voice: VoiceId, _gain: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_pitch(&mut self, _voice: VoiceId, _factor: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_position(&mut self, _voice: VoiceId, _position: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn is_playing(&self, _voice: VoiceId) -> Result<bool, BackendError> {
        Ok(false)
    }

    fn set_master_gain(&mut self, _gain: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn play_channel(&mut self, _clip: Arc<Clip>, _volume: u32) -> Result<(), BackendError> {
        Ok(())
    }

    fn halt_channel(&mut self) {}

    fn set_channel_volume(&mut self, _volume: u32) {}

    fn channel_playing(&self) -> bool {
        false
    }

    fn on_channel_finished(&mut self, _callback: FinishedCallback) {}

    fn play_music(&mut self, _clip: Arc<Clip>, _looping: bool) -> Result<(), BackendError> {
        Ok(())
    }

    fn pause_music(&mut self) {}

    fn resume_music(&mut self) {}

    fn halt_music(&mut self) {}

    fn fade_out_music(&mut self, _duration: Duration) -> bool {
        false
    }

    fn is_fading_music(&self) -> bool {
        false
    }

    fn set_music_volume(&mut self, _volume: u32) {}

    fn on_music_finished(&mut self, _callback: FinishedCallback) {}
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Muted)", DEVICE_NAME)
    }
}
