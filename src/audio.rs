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

use crate::bank::Sample;
use crate::config::EngineConfig;

pub mod clip;
pub mod cpal;
pub mod levels;
pub mod mixer;
pub mod mock;
pub mod null;
pub mod thread_priority;

pub use clip::{Clip, ClipError};

/// Opaque handle of a backend voice. Never zero.
pub type VoiceId = u32;

/// Invoked with the clip that just ended when the reserved channel or the
/// music finishes on its own. May run on the backend's mixing thread.
pub type FinishedCallback = Box<dyn FnMut(&Arc<Clip>) + Send>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no output device available")]
    NoDevice,

    #[error("device error: {0}")]
    Device(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("unknown voice {0}")]
    UnknownVoice(VoiceId),

    #[error("{0}")]
    Failed(String),
}

/// An audio output that can render pooled voices, one reserved clip channel
/// and one music track.
pub trait Backend: fmt::Display + Send {
    /// Allocates a hardware voice.
    fn create_voice(&mut self) -> Result<VoiceId, BackendError>;

    /// Releases a hardware voice, stopping it first if needed.
    fn destroy_voice(&mut self, voice: VoiceId) -> Result<(), BackendError>;

    /// Attaches the sample to the voice and starts it from the beginning.
    fn play(&mut self, voice: VoiceId, sample: &Sample, looping: bool) -> Result<(), BackendError>;

    fn stop(&mut self, voice: VoiceId) -> Result<(), BackendError>;

    /// Linear gain, 1.0 is unity.
    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), BackendError>;

    /// Playback rate multiplier, 1.0 is the recorded rate.
    fn set_pitch(&mut self, voice: VoiceId, factor: f32) -> Result<(), BackendError>;

    /// Stereo position, negative is left.
    fn set_position(&mut self, voice: VoiceId, position: f32) -> Result<(), BackendError>;

    fn is_playing(&self, voice: VoiceId) -> Result<bool, BackendError>;

    /// Gain applied to every voice.
    fn set_master_gain(&mut self, gain: f32) -> Result<(), BackendError>;

    /// Starts the clip on the reserved channel, replacing whatever was there.
    /// `volume` is in mixer units.
    fn play_channel(&mut self, clip: Arc<Clip>, volume: u32) -> Result<(), BackendError>;

    fn halt_channel(&mut self);

    fn set_channel_volume(&mut self, volume: u32);

    fn channel_playing(&self) -> bool;

    fn on_channel_finished(&mut self, callback: FinishedCallback);

    /// Starts the music track, replacing the current one.
    fn play_music(&mut self, clip: Arc<Clip>, looping: bool) -> Result<(), BackendError>;

    fn pause_music(&mut self);

    fn resume_music(&mut self);

    fn halt_music(&mut self);

    /// Fades the music out and halts it. Returns false if nothing is playing.
    fn fade_out_music(&mut self, duration: Duration) -> bool;

    fn is_fading_music(&self) -> bool;

    /// Music volume in mixer units.
    fn set_music_volume(&mut self, volume: u32);

    fn on_music_finished(&mut self, callback: FinishedCallback);
}

/// Lists the names of the cpal output devices.
pub fn list_devices() -> Result<Vec<String>, BackendError> {
    cpal::Backend::list()
}

/// Opens the backend named by the configuration.
pub fn get_backend(config: &EngineConfig) -> Result<Box<dyn Backend>, BackendError> {
    let device = config.device();
    if device == null::DEVICE_NAME {
        return Ok(Box::new(null::Backend::new()));
    }
    if device.starts_with("mock") {
        return Ok(Box::new(mock::Backend::get(device)));
    }

    Ok(Box::new(cpal::Backend::get(device)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_backend() {
        let config = EngineConfig::from_yaml("device: mock-test").unwrap();
        let backend = get_backend(&config).unwrap();
        assert_eq!(backend.to_string(), "mock-test (Mock)");

        let config = EngineConfig::from_yaml("device: \"null\"").unwrap();
        let backend = get_backend(&config).unwrap();
        assert_eq!(backend.to_string(), "null (Muted)");
    }
}
