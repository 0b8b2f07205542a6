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
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::debug;

use crate::audio::{BackendError, Clip, FinishedCallback, VoiceId};
use crate::bank::{Sample, SfxId};

/// What the mock knows about one voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceState {
    pub playing: bool,
    pub looping: bool,
    pub gain: f32,
    pub pitch: f32,
    pub position: f32,
    /// The sfx id of the last sample played on this voice.
    pub sfx_id: Option<SfxId>,
    pub plays: u32,
}

impl Default for VoiceState {
    fn default() -> Self {
        VoiceState {
            playing: false,
            looping: false,
            gain: 1.0,
            pitch: 1.0,
            position: 0.0,
            sfx_id: None,
            plays: 0,
        }
    }
}

struct MockState {
    voices: BTreeMap<VoiceId, VoiceState>,
    next_voice: VoiceId,
    created: usize,
    destroyed: usize,
    fail_create_after: Option<usize>,
    fail_operations: bool,
    master_gain: f32,
    channel: Option<Arc<Clip>>,
    channel_volume: u32,
    channel_callback: Option<FinishedCallback>,
    music: Option<Arc<Clip>>,
    music_looping: bool,
    music_paused: bool,
    music_fading: bool,
    music_volume: u32,
    music_callback: Option<FinishedCallback>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            voices: BTreeMap::new(),
            next_voice: 1,
            created: 0,
            destroyed: 0,
            fail_create_after: None,
            fail_operations: false,
            master_gain: 1.0,
            channel: None,
            channel_volume: 0,
            channel_callback: None,
            music: None,
            music_looping: false,
            music_paused: false,
            music_fading: false,
            music_volume: crate::audio::levels::MIXER_MAX_VOLUME,
            music_callback: None,
        }
    }
}

impl MockState {
    fn check(&self) -> Result<(), BackendError> {
        if self.fail_operations {
            return Err(BackendError::Failed("mock operation failure".into()));
        }
        Ok(())
    }

    fn voice(&mut self, voice: VoiceId) -> Result<&mut VoiceState, BackendError> {
        self.check()?;
        self.voices
            .get_mut(&voice)
            .ok_or(BackendError::UnknownVoice(voice))
    }
}

/// A mock backend. Doesn't actually play anything; tests drive completion and
/// failures through a clone that shares its state.
#[derive(Clone)]
pub struct Backend {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl Backend {
    /// Gets the given mock backend.
    pub fn get(name: &str) -> Backend {
        Backend {
            name: name.to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Marks the voice as no longer playing, as if its sample ran out.
    pub fn finish_voice(&self, voice: VoiceId) {
        if let Some(state) = self.state.lock().voices.get_mut(&voice) {
            state.playing = false;
        }
    }

    pub fn voice(&self, voice: VoiceId) -> Option<VoiceState> {
        self.state.lock().voices.get(&voice).cloned()
    }

    /// Ids of the voices that are currently allocated.
    pub fn voice_ids(&self) -> Vec<VoiceId> {
        self.state.lock().voices.keys().copied().collect()
    }

    pub fn playing_voices(&self) -> usize {
        self.state.lock().voices.values().filter(|v| v.playing).count()
    }

    /// Makes voice creation fail once `count` voices have been created.
    pub fn fail_voice_creation_after(&self, count: usize) {
        self.state.lock().fail_create_after = Some(count);
    }

    /// Makes every per-voice operation fail.
    pub fn fail_operations(&self, fail: bool) {
        self.state.lock().fail_operations = fail;
    }

    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    pub fn destroyed(&self) -> usize {
        self.state.lock().destroyed
    }

    pub fn master_gain(&self) -> f32 {
        self.state.lock().master_gain
    }

    pub fn channel_clip(&self) -> Option<Arc<Clip>> {
        self.state.lock().channel.clone()
    }

    pub fn channel_volume(&self) -> u32 {
        self.state.lock().channel_volume
    }

    /// Ends the reserved channel's clip and fires its finished callback.
    pub fn finish_channel(&self) {
        let Some(clip) = self.state.lock().channel.take() else {
            return;
        };
        self.fire_channel_finished(&clip);
    }

    /// Fires the channel's finished callback for `clip` without touching what
    /// is installed, like a completion that arrives late from the mixer.
    pub fn fire_channel_finished(&self, clip: &Arc<Clip>) {
        let callback = self.state.lock().channel_callback.take();
        if let Some(mut callback) = callback {
            callback(clip);
            let mut state = self.state.lock();
            if state.channel_callback.is_none() {
                state.channel_callback = Some(callback);
            }
        }
    }

    pub fn music_clip(&self) -> Option<Arc<Clip>> {
        self.state.lock().music.clone()
    }

    pub fn music_looping(&self) -> bool {
        self.state.lock().music_looping
    }

    pub fn music_paused(&self) -> bool {
        self.state.lock().music_paused
    }

    pub fn music_volume(&self) -> u32 {
        self.state.lock().music_volume
    }

    /// Ends the music and fires its finished callback.
    pub fn finish_music(&self) {
        let (clip, callback) = {
            let mut state = self.state.lock();
            let Some(clip) = state.music.take() else {
                return;
            };
            state.music_fading = false;
            state.music_paused = false;
            (clip, state.music_callback.take())
        };
        if let Some(mut callback) = callback {
            callback(&clip);
            let mut state = self.state.lock();
            if state.music_callback.is_none() {
                state.music_callback = Some(callback);
            }
        }
    }
}

impl crate::audio::Backend for Backend {
    fn create_voice(&mut self) -> Result<VoiceId, BackendError> {
        let mut state = self.state.lock();
        if state
            .fail_create_after
            .is_some_and(|limit| state.created >= limit)
        {
            return Err(BackendError::Failed("mock voice creation failure".into()));
        }
        let id = state.next_voice;
        state.next_voice += 1;
        state.created += 1;
        state.voices.insert(id, VoiceState::default());
        Ok(id)
    }

    fn destroy_voice(&mut self, voice: VoiceId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state
            .voices
            .remove(&voice)
            .ok_or(BackendError::UnknownVoice(voice))?;
        state.destroyed += 1;
        Ok(())
    }

    fn play(&mut self, voice: VoiceId, sample: &Sample, looping: bool) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let v = state.voice(voice)?;
        v.playing = true;
        v.looping = looping;
        v.sfx_id = Some(sample.sfx_id());
        v.plays += 1;
        debug!(voice, sfx_id = sample.sfx_id(), looping, "Mock voice playing");
        Ok(())
    }

    fn stop(&mut self, voice: VoiceId) -> Result<(), BackendError> {
        self.state.lock().voice(voice)?.playing = false;
        Ok(())
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), BackendError> {
        self.state.lock().voice(voice)?.gain = gain;
        Ok(())
    }

    fn set_pitch(&mut self, voice: VoiceId, factor: f32) -> Result<(), BackendError> {
        self.state.lock().voice(voice)?.pitch = factor;
        Ok(())
    }

    fn set_position(&mut self, voice: VoiceId, position: f32) -> Result<(), BackendError> {
        self.state.lock().voice(voice)?.position = position;
        Ok(())
    }

    fn is_playing(&self, voice: VoiceId) -> Result<bool, BackendError> {
        Ok(self.state.lock().voice(voice)?.playing)
    }

    fn set_master_gain(&mut self, gain: f32) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check()?;
        state.master_gain = gain;
        Ok(())
    }

    fn play_channel(&mut self, clip: Arc<Clip>, volume: u32) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check()?;
        state.channel = Some(clip);
        state.channel_volume = volume;
        Ok(())
    }

    fn halt_channel(&mut self) {
        self.state.lock().channel = None;
    }

    fn set_channel_volume(&mut self, volume: u32) {
        self.state.lock().channel_volume = volume;
    }

    fn channel_playing(&self) -> bool {
        self.state.lock().channel.is_some()
    }

    fn on_channel_finished(&mut self, callback: FinishedCallback) {
        self.state.lock().channel_callback = Some(callback);
    }

    fn play_music(&mut self, clip: Arc<Clip>, looping: bool) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.check()?;
        state.music = Some(clip);
        state.music_looping = looping;
        state.music_paused = false;
        state.music_fading = false;
        Ok(())
    }

    fn pause_music(&mut self) {
        let mut state = self.state.lock();
        if state.music.is_some() {
            state.music_paused = true;
        }
    }

    fn resume_music(&mut self) {
        self.state.lock().music_paused = false;
    }

    fn halt_music(&mut self) {
        let mut state = self.state.lock();
        state.music = None;
        state.music_fading = false;
    }

    fn fade_out_music(&mut self, _duration: Duration) -> bool {
        let mut state = self.state.lock();
        if state.music.is_none() || state.music_fading {
            return false;
        }
        state.music_fading = true;
        true
    }

    fn is_fading_music(&self) -> bool {
        self.state.lock().music_fading
    }

    fn set_music_volume(&mut self, volume: u32) {
        self.state.lock().music_volume = volume;
    }

    fn on_music_finished(&mut self, callback: FinishedCallback) {
        self.state.lock().music_callback = Some(callback);
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
