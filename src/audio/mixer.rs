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
use std::sync::Arc;
use std::time::Duration;

use crate::audio::levels::mixer_gain;
use crate::audio::{BackendError, Clip, VoiceId};
use crate::bank::Sample;
use crate::wave::PcmFormat;

/// Clips that finished during a render call. Callbacks are fired by the
/// caller once the mixer is no longer borrowed; the clips are released when
/// the events are dropped.
#[derive(Debug, Default)]
pub struct MixEvents {
    pub channel_finished: Option<Arc<Clip>>,
    pub music_finished: Option<Arc<Clip>>,
}

struct VoicePlayback {
    data: Arc<[u8]>,
    format: PcmFormat,
    sample_rate: u32,
    cursor: f64,
    looping: bool,
}

impl VoicePlayback {
    fn frames(&self) -> usize {
        self.data.len() / self.format.bytes_per_frame()
    }

    /// Reads one frame as a (left, right) pair.
    fn frame(&self, index: usize) -> (f32, f32) {
        let at = index * self.format.bytes_per_frame();
        let d = &self.data;
        match self.format {
            PcmFormat::Mono8 => {
                let v = pcm8(d[at]);
                (v, v)
            }
            PcmFormat::Stereo8 => (pcm8(d[at]), pcm8(d[at + 1])),
            PcmFormat::Mono16 => {
                let v = pcm16(d[at], d[at + 1]);
                (v, v)
            }
            PcmFormat::Stereo16 => (pcm16(d[at], d[at + 1]), pcm16(d[at + 2], d[at + 3])),
        }
    }
}

fn pcm8(b: u8) -> f32 {
    (f32::from(b) - 128.0) / 128.0
}

fn pcm16(lo: u8, hi: u8) -> f32 {
    f32::from(i16::from_le_bytes([lo, hi])) / 32768.0
}

struct VoiceSlot {
    playback: Option<VoicePlayback>,
    gain: f32,
    pitch: f32,
    position: f32,
}

impl VoiceSlot {
    fn new() -> VoiceSlot {
        VoiceSlot {
            playback: None,
            gain: 1.0,
            pitch: 1.0,
            position: 0.0,
        }
    }
}

struct ClipPlayback {
    clip: Arc<Clip>,
    cursor: f64,
    looping: bool,
}

impl ClipPlayback {
    fn new(clip: Arc<Clip>, looping: bool) -> ClipPlayback {
        ClipPlayback {
            clip,
            cursor: 0.0,
            looping,
        }
    }

    fn frame(&self, index: usize) -> (f32, f32) {
        let channels = usize::from(self.clip.channels());
        let samples = self.clip.samples();
        let at = index * channels;
        if channels == 1 {
            (samples[at], samples[at])
        } else {
            (samples[at], samples[at + 1])
        }
    }

    /// Advances by one output frame. Returns false once the clip is done.
    fn advance(&mut self, out_rate: u32) -> bool {
        self.cursor += f64::from(self.clip.sample_rate()) / f64::from(out_rate);
        let frames = self.clip.frames() as f64;
        if self.cursor >= frames {
            if self.looping && frames > 0.0 {
                self.cursor %= frames;
            } else {
                return false;
            }
        }
        true
    }
}

struct Fade {
    remaining: u64,
    total: u64,
}

struct MusicPlayback {
    playback: ClipPlayback,
    paused: bool,
    fade: Option<Fade>,
}

/// Mixes every playing source. Not thread safe by itself; the cpal backend
/// wraps it in a mutex shared with the output callback.
pub struct SoftMixer {
    sample_rate: u32,
    channels: u16,
    voices: Vec<Option<VoiceSlot>>,
    master_gain: f32,
    channel: Option<ClipPlayback>,
    channel_volume: u32,
    music: Option<MusicPlayback>,
    music_volume: u32,
}

impl SoftMixer {
    pub fn new(channels: u16, sample_rate: u32) -> SoftMixer {
        SoftMixer {
            sample_rate,
            channels: channels.max(1),
            voices: Vec::new(),
            master_gain: 1.0,
            channel: None,
            channel_volume: 0,
            music: None,
            music_volume: crate::audio::levels::MIXER_MAX_VOLUME,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn create_voice(&mut self) -> VoiceId {
        if let Some(index) = self.voices.iter().position(Option::is_none) {
            self.voices[index] = Some(VoiceSlot::new());
            return index as VoiceId + 1;
        }
        self.voices.push(Some(VoiceSlot::new()));
        self.voices.len() as VoiceId
    }

    pub fn destroy_voice(&mut self, voice: VoiceId) -> Result<(), BackendError> {
        let slot = self
            .voices
            .get_mut(voice_index(voice))
            .filter(|slot| slot.is_some())
            .ok_or(BackendError::UnknownVoice(voice))?;
        *slot = None;
        Ok(())
    }

    fn slot(&mut self, voice: VoiceId) -> Result<&mut VoiceSlot, BackendError> {
        self.voices
            .get_mut(voice_index(voice))
            .and_then(Option::as_mut)
            .ok_or(BackendError::UnknownVoice(voice))
    }

    pub fn play(&mut self, voice: VoiceId, sample: &Sample, looping: bool) -> Result<(), BackendError> {
        self.slot(voice)?.playback = Some(VoicePlayback {
            data: sample.data().clone(),
            format: sample.format(),
            sample_rate: sample.sample_rate(),
            cursor: 0.0,
            looping,
        });
        Ok(())
    }

    pub fn stop(&mut self, voice: VoiceId) -> Result<(), BackendError> {
        self.slot(voice)?.playback = None;
        Ok(())
    }

    pub fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), BackendError> {
        self.slot(voice)?.gain = gain.max(0.0);
        Ok(())
    }

    pub fn set_pitch(&mut self, voice: VoiceId, factor: f32) -> Result<(), BackendError> {
        self.slot(voice)?.pitch = factor.max(0.0);
        Ok(())
    }

    pub fn set_position(&mut self, voice: VoiceId, position: f32) -> Result<(), BackendError> {
        self.slot(voice)?.position = position.clamp(-1.0, 1.0);
        Ok(())
    }

    pub fn is_playing(&self, voice: VoiceId) -> Result<bool, BackendError> {
        self.voices
            .get(voice_index(voice))
            .and_then(Option::as_ref)
            .map(|slot| slot.playback.is_some())
            .ok_or(BackendError::UnknownVoice(voice))
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain.max(0.0);
    }

    pub fn play_channel(&mut self, clip: Arc<Clip>, volume: u32) {
        self.channel = Some(ClipPlayback::new(clip, false));
        self.channel_volume = volume;
    }

    pub fn halt_channel(&mut self) {
        self.channel = None;
    }

    pub fn set_channel_volume(&mut self, volume: u32) {
        self.channel_volume = volume;
    }

    pub fn channel_playing(&self) -> bool {
        self.channel.is_some()
    }

    pub fn play_music(&mut self, clip: Arc<Clip>, looping: bool) {
        self.music = Some(MusicPlayback {
            playback: ClipPlayback::new(clip, looping),
            paused: false,
            fade: None,
        });
    }

    pub fn pause_music(&mut self) {
        if let Some(music) = self.music.as_mut() {
            music.paused = true;
        }
    }

    pub fn resume_music(&mut self) {
        if let Some(music) = self.music.as_mut() {
            music.paused = false;
        }
    }

    pub fn halt_music(&mut self) {
        self.music = None;
    }

    pub fn fade_out_music(&mut self, duration: Duration) -> bool {
        let sample_rate = self.sample_rate;
        match self.music.as_mut() {
            Some(music) if music.fade.is_none() => {
                let total = (duration.as_secs_f64() * f64::from(sample_rate)).max(1.0) as u64;
                music.fade = Some(Fade {
                    remaining: total,
                    total,
                });
                true
            }
            _ => false,
        }
    }

    pub fn is_fading_music(&self) -> bool {
        self.music.as_ref().is_some_and(|music| music.fade.is_some())
    }

    pub fn set_music_volume(&mut self, volume: u32) {
        self.music_volume = volume;
    }

    pub fn music_playing(&self) -> bool {
        self.music.is_some()
    }

    /// Renders interleaved frames into `out`, overwriting it.
    pub fn render(&mut self, out: &mut [f32]) -> MixEvents {
        let mut events = MixEvents::default();
        let channels = usize::from(self.channels);
        let out_rate = self.sample_rate;

        for frame in out.chunks_mut(channels) {
            let (mut left, mut right) = (0.0f32, 0.0f32);

            for slot in self.voices.iter_mut().flatten() {
                let Some(playback) = slot.playback.as_mut() else {
                    continue;
                };
                let frames = playback.frames();
                if frames == 0 {
                    slot.playback = None;
                    continue;
                }
                let (l, r) = playback.frame(playback.cursor as usize);
                let left_gain = 1.0 - slot.position.max(0.0);
                let right_gain = 1.0 + slot.position.min(0.0);
                left += l * slot.gain * left_gain * self.master_gain;
                right += r * slot.gain * right_gain * self.master_gain;

                playback.cursor +=
                    f64::from(playback.sample_rate) / f64::from(out_rate) * f64::from(slot.pitch);
                if playback.cursor >= frames as f64 {
                    if playback.looping {
                        playback.cursor %= frames as f64;
                    } else {
                        slot.playback = None;
                    }
                }
            }

            if let Some(channel) = self.channel.as_mut() {
                let gain = mixer_gain(self.channel_volume);
                if channel.clip.frames() > 0 {
                    let (l, r) = channel.frame(channel.cursor as usize);
                    left += l * gain;
                    right += r * gain;
                }
                if !channel.advance(out_rate) {
                    events.channel_finished = self.channel.take().map(|c| c.clip);
                }
            }

            if let Some(music) = self.music.as_mut() {
                if !music.paused {
                    let mut gain = mixer_gain(self.music_volume);
                    if let Some(fade) = music.fade.as_mut() {
                        gain *= fade.remaining as f32 / fade.total as f32;
                        fade.remaining = fade.remaining.saturating_sub(1);
                    }
                    if music.playback.clip.frames() > 0 {
                        let (l, r) = music.playback.frame(music.playback.cursor as usize);
                        left += l * gain;
                        right += r * gain;
                    }
                    let faded_out = music.fade.as_ref().is_some_and(|fade| fade.remaining == 0);
                    if !music.playback.advance(out_rate) || faded_out {
                        events.music_finished = self.music.take().map(|m| m.playback.clip);
                    }
                }
            }

            if channels == 1 {
                frame[0] = (left + right) * 0.5;
            } else {
                frame[0] = left;
                frame[1] = right;
                frame[2..].fill(0.0);
            }
        }

        events
    }
}

fn voice_index(voice: VoiceId) -> usize {
    (voice as usize).wrapping_sub(1)
}
