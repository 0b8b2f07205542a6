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
use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, info, warn};

use super::dedup::{dedup_key, DedupGate};
use crate::audio::levels::{gain, pan_position, pitch_factor, SoundPan, SoundPitch, SoundVolume};
use crate::audio::{Backend, BackendError, VoiceId};
use crate::bank::{BankId, Sample, SampleTableId, SoundBanks};

/// Identity of whoever is making a sound. Zero marks a free voice.
pub type EmitterId = u32;

/// One in this many plays gets a random pitch when the easter egg is enabled.
const PITCH_EASTER_EGG_ODDS: u32 = 16;

/// Minimum time between two "no free voice" warnings.
const EXHAUSTED_WARNING_INTERVAL: Duration = Duration::from_secs(1);

/// A playback slot and its current owner.
#[derive(Clone, PartialEq)]
pub struct Voice {
    hardware_id: VoiceId,
    emitter_id: EmitterId,
    sample_table_id: SampleTableId,
    bank_id: BankId,
    /// Extra pitch multiplier picked when the voice was started.
    pitch_scale: f32,
}

impl Voice {
    fn new(hardware_id: VoiceId) -> Voice {
        Voice {
            hardware_id,
            emitter_id: 0,
            sample_table_id: 0,
            bank_id: 0,
            pitch_scale: 1.0,
        }
    }

    pub fn hardware_id(&self) -> VoiceId {
        self.hardware_id
    }

    pub fn emitter_id(&self) -> EmitterId {
        self.emitter_id
    }

    pub fn sample_table_id(&self) -> SampleTableId {
        self.sample_table_id
    }

    pub fn bank_id(&self) -> BankId {
        self.bank_id
    }

    /// Whether the pitch of this voice was randomized.
    pub fn randomized_pitch(&self) -> bool {
        self.pitch_scale != 1.0
    }

    pub fn is_free(&self) -> bool {
        self.emitter_id == 0
    }

    fn matches(&self, emitter_id: EmitterId, sample_table_id: SampleTableId) -> bool {
        !self.is_free() && self.emitter_id == emitter_id && self.sample_table_id == sample_table_id
    }

    fn release(&mut self) {
        self.emitter_id = 0;
        self.sample_table_id = 0;
        self.bank_id = 0;
        self.pitch_scale = 1.0;
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_free() {
            return write!(f, "Voice({}, free)", self.hardware_id);
        }
        write!(
            f,
            "Voice({}, emitter={}, sample={}, bank={})",
            self.hardware_id, self.emitter_id, self.sample_table_id, self.bank_id
        )
    }
}

/// Arguments of a play call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayRequest {
    pub emitter_id: EmitterId,
    pub sample_table_id: SampleTableId,
    pub volume: SoundVolume,
    pub pan: SoundPan,
    pub pitch: SoundPitch,
    pub looping: bool,
    pub bank_id: BankId,
}

/// Rate limits a repeated warning and counts what it swallowed.
#[derive(Debug, Default)]
struct ThrottledWarning {
    last: Option<Instant>,
    suppressed: u64,
}

impl ThrottledWarning {
    /// Returns the number of suppressed occurrences when a warning is due.
    fn hit(&mut self, now: Instant) -> Option<u64> {
        match self.last {
            Some(last) if now.duration_since(last) < EXHAUSTED_WARNING_INTERVAL => {
                self.suppressed += 1;
                None
            }
            _ => {
                self.last = Some(now);
                Some(std::mem::take(&mut self.suppressed))
            }
        }
    }
}

/// A fixed set of voices plus the trigger gate cleared on every tick.
///
/// A voice belongs to the emitter stamped on it until it is stopped or the
/// maintenance sweep finds that the backend stopped it.
pub struct VoicePool {
    voices: Vec<Voice>,
    gate: DedupGate,
    pitch_easter_egg: bool,
    exhausted: ThrottledWarning,
}

impl VoicePool {
    /// Creates `max_voices` backend voices. If any creation fails, the voices
    /// created so far are destroyed again.
    pub fn init(
        backend: &mut dyn Backend,
        max_voices: usize,
        pitch_easter_egg: bool,
    ) -> Result<VoicePool, BackendError> {
        let mut voices = Vec::with_capacity(max_voices);
        for _ in 0..max_voices {
            match backend.create_voice() {
                Ok(id) => voices.push(Voice::new(id)),
                Err(e) => {
                    error!(err = %e, created = voices.len(), "Failed to create voice");
                    for voice in voices.iter() {
                        if let Err(e) = backend.destroy_voice(voice.hardware_id) {
                            warn!(err = %e, voice = voice.hardware_id, "Failed to destroy voice");
                        }
                    }
                    return Err(e);
                }
            }
        }

        info!(voices = voices.len(), "Voice pool ready");
        Ok(VoicePool {
            voices,
            gate: DedupGate::new(),
            pitch_easter_egg,
            exhausted: ThrottledWarning::default(),
        })
    }

    /// Starts a sample on the first free voice. Returns the hardware id of the
    /// voice, or `None` if nothing was started.
    pub fn play(
        &mut self,
        backend: &mut dyn Backend,
        banks: &SoundBanks,
        request: PlayRequest,
    ) -> Option<VoiceId> {
        let PlayRequest {
            emitter_id,
            sample_table_id,
            bank_id,
            ..
        } = request;

        if emitter_id == 0 {
            error!(
                sample = sample_table_id,
                bank = bank_id,
                "Can't play sample, invalid emitter ID"
            );
            return None;
        }
        let Some(bank) = banks.get(bank_id) else {
            error!(
                sample = sample_table_id,
                bank = bank_id,
                "Can't play sample, invalid bank ID"
            );
            return None;
        };
        // Sample 0 is a placeholder that is never played.
        if sample_table_id == 0 {
            return None;
        }
        let Some(sample) = bank.get(sample_table_id) else {
            error!(
                sample = sample_table_id,
                bank = bank_id,
                size = bank.len(),
                "Can't play sample, invalid sample ID"
            );
            return None;
        };

        let key = dedup_key(bank_id, sample_table_id);
        if self.gate.contains(key) {
            return None;
        }

        let Some(index) = self.voices.iter().position(Voice::is_free) else {
            if let Some(suppressed) = self.exhausted.hit(Instant::now()) {
                warn!(
                    sample = sample_table_id,
                    bank = bank_id,
                    suppressed,
                    "Can't play sample, too many samples playing at once"
                );
            }
            return None;
        };

        let pitch_scale = self.roll_pitch_scale();
        let hardware_id = self.voices[index].hardware_id;
        if let Err(e) = start_voice(backend, hardware_id, sample, &request, pitch_scale) {
            error!(
                err = %e,
                voice = hardware_id,
                sample = sample_table_id,
                bank = bank_id,
                "Failed to start sample"
            );
            return None;
        }

        let voice = &mut self.voices[index];
        voice.emitter_id = emitter_id;
        voice.sample_table_id = sample_table_id;
        voice.bank_id = bank_id;
        voice.pitch_scale = pitch_scale;
        self.gate.try_claim(key);

        debug!(
            voice = hardware_id,
            emitter = emitter_id,
            sample = sample_table_id,
            bank = bank_id,
            sfx_id = sample.sfx_id(),
            "Sample started"
        );
        Some(hardware_id)
    }

    fn roll_pitch_scale(&self) -> f32 {
        if !self.pitch_easter_egg {
            return 1.0;
        }
        let mut rng = rand::thread_rng();
        if rng.gen_range(0..PITCH_EASTER_EGG_ODDS) == 0 {
            rng.gen_range(0.5..2.0)
        } else {
            1.0
        }
    }

    /// Stops and frees every voice owned by the triple.
    pub fn stop(
        &mut self,
        backend: &mut dyn Backend,
        emitter_id: EmitterId,
        sample_table_id: SampleTableId,
        bank_id: BankId,
    ) {
        for voice in self.voices.iter_mut() {
            if !voice.matches(emitter_id, sample_table_id) || voice.bank_id != bank_id {
                continue;
            }
            match backend.stop(voice.hardware_id) {
                Ok(()) => voice.release(),
                Err(e) => error!(err = %e, voice = voice.hardware_id, "Failed to stop sample"),
            }
        }
    }

    /// Changes the volume of every voice playing the sample for the emitter,
    /// whatever its bank.
    pub fn set_volume(
        &mut self,
        backend: &mut dyn Backend,
        emitter_id: EmitterId,
        sample_table_id: SampleTableId,
        volume: SoundVolume,
    ) {
        self.for_each_match(emitter_id, sample_table_id, |voice| {
            backend.set_gain(voice.hardware_id, gain(volume))
        });
    }

    pub fn set_pan(
        &mut self,
        backend: &mut dyn Backend,
        emitter_id: EmitterId,
        sample_table_id: SampleTableId,
        pan: SoundPan,
    ) {
        self.for_each_match(emitter_id, sample_table_id, |voice| {
            backend.set_position(voice.hardware_id, pan_position(pan))
        });
    }

    pub fn set_pitch(
        &mut self,
        backend: &mut dyn Backend,
        emitter_id: EmitterId,
        sample_table_id: SampleTableId,
        pitch: SoundPitch,
    ) {
        self.for_each_match(emitter_id, sample_table_id, |voice| {
            backend.set_pitch(voice.hardware_id, pitch_factor(pitch) * voice.pitch_scale)
        });
    }

    fn for_each_match<F>(&self, emitter_id: EmitterId, sample_table_id: SampleTableId, mut apply: F)
    where
        F: FnMut(&Voice) -> Result<(), BackendError>,
    {
        for voice in self.voices.iter().filter(|v| v.matches(emitter_id, sample_table_id)) {
            if let Err(e) = apply(voice) {
                error!(err = %e, voice = voice.hardware_id, "Failed to update sample");
            }
        }
    }

    /// Stops every owned voice and frees it.
    pub fn stop_all(&mut self, backend: &mut dyn Backend) {
        let mut stopped = 0;
        for voice in self.voices.iter_mut().filter(|v| !v.is_free()) {
            if let Err(e) = backend.stop(voice.hardware_id) {
                error!(err = %e, voice = voice.hardware_id, "Failed to stop sample");
            }
            voice.release();
            stopped += 1;
        }
        if stopped > 0 {
            info!(stopped, "All samples stopped");
        }
    }

    /// Stops and frees the voices playing samples from the given bank.
    pub fn stop_bank(&mut self, backend: &mut dyn Backend, bank_id: BankId) {
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| !v.is_free() && v.bank_id == bank_id)
        {
            if let Err(e) = backend.stop(voice.hardware_id) {
                error!(err = %e, voice = voice.hardware_id, "Failed to stop sample");
            }
            voice.release();
        }
    }

    /// Frees voices whose sample ran out and opens the trigger gate for a new
    /// tick.
    pub fn tick(&mut self, backend: &mut dyn Backend) {
        for voice in self.voices.iter_mut().filter(|v| !v.is_free()) {
            match backend.is_playing(voice.hardware_id) {
                Ok(true) => {}
                Ok(false) => voice.release(),
                Err(e) => error!(err = %e, voice = voice.hardware_id, "Failed to poll voice"),
            }
        }
        self.gate.clear();
    }

    /// Whether the backend still plays the voice with the given hardware id.
    pub fn is_playing(&self, backend: &dyn Backend, hardware_id: VoiceId) -> bool {
        if !self.voices.iter().any(|v| v.hardware_id == hardware_id) {
            return false;
        }
        match backend.is_playing(hardware_id) {
            Ok(playing) => playing,
            Err(e) => {
                error!(err = %e, voice = hardware_id, "Failed to poll voice");
                false
            }
        }
    }

    /// Destroys every backend voice.
    pub fn shutdown(self, backend: &mut dyn Backend) {
        for voice in self.voices.iter() {
            if !voice.is_free() {
                if let Err(e) = backend.stop(voice.hardware_id) {
                    warn!(err = %e, voice = voice.hardware_id, "Failed to stop sample");
                }
            }
            if let Err(e) = backend.destroy_voice(voice.hardware_id) {
                warn!(err = %e, voice = voice.hardware_id, "Failed to destroy voice");
            }
        }
        debug!(voices = self.voices.len(), "Voice pool released");
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Number of voices currently owned by an emitter.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_free()).count()
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }
}

fn start_voice(
    backend: &mut dyn Backend,
    voice: VoiceId,
    sample: &Sample,
    request: &PlayRequest,
    pitch_scale: f32,
) -> Result<(), BackendError> {
    backend.set_gain(voice, gain(request.volume))?;
    backend.set_position(voice, pan_position(request.pan))?;
    backend.set_pitch(voice, pitch_factor(request.pitch) * pitch_scale)?;
    backend.play(voice, sample, request.looping)
}
