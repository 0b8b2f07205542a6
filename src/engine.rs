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

use tracing::{debug, error, info, warn};

use crate::assets::{self, AssetResolver, DirectoryResolver, FileGroup};
use crate::audio::levels::{gain, SoundPan, SoundPitch, SoundVolume, FULL_LOUDNESS};
use crate::audio::{self, Backend, VoiceId};
use crate::bank::{self, BankError, BankId, SampleTableId, SfxId, SoundBank, SoundBanks, SPEECH_BANK};
use crate::config::{EngineConfig, DEFAULT_MUSIC_FADE};
use crate::music::{CdAudio, MusicController, NoCdAudio};
use crate::stream::StreamChannel;
use crate::voices::{EmitterId, PlayRequest, VoicePool};

/// `repeat` value that makes a sample loop until stopped.
pub const REPEAT_FOREVER: i8 = -1;

/// Everything that only exists between init and shutdown.
struct Session {
    backend: Box<dyn Backend>,
    pool: VoicePool,
    banks: SoundBanks,
    stream: StreamChannel,
    music: MusicController,
}

/// The game-facing sound engine. Entry points never fail outright: problems
/// are logged, and a device or bank failure disables the engine for the rest
/// of the session.
pub struct AudioEngine {
    config: EngineConfig,
    resolver: Box<dyn AssetResolver>,
    cd: Option<Box<dyn CdAudio>>,
    language: String,
    master_volume: SoundVolume,
    disabled: bool,
    session: Option<Session>,
}

impl AudioEngine {
    /// Creates an engine that finds its assets in the configured directories.
    pub fn new(config: EngineConfig) -> AudioEngine {
        let resolver = Box::new(DirectoryResolver::from_config(&config));
        AudioEngine::with_resolver(config, resolver)
    }

    pub fn with_resolver(config: EngineConfig, resolver: Box<dyn AssetResolver>) -> AudioEngine {
        AudioEngine {
            language: config.language().to_string(),
            disabled: config.sound_disabled(),
            config,
            resolver,
            cd: None,
            master_volume: FULL_LOUDNESS,
            session: None,
        }
    }

    /// Sets the CD-audio player used when music is not played from files.
    /// Takes effect on the next init.
    pub fn set_cd_audio(&mut self, cd: Box<dyn CdAudio>) {
        self.cd = Some(cd);
    }

    /// Opens the configured device and loads the banks.
    pub fn init_audio(&mut self) -> bool {
        if !self.ready_to_init() {
            return self.session.is_some();
        }
        match audio::get_backend(&self.config) {
            Ok(backend) => self.start(backend),
            Err(e) => {
                error!(device = self.config.device(), err = %e, "Failed to open audio device");
                self.disable();
                false
            }
        }
    }

    /// Like [`AudioEngine::init_audio`], with a pool of `max_voices` voices
    /// instead of the configured size.
    pub fn init_audio_with_voices(&mut self, max_voices: usize) -> bool {
        if self.session.is_none() {
            self.config = std::mem::take(&mut self.config).with_max_voices(max_voices);
        }
        self.init_audio()
    }

    /// Initializes on an already opened backend.
    pub fn init_audio_with(&mut self, backend: Box<dyn Backend>) -> bool {
        if !self.ready_to_init() {
            return self.session.is_some();
        }
        self.start(backend)
    }

    fn ready_to_init(&self) -> bool {
        if self.session.is_some() {
            warn!("Sound already initialized");
            return false;
        }
        if self.disabled {
            warn!("Sound is disabled, not initializing");
            return false;
        }
        true
    }

    fn start(&mut self, mut backend: Box<dyn Backend>) -> bool {
        info!(device = %backend, voices = self.config.max_voices(), "Initializing sound");

        let pool = match VoicePool::init(
            backend.as_mut(),
            self.config.max_voices(),
            self.config.pitch_easter_egg(),
        ) {
            Ok(pool) => pool,
            Err(e) => {
                error!(err = %e, "Failed to create voices");
                self.disable();
                return false;
            }
        };

        let banks = match self.load_banks() {
            Ok(banks) => banks,
            Err(e) => {
                error!(err = %e, "Failed to load sound banks");
                pool.shutdown(backend.as_mut());
                self.disable();
                return false;
            }
        };

        let fade = self.config.music_fade().unwrap_or_else(|e| {
            warn!(err = %e, "Bad music fade, using default");
            DEFAULT_MUSIC_FADE
        });
        let cd = self
            .cd
            .take()
            .unwrap_or_else(|| Box::new(NoCdAudio) as Box<dyn CdAudio>);
        let stream = StreamChannel::new(backend.as_mut());
        let music = MusicController::new(backend.as_mut(), self.config.music_from_files(), fade, cd);

        if let Err(e) = backend.set_master_gain(gain(self.master_volume)) {
            warn!(err = %e, "Failed to set master volume");
        }

        self.session = Some(Session {
            backend,
            pool,
            banks,
            stream,
            music,
        });
        info!("Sound initialized");
        true
    }

    fn load_banks(&self) -> Result<SoundBanks, BankError> {
        let effects = bank::load_bank(&assets::effects_bank_path(self.resolver.as_ref()))?;
        let speech = bank::load_bank(&assets::speech_bank_path(
            self.resolver.as_ref(),
            &self.language,
        ))?;
        Ok(SoundBanks { effects, speech })
    }

    fn disable(&mut self) {
        self.disabled = true;
        warn!("Sound disabled for this session");
    }

    /// Starts a sample for an emitter. `repeat` of [`REPEAT_FOREVER`] loops it.
    /// `_ctype` is accepted for compatibility with existing callers and unused.
    #[allow(clippy::too_many_arguments)]
    pub fn play_sample(
        &mut self,
        emitter_id: EmitterId,
        sample_table_id: SampleTableId,
        volume: SoundVolume,
        pan: SoundPan,
        pitch: SoundPitch,
        repeat: i8,
        _ctype: u8,
        bank_id: BankId,
    ) -> Option<VoiceId> {
        let session = self.session.as_mut()?;
        session.pool.play(
            session.backend.as_mut(),
            &session.banks,
            PlayRequest {
                emitter_id,
                sample_table_id,
                volume,
                pan,
                pitch,
                looping: repeat == REPEAT_FOREVER,
                bank_id,
            },
        )
    }

    pub fn stop_sample(&mut self, emitter_id: EmitterId, sample_table_id: SampleTableId, bank_id: BankId) {
        if let Some(session) = self.session.as_mut() {
            session
                .pool
                .stop(session.backend.as_mut(), emitter_id, sample_table_id, bank_id);
        }
    }

    pub fn set_sample_volume(&mut self, emitter_id: EmitterId, sample_table_id: SampleTableId, volume: SoundVolume) {
        if let Some(session) = self.session.as_mut() {
            session
                .pool
                .set_volume(session.backend.as_mut(), emitter_id, sample_table_id, volume);
        }
    }

    pub fn set_sample_pan(&mut self, emitter_id: EmitterId, sample_table_id: SampleTableId, pan: SoundPan) {
        if let Some(session) = self.session.as_mut() {
            session
                .pool
                .set_pan(session.backend.as_mut(), emitter_id, sample_table_id, pan);
        }
    }

    pub fn set_sample_pitch(&mut self, emitter_id: EmitterId, sample_table_id: SampleTableId, pitch: SoundPitch) {
        if let Some(session) = self.session.as_mut() {
            session
                .pool
                .set_pitch(session.backend.as_mut(), emitter_id, sample_table_id, pitch);
        }
    }

    pub fn stop_all_samples(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.pool.stop_all(session.backend.as_mut());
        }
    }

    /// Asks the backend whether the voice is still playing.
    pub fn is_sample_playing(&self, voice: VoiceId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.pool.is_playing(s.backend.as_ref(), voice))
    }

    /// The sfx id stored for a sample, or 0 if there is no such sample.
    pub fn get_sample_sfx_id(&self, sample_table_id: SampleTableId, bank_id: BankId) -> SfxId {
        self.session
            .as_ref()
            .and_then(|s| s.banks.sample(bank_id, sample_table_id))
            .map_or(0, |sample| sample.sfx_id())
    }

    /// Plays a clip from the media directory on the streamed channel.
    /// `volume` ranges over `0..=255`.
    pub fn play_streamed_sample(&mut self, name: &str, volume: u32) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let path = self.resolver.resolve(FileGroup::Media, name);
        session.stream.play(session.backend.as_mut(), &path, volume)
    }

    pub fn stop_streamed_samples(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.stream.stop(session.backend.as_mut());
        }
    }

    pub fn set_streamed_sample_volume(&mut self, volume: u32) {
        if let Some(session) = self.session.as_mut() {
            session.stream.set_volume(session.backend.as_mut(), volume);
        }
    }

    /// Whether the streamed channel is idle.
    pub fn streamed_sample_finished(&self) -> bool {
        self.session
            .as_ref()
            .map_or(true, |s| s.stream.is_finished(s.backend.as_ref()))
    }

    /// Plays a music file from the music directory, looping.
    pub fn play_music(&mut self, name: &str) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let path = self.resolver.resolve(FileGroup::Music, name);
        session.music.play(session.backend.as_mut(), &path)
    }

    /// Plays a numbered track; 0 stops the music.
    pub fn play_music_track(&mut self, track: u32) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session
            .music
            .play_track(session.backend.as_mut(), self.resolver.as_ref(), track)
    }

    pub fn pause_music(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.music.pause(session.backend.as_mut());
        }
    }

    pub fn resume_music(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.music.resume(session.backend.as_mut());
        }
    }

    pub fn stop_music(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.music.stop(session.backend.as_mut());
        }
    }

    /// Music volume, `0..=256`.
    pub fn set_music_volume(&mut self, volume: u32) {
        if let Some(session) = self.session.as_mut() {
            session.music.set_volume(session.backend.as_mut(), volume);
        }
    }

    pub fn music_playing(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.music.is_playing())
    }

    /// Volume of the CD-audio player, `0..=256`.
    pub fn set_redbook_volume(&mut self, volume: u32) {
        if let Some(session) = self.session.as_mut() {
            session.music.set_cd_volume(volume);
        }
    }

    /// Sets the gain applied to every voice. Remembered across init.
    pub fn set_sound_master_volume(&mut self, volume: SoundVolume) {
        self.master_volume = volume;
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.backend.set_master_gain(gain(volume)) {
                error!(err = %e, volume, "Failed to set master volume");
            }
        }
    }

    pub fn sound_master_volume(&self) -> SoundVolume {
        self.master_volume
    }

    /// Frees finished voices and reopens the trigger gate. Call once per game
    /// tick, before any sample is played for that tick.
    pub fn tick_maintenance(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.pool.tick(session.backend.as_mut());
            session.music.poll();
        }
    }

    /// Swaps the speech bank for another language. Voices playing speech are
    /// stopped first. A failed load disables the engine.
    pub fn reload_speech_bank(&mut self, language: &str) -> bool {
        self.language = language.to_string();
        let path = assets::speech_bank_path(self.resolver.as_ref(), language);
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        session.pool.stop_bank(session.backend.as_mut(), SPEECH_BANK);
        session.banks.speech = SoundBank::default();
        match bank::load_bank(&path) {
            Ok(speech) => {
                session.banks.speech = speech;
                info!(language, "Speech bank reloaded");
                true
            }
            Err(e) => {
                error!(language, path = ?path, err = %e, "Failed to reload speech bank");
                self.shutdown_audio();
                self.disable();
                false
            }
        }
    }

    /// Releases voices, channels, banks and the device, in that order.
    pub fn shutdown_audio(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Session {
            mut backend,
            pool,
            banks,
            stream,
            mut music,
        } = session;

        pool.shutdown(backend.as_mut());
        stream.stop(backend.as_mut());
        music.shutdown(backend.as_mut());
        drop(banks);
        debug!(device = %backend, "Closing audio device");
        drop(backend);
        info!("Sound shut down");
    }

    pub fn is_sound_installed(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a fatal error or the configuration turned sound off.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Number of voices currently owned by an emitter.
    pub fn active_voices(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.pool.active_count())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown_audio();
    }
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("installed", &self.session.is_some())
            .field("disabled", &self.disabled)
            .field("language", &self.language)
            .field("master_volume", &self.master_volume)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::audio::levels::{NORMAL_PITCH, PAN_CENTER};
    use crate::audio::mock;
    use crate::bank::EFFECTS_BANK;
    use crate::testutil::{capture_logs, pcm16_wave, write_wav, BankBuilder};

    /// Writes an effects bank with `effects` samples and an English speech
    /// bank with two samples under `root/sound`.
    fn write_banks(root: &Path, effects: u8) {
        let sound = root.join("sound");
        std::fs::create_dir_all(&sound).unwrap();
        let mut builder = BankBuilder::new();
        for i in 0..effects {
            builder = builder.sample(&format!("fx{i}.wav"), 10 + i, pcm16_wave(22050, &[1, 2, 3, 4]));
        }
        builder.write(&sound.join("sound.dat"));
        BankBuilder::new()
            .sample("hello.wav", 50, pcm16_wave(22050, &[1]))
            .sample("bye.wav", 51, pcm16_wave(22050, &[2]))
            .write(&sound.join("speech_eng.dat"));
    }

    fn engine(root: &Path, yaml: &str) -> (AudioEngine, mock::Backend) {
        let config = EngineConfig::from_yaml(yaml)
            .unwrap()
            .with_device("mock")
            .with_asset_root(root);
        let mut engine = AudioEngine::new(config);
        let backend = mock::Backend::get("mock");
        assert!(engine.init_audio_with(Box::new(backend.clone())));
        (engine, backend)
    }

    fn play(engine: &mut AudioEngine, emitter: EmitterId, sample: SampleTableId) -> Option<VoiceId> {
        engine.play_sample(emitter, sample, FULL_LOUDNESS, PAN_CENTER, NORMAL_PITCH, 0, 0, EFFECTS_BANK)
    }

    #[test]
    fn test_play_dedup_and_tick() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 4);
        let (mut engine, backend) = engine(dir.path(), "max_voices: 4");

        let first = play(&mut engine, 1, 2);
        assert!(first.is_some());
        assert!(play(&mut engine, 2, 2).is_none());
        assert_eq!(backend.playing_voices(), 1);

        engine.tick_maintenance();
        assert!(play(&mut engine, 2, 2).is_some());
        assert_eq!(engine.active_voices(), 2);
    }

    #[test]
    fn test_init_with_voice_count() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 4);
        let config = EngineConfig::from_yaml("max_voices: 1")
            .unwrap()
            .with_device("mock")
            .with_asset_root(dir.path());
        let mut engine = AudioEngine::new(config);

        assert!(engine.init_audio_with_voices(3));

        assert!(play(&mut engine, 1, 1).is_some());
        assert!(play(&mut engine, 1, 2).is_some());
        assert!(play(&mut engine, 1, 3).is_some());
        assert_eq!(engine.active_voices(), 3);
        assert!(engine.init_audio_with_voices(8));
        assert_eq!(engine.active_voices(), 3);
    }

    #[test]
    fn test_pool_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 4);
        let (mut engine, _backend) = engine(dir.path(), "max_voices: 2");

        assert!(play(&mut engine, 1, 1).is_some());
        assert!(play(&mut engine, 1, 2).is_some());
        let (third, logs) = capture_logs(|| play(&mut engine, 1, 3));

        assert!(third.is_none());
        assert!(logs.contains("too many samples playing at once"));
        assert_eq!(engine.active_voices(), 2);
    }

    #[test]
    fn test_finished_voice_freed_on_next_tick() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 2);
        let (mut engine, backend) = engine(dir.path(), "max_voices: 2");

        let voice = play(&mut engine, 3, 1).unwrap();
        backend.finish_voice(voice);

        assert!(!engine.is_sample_playing(voice));
        assert_eq!(engine.active_voices(), 1);
        engine.tick_maintenance();
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_silent_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 2);
        let (mut engine, _backend) = engine(dir.path(), "max_voices: 2");

        let (voice, logs) = capture_logs(|| {
            let voice = play(&mut engine, 5, 0);
            engine.set_sample_volume(5, 7, 128);
            voice
        });

        assert!(voice.is_none());
        assert!(logs.is_empty(), "logs: {}", logs);
    }

    #[test]
    fn test_repeat_forever_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 2);
        let (mut engine, backend) = engine(dir.path(), "max_voices: 2");

        let looping = engine
            .play_sample(1, 1, 128, PAN_CENTER, NORMAL_PITCH, REPEAT_FOREVER, 0, EFFECTS_BANK)
            .unwrap();
        assert!(backend.voice(looping).unwrap().looping);
        assert_eq!(backend.voice(looping).unwrap().gain, 0.5);

        engine.stop_sample(1, 1, EFFECTS_BANK);
        assert!(!backend.voice(looping).unwrap().playing);
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_sfx_ids() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 3);
        let (engine, _backend) = engine(dir.path(), "max_voices: 1");

        assert_eq!(engine.get_sample_sfx_id(2, EFFECTS_BANK), 12);
        assert_eq!(engine.get_sample_sfx_id(1, SPEECH_BANK), 51);
        assert_eq!(engine.get_sample_sfx_id(3, EFFECTS_BANK), 0);
        assert_eq!(engine.get_sample_sfx_id(0, 7), 0);
    }

    #[test]
    fn test_missing_bank_disables_engine() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::default().with_asset_root(dir.path());
        let mut engine = AudioEngine::new(config);
        let backend = mock::Backend::get("mock");

        let (ok, logs) = capture_logs(|| engine.init_audio_with(Box::new(backend.clone())));

        assert!(!ok);
        assert!(logs.contains("Failed to load sound banks"));
        assert!(engine.is_disabled());
        assert!(!engine.is_sound_installed());
        assert_eq!(backend.created(), backend.destroyed());
        assert!(play(&mut engine, 1, 1).is_none());
        assert!(!engine.play_streamed_sample("x.wav", 10));
        assert!(engine.streamed_sample_finished());
        engine.tick_maintenance();
        assert!(!engine.init_audio_with(Box::new(backend)));
    }

    #[test]
    fn test_voice_creation_failure_disables_engine() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 1);
        let config = EngineConfig::default().with_asset_root(dir.path());
        let mut engine = AudioEngine::new(config);
        let backend = mock::Backend::get("mock");
        backend.fail_voice_creation_after(10);

        assert!(!engine.init_audio_with(Box::new(backend.clone())));
        assert!(engine.is_disabled());
        assert!(backend.voice_ids().is_empty());
    }

    #[test]
    fn test_init_twice_and_disabled_config() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 1);
        let (mut engine, _backend) = engine(dir.path(), "max_voices: 1");

        let (ok, logs) = capture_logs(|| engine.init_audio_with(Box::new(mock::Backend::get("other"))));
        assert!(ok);
        assert!(logs.contains("Sound already initialized"));

        let config = EngineConfig::from_yaml("sound_disabled: true").unwrap();
        let mut disabled = AudioEngine::new(config);
        let (ok, logs) = capture_logs(|| disabled.init_audio());
        assert!(!ok);
        assert!(logs.contains("Sound is disabled"));
    }

    #[test]
    fn test_init_audio_from_config() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 1);
        let config = EngineConfig::from_yaml("device: \"null\"")
            .unwrap()
            .with_asset_root(dir.path());
        let mut engine = AudioEngine::new(config);

        assert!(engine.init_audio());
        assert!(engine.is_sound_installed());
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 2);
        let (mut engine, backend) = engine(dir.path(), "max_voices: 3");
        std::fs::create_dir_all(dir.path().join("media")).unwrap();
        write_wav(&dir.path().join("media").join("speech.wav"), 1, 22050, &[0, 1]).unwrap();
        play(&mut engine, 1, 1).unwrap();
        assert!(engine.play_streamed_sample("speech.wav", 255));

        engine.shutdown_audio();

        assert!(!engine.is_sound_installed());
        assert_eq!(backend.destroyed(), 3);
        assert!(backend.voice_ids().is_empty());
        assert!(backend.channel_clip().is_none());
        assert!(!engine.is_disabled());
        engine.shutdown_audio();
    }

    #[test]
    fn test_streamed_samples() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 1);
        std::fs::create_dir_all(dir.path().join("media")).unwrap();
        write_wav(&dir.path().join("media").join("intro.wav"), 1, 22050, &[0, 1, 2]).unwrap();
        let (mut engine, backend) = engine(dir.path(), "max_voices: 1");

        assert!(engine.streamed_sample_finished());
        assert!(engine.play_streamed_sample("intro.wav", 255));
        assert!(!engine.streamed_sample_finished());
        engine.set_streamed_sample_volume(0);
        assert_eq!(backend.channel_volume(), 0);

        backend.finish_channel();
        assert!(engine.streamed_sample_finished());

        assert!(!engine.play_streamed_sample("missing.wav", 255));
        engine.stop_streamed_samples();
    }

    #[test]
    fn test_music_entry_points() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 1);
        std::fs::create_dir_all(dir.path().join("music")).unwrap();
        write_wav(&dir.path().join("music").join("theme.wav"), 2, 22050, &[0, 0, 1, 1]).unwrap();
        let (mut engine, backend) = engine(dir.path(), "max_voices: 1");

        assert!(engine.play_music("theme.wav"));
        assert!(engine.music_playing());
        engine.pause_music();
        assert!(backend.music_paused());
        engine.resume_music();
        engine.set_music_volume(128);
        assert_eq!(backend.music_volume(), 64);

        engine.stop_music();
        backend.finish_music();
        engine.tick_maintenance();
        assert!(!engine.music_playing());
    }

    #[test]
    fn test_master_volume() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 1);
        let config = EngineConfig::default().with_asset_root(dir.path());
        let mut engine = AudioEngine::new(config);
        engine.set_sound_master_volume(128);
        let backend = mock::Backend::get("mock");

        assert!(engine.init_audio_with(Box::new(backend.clone())));
        assert_eq!(backend.master_gain(), 0.5);

        engine.set_sound_master_volume(64);
        assert_eq!(backend.master_gain(), 0.25);
        assert_eq!(engine.sound_master_volume(), 64);
    }

    #[test]
    fn test_reload_speech_bank() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 1);
        BankBuilder::new()
            .sample("witaj.wav", 70, pcm16_wave(22050, &[1]))
            .write(&dir.path().join("sound").join("speech_pol.dat"));
        let (mut engine, backend) = engine(dir.path(), "max_voices: 2");

        let voice = engine
            .play_sample(1, 1, FULL_LOUDNESS, PAN_CENTER, NORMAL_PITCH, REPEAT_FOREVER, 0, SPEECH_BANK)
            .unwrap();
        assert!(engine.reload_speech_bank("pol"));

        assert!(!backend.voice(voice).unwrap().playing);
        assert_eq!(engine.get_sample_sfx_id(0, SPEECH_BANK), 70);
        assert_eq!(engine.get_sample_sfx_id(1, SPEECH_BANK), 0);

        // No French bank: falls back to English.
        assert!(engine.reload_speech_bank("fre"));
        assert_eq!(engine.get_sample_sfx_id(1, SPEECH_BANK), 51);
    }

    #[test]
    fn test_failed_speech_reload_disables_engine() {
        let dir = tempfile::tempdir().unwrap();
        write_banks(dir.path(), 1);
        let (mut engine, backend) = engine(dir.path(), "max_voices: 2");
        std::fs::write(dir.path().join("sound").join("speech_ger.dat"), b"junk").unwrap();

        assert!(!engine.reload_speech_bank("ger"));

        assert!(engine.is_disabled());
        assert!(!engine.is_sound_installed());
        assert_eq!(backend.destroyed(), 2);
    }
}
