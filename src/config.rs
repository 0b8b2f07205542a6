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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

mod error;

pub use error::ConfigError;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_MAX_VOICES: usize = 100;
const DEFAULT_SOUND_DIR: &str = "sound";
const DEFAULT_MUSIC_DIR: &str = "music";
const DEFAULT_MEDIA_DIR: &str = "media";
const DEFAULT_LANGUAGE: &str = "eng";
pub const DEFAULT_MUSIC_FADE: Duration = Duration::from_secs(1);

/// Environment variables with this prefix override file values,
/// e.g. `SNDLIB_MAX_VOICES=32`.
const ENV_PREFIX: &str = "SNDLIB";

/// A YAML representation of the sound engine configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// The output device: a cpal device name, "default", "null" or "mock...".
    device: Option<String>,

    /// Number of hardware voices in the pool (default: 100).
    max_voices: Option<usize>,

    /// Directory holding sound.dat and the speech banks.
    sound_dir: Option<PathBuf>,

    /// Directory holding file-based music tracks.
    music_dir: Option<PathBuf>,

    /// Directory holding streamed clips.
    media_dir: Option<PathBuf>,

    /// Speech bank language code (default: "eng").
    language: Option<String>,

    /// Play music tracks from files instead of CD audio (default: true).
    music_from_files: Option<bool>,

    /// Fade-out applied when music is stopped (default: 1s).
    music_fade: Option<String>,

    /// Randomizes the pitch of a voice now and then.
    pitch_easter_egg: Option<bool>,

    /// Turns the whole engine off for the session.
    sound_disabled: Option<bool>,
}

impl EngineConfig {
    /// Parses the configuration from a YAML file, applying environment overrides.
    pub fn from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
        Self::build(Config::builder().add_source(File::from(path)))
    }

    /// Parses the configuration from a YAML string, applying environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<EngineConfig, ConfigError> {
        Self::build(Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        // Surface a bad duration at load time rather than on first stop.
        config.music_fade()?;
        Ok(config)
    }

    /// Returns the output device name.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES)
    }

    pub fn sound_dir(&self) -> PathBuf {
        self.sound_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOUND_DIR))
    }

    pub fn music_dir(&self) -> PathBuf {
        self.music_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MUSIC_DIR))
    }

    pub fn media_dir(&self) -> PathBuf {
        self.media_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR))
    }

    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn music_from_files(&self) -> bool {
        self.music_from_files.unwrap_or(true)
    }

    /// Returns the music fade-out duration.
    pub fn music_fade(&self) -> Result<Duration, ConfigError> {
        match &self.music_fade {
            Some(fade) => DurationString::from_string(fade.clone())
                .map(Duration::from)
                .map_err(|e| ConfigError::Duration {
                    value: fade.clone(),
                    reason: e.to_string(),
                }),
            None => Ok(DEFAULT_MUSIC_FADE),
        }
    }

    pub fn pitch_easter_egg(&self) -> bool {
        self.pitch_easter_egg.unwrap_or(false)
    }

    pub fn sound_disabled(&self) -> bool {
        self.sound_disabled.unwrap_or(false)
    }

    /// Overrides the device. Used by the CLI and tests.
    pub fn with_device(mut self, device: &str) -> EngineConfig {
        self.device = Some(device.to_string());
        self
    }

    /// Overrides the size of the voice pool.
    pub fn with_max_voices(mut self, max_voices: usize) -> EngineConfig {
        self.max_voices = Some(max_voices);
        self
    }

    /// Overrides the asset root: sound, music and media all resolve under `root`.
    pub fn with_asset_root(mut self, root: &Path) -> EngineConfig {
        self.sound_dir = Some(root.join(self.sound_dir()));
        self.music_dir = Some(root.join(self.music_dir()));
        self.media_dir = Some(root.join(self.media_dir()));
        self
    }
}
