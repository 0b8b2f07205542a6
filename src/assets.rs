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

use tracing::{debug, warn};

use crate::config::EngineConfig;

const EFFECTS_BANK_FILE: &str = "sound.dat";
const SPEECH_BANK_FILE: &str = "speech.dat";
const FALLBACK_LANGUAGE: &str = "eng";

/// Which asset directory a name is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileGroup {
    Sound,
    Music,
    Media,
}

/// Maps an asset name within a group to a path.
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, group: FileGroup, name: &str) -> PathBuf;
}

/// Resolves names against one directory per group. Absolute names are
/// returned unchanged.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    sound: PathBuf,
    music: PathBuf,
    media: PathBuf,
}

impl DirectoryResolver {
    pub fn new(sound: PathBuf, music: PathBuf, media: PathBuf) -> DirectoryResolver {
        DirectoryResolver {
            sound,
            music,
            media,
        }
    }

    pub fn from_config(config: &EngineConfig) -> DirectoryResolver {
        DirectoryResolver::new(config.sound_dir(), config.music_dir(), config.media_dir())
    }
}

impl AssetResolver for DirectoryResolver {
    fn resolve(&self, group: FileGroup, name: &str) -> PathBuf {
        let name = Path::new(name);
        if name.is_absolute() {
            return name.to_path_buf();
        }
        let base = match group {
            FileGroup::Sound => &self.sound,
            FileGroup::Music => &self.music,
            FileGroup::Media => &self.media,
        };
        base.join(name)
    }
}

/// Path of the effects bank.
pub fn effects_bank_path(resolver: &dyn AssetResolver) -> PathBuf {
    resolver.resolve(FileGroup::Sound, EFFECTS_BANK_FILE)
}

/// Path of the speech bank for `language`. Falls back to the
/// language-neutral bank, then to the English one.
pub fn speech_bank_path(resolver: &dyn AssetResolver, language: &str) -> PathBuf {
    let localized = resolver.resolve(FileGroup::Sound, &format!("speech_{language}.dat"));
    if localized.exists() {
        return localized;
    }

    let neutral = resolver.resolve(FileGroup::Sound, SPEECH_BANK_FILE);
    if neutral.exists() {
        debug!(language, path = ?neutral, "No localized speech bank, using neutral one");
        return neutral;
    }

    let fallback = resolver.resolve(
        FileGroup::Sound,
        &format!("speech_{FALLBACK_LANGUAGE}.dat"),
    );
    warn!(language, path = ?fallback, "No speech bank for language, falling back");
    fallback
}

/// File name of a numbered music track.
pub fn music_track_name(track: u32) -> String {
    format!("keeper{track:02}.ogg")
}
