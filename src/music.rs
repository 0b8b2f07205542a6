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
//! Background music, played from files through the backend or from a CD.
//!
//! The backend owns the only strong reference to the current track, so a
//! track that ends or is halted is freed on the mixing thread. The finished
//! callback never touches controller state: it posts to a channel that
//! [`MusicController::poll`] drains on the main thread.

use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, error, info};

use crate::assets::{music_track_name, AssetResolver, FileGroup};
use crate::audio::levels::{music_volume, FULL_LOUDNESS};
use crate::audio::{Backend, Clip};

pub mod cd;

pub use cd::{CdAudio, NoCdAudio};

pub struct MusicController {
    current: Weak<Clip>,
    finished: Receiver<()>,
    from_files: bool,
    fade: Duration,
    cd: Box<dyn CdAudio>,
    volume: u32,
}

impl MusicController {
    /// Creates the controller and registers its finished callback with the backend.
    pub fn new(
        backend: &mut dyn Backend,
        from_files: bool,
        fade: Duration,
        cd: Box<dyn CdAudio>,
    ) -> MusicController {
        let (finished_tx, finished_rx) = crossbeam_channel::bounded::<()>(1);
        backend.on_music_finished(Box::new(move |_: &Arc<Clip>| {
            // A full channel already carries the news.
            let _ = finished_tx.try_send(());
        }));

        MusicController {
            current: Weak::new(),
            finished: finished_rx,
            from_files,
            fade,
            cd,
            volume: FULL_LOUDNESS,
        }
    }

    /// Loads the track at `path` and loops it, replacing the current one.
    pub fn play(&mut self, backend: &mut dyn Backend, path: &Path) -> bool {
        let clip = match Clip::from_file(path) {
            Ok(clip) => Arc::new(clip),
            Err(e) => {
                error!(path = ?path, err = %e, "Failed to load music");
                return false;
            }
        };

        let handle = Arc::downgrade(&clip);
        if let Err(e) = backend.play_music(clip, true) {
            error!(path = ?path, err = %e, "Failed to play music");
            return false;
        }
        self.current = handle;

        info!(path = ?path, "Music playing");
        true
    }

    /// Plays a numbered track. Track 0 stops the music.
    pub fn play_track(
        &mut self,
        backend: &mut dyn Backend,
        resolver: &dyn AssetResolver,
        track: u32,
    ) -> bool {
        if track == 0 {
            self.stop(backend);
            return true;
        }

        if self.from_files {
            let path = resolver.resolve(FileGroup::Music, &music_track_name(track));
            self.play(backend, &path)
        } else {
            self.cd.play_track(track)
        }
    }

    pub fn pause(&mut self, backend: &mut dyn Backend) {
        if self.from_files {
            backend.pause_music();
        } else {
            self.cd.pause();
        }
    }

    pub fn resume(&mut self, backend: &mut dyn Backend) {
        if self.from_files {
            backend.resume_music();
        } else {
            self.cd.resume();
        }
    }

    /// Fades the music out. A fade already in progress is left alone.
    pub fn stop(&mut self, backend: &mut dyn Backend) {
        if !self.from_files {
            self.cd.stop();
            return;
        }
        if backend.is_fading_music() {
            return;
        }
        if backend.fade_out_music(self.fade) {
            debug!(fade = ?self.fade, "Music fading out");
        }
    }

    /// Sets the music volume, `0..=256`, on both the CD and the mixer.
    pub fn set_volume(&mut self, backend: &mut dyn Backend, volume: u32) {
        self.volume = volume;
        self.cd.set_volume(volume);
        backend.set_music_volume(music_volume(volume));
    }

    /// Sets the CD-audio volume only.
    pub fn set_cd_volume(&mut self, volume: u32) {
        self.cd.set_volume(volume);
    }

    pub fn volume(&self) -> u32 {
        self.volume
    }

    /// Drains finished notifications from the backend. Returns true if the
    /// music ended since the last poll.
    pub fn poll(&self) -> bool {
        let mut finished = false;
        while self.finished.try_recv().is_ok() {
            finished = true;
        }
        if finished {
            debug!("Music finished");
        }
        finished
    }

    pub fn is_playing(&self) -> bool {
        if self.from_files {
            self.current.strong_count() > 0
        } else {
            self.cd.is_playing()
        }
    }

    /// Halts the music immediately, without a fade.
    pub fn shutdown(&mut self, backend: &mut dyn Backend) {
        if self.from_files {
            backend.halt_music();
        } else {
            self.cd.stop();
        }
        self.current = Weak::new();
    }
}
