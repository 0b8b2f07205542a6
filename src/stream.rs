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
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::audio::levels::stream_volume;
use crate::audio::{Backend, Clip};

type Slot = Arc<Mutex<Option<Arc<Clip>>>>;

/// The reserved channel for speech and ambient clips. The installed clip is
/// shared with the backend's finished callback, so it sits behind a mutex and
/// is always released after the lock is dropped.
pub struct StreamChannel {
    slot: Slot,
}

impl StreamChannel {
    /// Creates the channel and registers its finished callback with the backend.
    pub fn new(backend: &mut dyn Backend) -> StreamChannel {
        let slot: Slot = Arc::new(Mutex::new(None));
        let callback_slot = slot.clone();
        backend.on_channel_finished(Box::new(move |finished: &Arc<Clip>| {
            let released = {
                let mut installed = callback_slot.lock();
                if installed
                    .as_ref()
                    .is_some_and(|clip| Arc::ptr_eq(clip, finished))
                {
                    installed.take()
                } else {
                    None
                }
            };
            drop(released);
        }));
        StreamChannel { slot }
    }

    /// Loads the clip at `path` and plays it, replacing the current one.
    /// `volume` ranges over `0..=255`. On failure the current clip keeps playing.
    pub fn play(&self, backend: &mut dyn Backend, path: &Path, volume: u32) -> bool {
        let clip = match Clip::from_file(path) {
            Ok(clip) => Arc::new(clip),
            Err(e) => {
                error!(path = ?path, err = %e, "Failed to load streamed sample");
                return false;
            }
        };

        let previous = {
            let mut installed = self.slot.lock();
            if let Err(e) = backend.play_channel(clip.clone(), stream_volume(volume)) {
                error!(path = ?path, err = %e, "Failed to play streamed sample");
                return false;
            }
            installed.replace(clip)
        };
        drop(previous);

        debug!(path = ?path, volume, "Streamed sample playing");
        true
    }

    /// Halts the channel and releases the installed clip.
    pub fn stop(&self, backend: &mut dyn Backend) {
        backend.halt_channel();
        let previous = self.slot.lock().take();
        drop(previous);
    }

    /// Re-applies a `0..=255` volume to the installed clip, if any.
    pub fn set_volume(&self, backend: &mut dyn Backend, volume: u32) {
        if self.slot.lock().is_none() {
            return;
        }
        backend.set_channel_volume(stream_volume(volume));
    }

    /// Whether nothing is playing on the channel.
    pub fn is_finished(&self, backend: &dyn Backend) -> bool {
        !backend.channel_playing()
    }

    /// Whether a clip is currently installed.
    pub fn has_clip(&self) -> bool {
        self.slot.lock().is_some()
    }
}
