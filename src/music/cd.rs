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
use tracing::debug;

/// A physical CD-audio player. Music tracks are played from it when the
/// engine is not configured to play them from files.
pub trait CdAudio: Send {
    fn play_track(&mut self, track: u32) -> bool;

    fn pause(&mut self);

    fn resume(&mut self);

    fn stop(&mut self);

    /// Volume in engine units, `0..=256`.
    fn set_volume(&mut self, volume: u32);

    fn is_playing(&self) -> bool;
}

/// Used when there is no CD drive. Requests are logged and dropped.
#[derive(Debug, Default)]
pub struct NoCdAudio;

impl CdAudio for NoCdAudio {
    fn play_track(&mut self, track: u32) -> bool {
        debug!(track, "No CD audio, track not played");
        false
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn stop(&mut self) {}

    fn set_volume(&mut self, volume: u32) {
        debug!(volume, "No CD audio, volume ignored");
    }

    fn is_playing(&self) -> bool {
        false
    }
}
