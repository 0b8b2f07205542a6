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
/// Engine volume. `FULL_LOUDNESS` is unity gain.
pub type SoundVolume = u32;

/// Engine pan, `0..=128` with `PAN_CENTER` in the middle.
pub type SoundPan = u8;

/// Engine pitch. `NORMAL_PITCH` plays at the recorded rate.
pub type SoundPitch = u32;

pub const FULL_LOUDNESS: SoundVolume = 256;
pub const NORMAL_PITCH: SoundPitch = 100;
pub const PAN_CENTER: SoundPan = 64;
pub const PAN_RANGE: SoundPan = 128;

/// Native volume range of the streamed channel and the music player.
pub const MIXER_MAX_VOLUME: u32 = 128;

/// Largest volume accepted by the streamed channel.
pub const STREAM_MAX_VOLUME: u32 = 255;

/// Maps engine volume to a linear gain. Values above full loudness amplify.
pub fn gain(volume: SoundVolume) -> f32 {
    volume as f32 / FULL_LOUDNESS as f32
}

/// Maps engine pitch to a playback rate multiplier.
pub fn pitch_factor(pitch: SoundPitch) -> f32 {
    pitch as f32 / NORMAL_PITCH as f32
}

/// Maps engine pan to a stereo position in `[-0.5, 0.5]`.
///
/// Only half of the stereo field is used so hard pans stay audible in both
/// ears.
pub fn pan_position(pan: SoundPan) -> f32 {
    (f32::from(pan.min(PAN_RANGE)) - f32::from(PAN_CENTER)) / f32::from(PAN_RANGE)
}

/// Maps a `0..=255` streamed sample volume onto the mixer range.
pub fn stream_volume(volume: u32) -> u32 {
    volume.min(STREAM_MAX_VOLUME) * MIXER_MAX_VOLUME / STREAM_MAX_VOLUME
}

/// Maps a `0..=256` music volume onto the mixer range.
pub fn music_volume(volume: u32) -> u32 {
    volume.min(FULL_LOUDNESS) * MIXER_MAX_VOLUME / FULL_LOUDNESS
}

/// Converts a mixer-range volume to a linear gain.
pub fn mixer_gain(volume: u32) -> f32 {
    volume.min(MIXER_MAX_VOLUME) as f32 / MIXER_MAX_VOLUME as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain() {
        assert_eq!(gain(0), 0.0);
        assert_eq!(gain(FULL_LOUDNESS), 1.0);
        assert_eq!(gain(128), 0.5);
    }

    #[test]
    fn test_pitch_factor() {
        assert_eq!(pitch_factor(NORMAL_PITCH), 1.0);
        assert_eq!(pitch_factor(200), 2.0);
        assert_eq!(pitch_factor(50), 0.5);
    }

    #[test]
    fn test_pan_position() {
        assert_eq!(pan_position(PAN_CENTER), 0.0);
        assert_eq!(pan_position(0), -0.5);
        assert_eq!(pan_position(128), 0.5);
        // Clamped to the nominal range.
        assert_eq!(pan_position(255), 0.5);
    }

    #[test]
    fn test_channel_volumes() {
        assert_eq!(stream_volume(0), 0);
        assert_eq!(stream_volume(255), 128);
        assert_eq!(stream_volume(1000), 128);
        assert_eq!(music_volume(256), 128);
        assert_eq!(music_volume(128), 64);
        assert_eq!(mixer_gain(64), 0.5);
    }
}
