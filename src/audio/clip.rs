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
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("'{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: SymphoniaError,
    },

    #[error("'{0}': no audio track found")]
    NoTrack(String),

    #[error("'{0}': sample rate not specified")]
    MissingSampleRate(String),

    #[error("'{0}': channel count could not be determined")]
    MissingChannels(String),
}

/// A fully decoded audio clip, interleaved f32. Decoding up front keeps file
/// IO out of the mixer callback.
#[derive(Clone)]
pub struct Clip {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl Clip {
    /// Decodes any file symphonia understands.
    pub fn from_file(path: &Path) -> Result<Clip, ClipError> {
        let path_display = path.display().to_string();
        let file = File::open(path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("{}: {}", path_display, e))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let decode_err = |source| ClipError::Decode {
            path: path_display.clone(),
            source,
        };

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(decode_err)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ClipError::NoTrack(path_display.clone()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| ClipError::MissingSampleRate(path_display.clone()))?;
        let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

        let mut decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(decode_err)?;

        let mut samples = Vec::new();
        let mut buffer: Option<SampleBuffer<f32>> = None;
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(decode_err(e)),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // A corrupt packet is skipped rather than failing the clip.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(path = %path_display, err = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(decode_err(e)),
            };

            if channels == 0 {
                channels = decoded.spec().channels.count() as u16;
            }
            let buf = buffer.get_or_insert_with(|| {
                SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
            });
            if buf.capacity() < decoded.capacity() * decoded.spec().channels.count() {
                *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
            }
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }

        if channels == 0 {
            return Err(ClipError::MissingChannels(path_display));
        }

        debug!(
            path = %path_display,
            channels,
            sample_rate,
            frames = samples.len() / usize::from(channels),
            "Loaded clip"
        );
        Ok(Clip {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Builds a clip from interleaved samples.
    pub fn from_samples(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Clip {
        Clip {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_from_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.wav");
        write_wav(&path, 2, 22050, &[0, 16384, -16384, 0, 8192, 8192]).unwrap();

        let clip = Clip::from_file(&path).unwrap();

        assert_eq!(clip.channels(), 2);
        assert_eq!(clip.sample_rate(), 22050);
        assert_eq!(clip.frames(), 3);
        assert!((clip.samples()[1] - 0.5).abs() < 1e-3);
        assert!((clip.samples()[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_missing_file() {
        let result = Clip::from_file(Path::new("/nonexistent/line.wav"));
        assert!(matches!(result, Err(ClipError::Io(_))));
    }

    #[test]
    fn test_not_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(Clip::from_file(&path).is_err());
    }
}
