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
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// `WAVE_FORMAT_PCM`.
pub const WAVE_FORMAT_PCM: u16 = 1;

/// `WAVE_FORMAT_ADPCM`.
pub const WAVE_FORMAT_ADPCM: u16 = 2;

/// Size of the fixed part of `WAVEFORMATEX` (without `cbSize`).
const WAVEFORMATEX_SIZE: u32 = 16;

/// Errors that abort decoding of a single waveform.
#[derive(Debug, thiserror::Error)]
pub enum WaveError {
    #[error("expected RIFF chunk")]
    MissingRiff,

    #[error("expected WAVE file type")]
    MissingWave,

    #[error("no fmt chunk before end of stream")]
    MissingFormat,

    #[error("no data chunk before end of stream")]
    MissingData,

    #[error("fmt chunk of {size} bytes is smaller than WAVEFORMATEX")]
    FormatTooShort { size: u32 },

    #[error("unsupported format (tag={tag}, channels={channels}, bits={bits})")]
    UnsupportedFormat { tag: u16, channels: u16, bits: u16 },

    #[error("data chunk declares {expected} bytes but only {actual} remain")]
    TruncatedData { expected: u32, actual: usize },

    #[error("stereo ADPCM is not implemented")]
    StereoAdpcm,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Layout of decoded PCM data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmFormat {
    /// Unsigned 8-bit mono.
    Mono8,
    /// Signed 16-bit little-endian mono.
    Mono16,
    /// Unsigned 8-bit interleaved stereo.
    Stereo8,
    /// Signed 16-bit little-endian interleaved stereo.
    Stereo16,
}

impl PcmFormat {
    pub fn channels(self) -> u16 {
        match self {
            PcmFormat::Mono8 | PcmFormat::Mono16 => 1,
            PcmFormat::Stereo8 | PcmFormat::Stereo16 => 2,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        match self {
            PcmFormat::Mono8 | PcmFormat::Stereo8 => 8,
            PcmFormat::Mono16 | PcmFormat::Stereo16 => 16,
        }
    }

    /// Bytes occupied by one frame (one sample per channel).
    pub fn bytes_per_frame(self) -> usize {
        usize::from(self.channels()) * usize::from(self.bits_per_sample() / 8)
    }
}

/// A decoded waveform ready to be handed to a voice.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Layout of `data`. ADPCM input is reported as `Mono8` after expansion.
    pub format: PcmFormat,
    /// The format tag found in the `fmt ` chunk.
    pub format_tag: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// PCM payload.
    pub data: Vec<u8>,
}

/// The channel/bit combinations the `fmt ` chunk may describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceLayout {
    Pcm(PcmFormat),
    MonoAdpcm,
}

/// Decodes the waveform that starts at the reader's current position. PCM
/// passes through and mono 4-bit ADPCM is expanded to 8-bit PCM.
///
/// The reader is left somewhere after the `data` chunk; callers that read
/// several waveforms from one stream must seek explicitly before each call.
pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Waveform, WaveError> {
    let (tag, _) = read_chunk_header(reader).map_err(|e| eof_as(e, WaveError::MissingRiff))?;
    if &tag != b"RIFF" {
        return Err(WaveError::MissingRiff);
    }

    let mut file_type = [0u8; 4];
    reader
        .read_exact(&mut file_type)
        .map_err(|e| eof_as(e, WaveError::MissingWave))?;
    if &file_type != b"WAVE" {
        return Err(WaveError::MissingWave);
    }

    let mut format: Option<(SourceLayout, u16, u32)> = None;
    let mut data: Option<Vec<u8>> = None;

    while format.is_none() || data.is_none() {
        let (tag, size) = match read_chunk_header(reader) {
            Ok(header) => header,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(if format.is_none() {
                    WaveError::MissingFormat
                } else {
                    WaveError::MissingData
                });
            }
            Err(e) => return Err(e.into()),
        };

        match &tag {
            b"fmt " => {
                if size < WAVEFORMATEX_SIZE {
                    return Err(WaveError::FormatTooShort { size });
                }
                format = Some(read_format(reader)?);
                if size > WAVEFORMATEX_SIZE {
                    reader.seek(SeekFrom::Current(i64::from(size - WAVEFORMATEX_SIZE)))?;
                }
            }
            b"data" => {
                // Sized by what is actually there, not by the header.
                let mut payload = Vec::new();
                reader.by_ref().take(u64::from(size)).read_to_end(&mut payload)?;
                if payload.len() < size as usize {
                    return Err(WaveError::TruncatedData {
                        expected: size,
                        actual: payload.len(),
                    });
                }
                data = Some(payload);
            }
            _ => {
                reader.seek(SeekFrom::Current(i64::from(size)))?;
            }
        }
    }

    let (layout, format_tag, sample_rate) = format.ok_or(WaveError::MissingFormat)?;
    let data = data.ok_or(WaveError::MissingData)?;

    Ok(match layout {
        SourceLayout::Pcm(format) => Waveform {
            format,
            format_tag,
            sample_rate,
            data,
        },
        SourceLayout::MonoAdpcm => Waveform {
            format: PcmFormat::Mono8,
            format_tag,
            sample_rate,
            data: expand_adpcm(&data),
        },
    })
}

/// Decodes a waveform held entirely in memory.
pub fn decode_bytes(bytes: &[u8]) -> Result<Waveform, WaveError> {
    decode(&mut Cursor::new(bytes))
}

/// Expands 4-bit ADPCM-tagged mono data into 8-bit PCM.
///
/// Each input byte becomes two output bytes: the high nibble doubled, then the
/// low nibble masked to three bits and doubled.
pub fn expand_adpcm(data: &[u8]) -> Vec<u8> {
    let mut converted = Vec::with_capacity(data.len() * 2);
    for byte in data {
        converted.push((byte >> 4) * 2);
        converted.push((byte & 0x7) * 2);
    }
    converted
}

fn read_chunk_header<R: Read>(reader: &mut R) -> io::Result<([u8; 4], u32)> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;
    let tag = [header[0], header[1], header[2], header[3]];
    let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    Ok((tag, size))
}

fn read_format<R: Read>(reader: &mut R) -> Result<(SourceLayout, u16, u32), WaveError> {
    let mut raw = [0u8; WAVEFORMATEX_SIZE as usize];
    reader.read_exact(&mut raw)?;

    let tag = u16::from_le_bytes([raw[0], raw[1]]);
    let channels = u16::from_le_bytes([raw[2], raw[3]]);
    let sample_rate = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    // raw[8..12] is the average byte rate and raw[12..14] the block align.
    let bits = u16::from_le_bytes([raw[14], raw[15]]);

    if tag != WAVE_FORMAT_PCM && tag != WAVE_FORMAT_ADPCM {
        return Err(WaveError::UnsupportedFormat {
            tag,
            channels,
            bits,
        });
    }

    let layout = match (channels, bits) {
        (1, 4) => SourceLayout::MonoAdpcm,
        (1, 8) => SourceLayout::Pcm(PcmFormat::Mono8),
        (1, 16) => SourceLayout::Pcm(PcmFormat::Mono16),
        (2, 4) => return Err(WaveError::StereoAdpcm),
        (2, 8) => SourceLayout::Pcm(PcmFormat::Stereo8),
        (2, 16) => SourceLayout::Pcm(PcmFormat::Stereo16),
        _ => {
            return Err(WaveError::UnsupportedFormat {
                tag,
                channels,
                bits,
            })
        }
    };

    Ok((layout, tag, sample_rate))
}

fn eof_as(e: io::Error, missing: WaveError) -> WaveError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        missing
    } else {
        WaveError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{riff_chunk, wave_bytes, wave_bytes_with_chunks};

    #[test]
    fn test_decode_pcm16_mono() {
        let payload: Vec<u8> = [0i16, 1000, -1000, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let bytes = wave_bytes(WAVE_FORMAT_PCM, 1, 16, 22050, &payload);

        let wave = decode_bytes(&bytes).unwrap();

        assert_eq!(wave.format, PcmFormat::Mono16);
        assert_eq!(wave.sample_rate, 22050);
        assert_eq!(wave.format.channels(), 1);
        assert_eq!(wave.format.bits_per_sample(), 16);
        assert_eq!(wave.format_tag, WAVE_FORMAT_PCM);
        assert_eq!(wave.data, payload);
    }

    #[test]
    fn test_decode_pcm8_stereo() {
        let payload = vec![0x80, 0x7f, 0x00, 0xff];
        let bytes = wave_bytes(WAVE_FORMAT_PCM, 2, 8, 11025, &payload);

        let wave = decode_bytes(&bytes).unwrap();

        assert_eq!(wave.format, PcmFormat::Stereo8);
        assert_eq!(wave.format.bytes_per_frame(), 2);
        assert_eq!(wave.data, payload);
    }

    #[test]
    fn test_adpcm_expansion() {
        assert_eq!(expand_adpcm(&[0xAB]), vec![0x14, 0x06]);
        assert_eq!(expand_adpcm(&[0x00, 0xFF]), vec![0x00, 0x00, 0x1E, 0x0E]);
    }

    #[test]
    fn test_decode_mono_adpcm_expands_to_pcm8() {
        let bytes = wave_bytes(WAVE_FORMAT_ADPCM, 1, 4, 22050, &[0xAB]);

        let wave = decode_bytes(&bytes).unwrap();

        assert_eq!(wave.format, PcmFormat::Mono8);
        assert_eq!(wave.format_tag, WAVE_FORMAT_ADPCM);
        assert_eq!(wave.data, vec![0x14, 0x06]);
    }

    #[test]
    fn test_decode_oversized_data_chunk() {
        let mut bytes = wave_bytes(WAVE_FORMAT_PCM, 1, 8, 8000, &[1, 2, 3, 4]);
        let at = bytes.len() - 8;
        bytes[at..at + 4].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());

        assert!(matches!(
            decode_bytes(&bytes),
            Err(WaveError::TruncatedData {
                expected: 0xFFFF_FFF0,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_decode_stereo_adpcm_fails() {
        let bytes = wave_bytes(WAVE_FORMAT_ADPCM, 2, 4, 22050, &[0xAB, 0xCD]);
        assert!(matches!(decode_bytes(&bytes), Err(WaveError::StereoAdpcm)));
    }

    #[test]
    fn test_decode_unsupported_combinations() {
        let bytes = wave_bytes(3, 1, 32, 44100, &[0; 8]);
        assert!(matches!(
            decode_bytes(&bytes),
            Err(WaveError::UnsupportedFormat { tag: 3, .. })
        ));

        let bytes = wave_bytes(WAVE_FORMAT_PCM, 1, 24, 44100, &[0; 6]);
        assert!(matches!(
            decode_bytes(&bytes),
            Err(WaveError::UnsupportedFormat { bits: 24, .. })
        ));

        let bytes = wave_bytes(WAVE_FORMAT_PCM, 6, 16, 44100, &[0; 12]);
        assert!(matches!(
            decode_bytes(&bytes),
            Err(WaveError::UnsupportedFormat { channels: 6, .. })
        ));
    }

    #[test]
    fn test_decode_bad_tags() {
        let mut bytes = wave_bytes(WAVE_FORMAT_PCM, 1, 8, 8000, &[1, 2]);
        bytes[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(decode_bytes(&bytes), Err(WaveError::MissingRiff)));

        let mut bytes = wave_bytes(WAVE_FORMAT_PCM, 1, 8, 8000, &[1, 2]);
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(decode_bytes(&bytes), Err(WaveError::MissingWave)));

        assert!(matches!(decode_bytes(&[]), Err(WaveError::MissingRiff)));
    }

    #[test]
    fn test_decode_short_format_chunk() {
        let chunks = [riff_chunk(b"fmt ", &[1, 0, 1, 0, 0x22, 0x56, 0, 0])];
        let bytes = wave_bytes_with_chunks(&chunks);
        assert!(matches!(
            decode_bytes(&bytes),
            Err(WaveError::FormatTooShort { size: 8 })
        ));
    }

    #[test]
    fn test_decode_missing_chunks() {
        let bytes = wave_bytes_with_chunks(&[riff_chunk(b"data", &[1, 2, 3])]);
        assert!(matches!(decode_bytes(&bytes), Err(WaveError::MissingFormat)));

        let full = wave_bytes(WAVE_FORMAT_PCM, 1, 8, 8000, &[]);
        // Keep RIFF header and the fmt chunk only.
        let truncated = &full[..12 + 8 + 16];
        assert!(matches!(decode_bytes(truncated), Err(WaveError::MissingData)));
    }

    #[test]
    fn test_decode_skips_unknown_and_extended_chunks() {
        let mut fmt = Vec::new();
        fmt.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
        fmt.extend_from_slice(&1u16.to_le_bytes());
        fmt.extend_from_slice(&8000u32.to_le_bytes());
        fmt.extend_from_slice(&8000u32.to_le_bytes());
        fmt.extend_from_slice(&1u16.to_le_bytes());
        fmt.extend_from_slice(&8u16.to_le_bytes());
        // cbSize plus two bytes of extension data.
        fmt.extend_from_slice(&[2, 0, 0xEE, 0xEE]);

        let chunks = [
            riff_chunk(b"LIST", b"INFOjunk"),
            riff_chunk(b"fmt ", &fmt),
            riff_chunk(b"fact", &[4, 0, 0, 0]),
            riff_chunk(b"data", &[9, 8, 7, 6]),
        ];
        let wave = decode_bytes(&wave_bytes_with_chunks(&chunks)).unwrap();

        assert_eq!(wave.format, PcmFormat::Mono8);
        assert_eq!(wave.sample_rate, 8000);
        assert_eq!(wave.data, vec![9, 8, 7, 6]);
    }

    #[test]
    fn test_decode_truncated_data() {
        let mut bytes = wave_bytes(WAVE_FORMAT_PCM, 1, 8, 8000, &[1, 2, 3, 4]);
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            decode_bytes(&bytes),
            Err(WaveError::TruncatedData {
                expected: 4,
                actual: 2
            })
        ));
    }
}
