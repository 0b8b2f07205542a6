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
use std::error::Error;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::bank::{Sample, SfxId, SoundBank, SoundBanks};
use crate::wave::{PcmFormat, WAVE_FORMAT_PCM};

/// Wraps `body` in a RIFF chunk header, padding to an even length.
pub fn riff_chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(8 + body.len() + 1);
    chunk.extend_from_slice(tag);
    chunk.extend_from_slice(&(body.len() as u32).to_le_bytes());
    chunk.extend_from_slice(body);
    if body.len() % 2 == 1 {
        chunk.push(0);
    }
    chunk
}

/// A RIFF/WAVE blob made of the given chunks.
pub fn wave_bytes_with_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = chunks.iter().flatten().copied().collect();
    let mut bytes = Vec::with_capacity(12 + body.len());
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(4 + body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(&body);
    bytes
}

/// A minimal WAVE blob: a 16 byte `fmt ` chunk followed by `data`.
pub fn wave_bytes(tag: u16, channels: u16, bits: u16, rate: u32, payload: &[u8]) -> Vec<u8> {
    let block_align = channels * bits.div_ceil(8);
    let mut fmt = Vec::with_capacity(16);
    fmt.extend_from_slice(&tag.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&rate.to_le_bytes());
    fmt.extend_from_slice(&(rate * u32::from(block_align)).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&bits.to_le_bytes());

    wave_bytes_with_chunks(&[riff_chunk(b"fmt ", &fmt), riff_chunk(b"data", payload)])
}

/// A mono 16-bit PCM WAVE blob.
pub fn pcm16_wave(rate: u32, samples: &[i16]) -> Vec<u8> {
    let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    wave_bytes(WAVE_FORMAT_PCM, 1, 16, rate, &payload)
}

/// Assembles a bank file: a preamble, the descriptor table, the waveform
/// blobs, then the header block and the trailing header offset.
pub struct BankBuilder {
    samples: Vec<(String, u8, Vec<u8>)>,
    first_sample_offset: Option<u32>,
    total_samples_size: Option<u32>,
}

const PREAMBLE_SIZE: usize = 16;

impl BankBuilder {
    pub fn new() -> BankBuilder {
        BankBuilder {
            samples: Vec::new(),
            first_sample_offset: None,
            total_samples_size: None,
        }
    }

    pub fn sample(mut self, filename: &str, sfx_id: u8, wave: Vec<u8>) -> BankBuilder {
        self.samples.push((filename.to_string(), sfx_id, wave));
        self
    }

    /// Overrides the descriptor table offset written to the directory.
    pub fn first_sample_offset(mut self, offset: u32) -> BankBuilder {
        self.first_sample_offset = Some(offset);
        self
    }

    /// Overrides the descriptor table size written to the directory.
    pub fn total_samples_size(mut self, size: u32) -> BankBuilder {
        self.total_samples_size = Some(size);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; PREAMBLE_SIZE];

        let first_sample_offset = bytes.len() as u32;
        let descriptors_size = self.samples.len() * 32;
        let first_data_offset = (PREAMBLE_SIZE + descriptors_size) as u32;

        let mut data_offset = 0u32;
        for (filename, sfx_id, wave) in &self.samples {
            let mut descriptor = [0u8; 32];
            let name = filename.as_bytes();
            let len = name.len().min(17);
            descriptor[..len].copy_from_slice(&name[..len]);
            descriptor[18..22].copy_from_slice(&data_offset.to_le_bytes());
            descriptor[22..26].copy_from_slice(&22050u32.to_le_bytes());
            descriptor[26..30].copy_from_slice(&(wave.len() as u32).to_le_bytes());
            descriptor[30] = *sfx_id;
            bytes.extend_from_slice(&descriptor);
            data_offset += wave.len() as u32;
        }
        for (_, _, wave) in &self.samples {
            bytes.extend_from_slice(wave);
        }

        let header_offset = bytes.len() as u32;
        let mut signature = [0u8; 14];
        signature[..12].copy_from_slice(b"BULLFROG SND");
        bytes.extend_from_slice(&signature);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for index in 0..9 {
            if index == 2 {
                let offset = self.first_sample_offset.unwrap_or(first_sample_offset);
                bytes.extend_from_slice(&offset.to_le_bytes());
                bytes.extend_from_slice(&first_data_offset.to_le_bytes());
                let size = self.total_samples_size.unwrap_or(descriptors_size as u32);
                bytes.extend_from_slice(&size.to_le_bytes());
                bytes.extend_from_slice(&(self.samples.len() as u32).to_le_bytes());
            } else {
                bytes.extend_from_slice(&[0u8; 16]);
            }
        }
        bytes.extend_from_slice(&header_offset.to_le_bytes());
        bytes
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

/// Effects and speech banks with `effects` and `speech` short samples. Effects
/// carry sfx ids starting at 1, speech at 101.
pub fn test_banks(effects: usize, speech: usize) -> SoundBanks {
    let bank = |count: usize, first_id: SfxId, prefix: &str| {
        SoundBank::new(
            (0..count)
                .map(|i| {
                    Sample::new(
                        first_id + i as SfxId,
                        &format!("{prefix}{i}.wav"),
                        22050,
                        PcmFormat::Mono8,
                        vec![128, 160, 128, 96],
                    )
                })
                .collect(),
        )
    };
    SoundBanks {
        effects: bank(effects, 1, "fx"),
        speech: bank(speech, 101, "speech"),
    }
}

/// Writes interleaved 16-bit samples to a WAV file.
pub fn write_wav(
    path: &Path,
    channels: u16,
    sample_rate: u32,
    samples: &[i16],
) -> Result<(), Box<dyn Error>> {
    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with a subscriber that records everything at debug and above,
/// returning its result and the formatted output.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock()).into_owned();
    (result, logs)
}
