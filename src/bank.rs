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
//! Sound bank loading.
//!
//! A bank file ends with a 4-byte offset pointing at a header block. The header
//! holds a signature, a version and a fixed table of directory entries; entry 2
//! describes the sample descriptor table and the start of the waveform data.
//! Every descriptor points at one RIFF/WAVE blob which is decoded up front, so
//! banks are fully resident once loaded.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::wave::{self, PcmFormat, WaveError};

/// Position of a sample inside its bank.
pub type SampleTableId = u16;

/// Bank selector: 0 for effects, 1 for speech.
pub type BankId = u8;

/// Gameplay-facing sound effect id stored in a descriptor.
pub type SfxId = u16;

/// Bank holding sound effects.
pub const EFFECTS_BANK: BankId = 0;

/// Bank holding speech.
pub const SPEECH_BANK: BankId = 1;

const SIGNATURE_SIZE: usize = 14;
const HEADER_SIZE: u64 = SIGNATURE_SIZE as u64 + 4;
const DIRECTORY_ENTRIES: usize = 9;
const DIRECTORY_ENTRY_SIZE: usize = 16;
const DIRECTORY_INDEX: usize = 2;
const FILENAME_SIZE: usize = 18;

const _: () = assert!(DIRECTORY_INDEX < DIRECTORY_ENTRIES);

/// Size of one sample descriptor on disk.
pub const DESCRIPTOR_SIZE: u32 = 32;

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid first sample offset")]
    InvalidSampleOffset,

    #[error("invalid samples size {size}")]
    InvalidSamplesSize { size: u32 },

    #[error("failed to load sample {index} ({filename}): {source}")]
    Sample {
        index: usize,
        filename: String,
        #[source]
        source: WaveError,
    },
}

/// A decoded sample. Immutable once loaded.
#[derive(Clone)]
pub struct Sample {
    sfx_id: SfxId,
    filename: String,
    sample_rate: u32,
    format: PcmFormat,
    format_tag: u16,
    format_flags: u8,
    data: Arc<[u8]>,
}

impl Sample {
    /// Creates a sample from already decoded PCM.
    pub fn new(sfx_id: SfxId, filename: &str, sample_rate: u32, format: PcmFormat, data: Vec<u8>) -> Sample {
        Sample {
            sfx_id,
            filename: filename.to_string(),
            sample_rate,
            format,
            format_tag: wave::WAVE_FORMAT_PCM,
            format_flags: 0,
            data: data.into(),
        }
    }

    pub fn sfx_id(&self) -> SfxId {
        self.sfx_id
    }

    /// The source filename recorded in the bank, for diagnostics.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn channel_count(&self) -> u16 {
        self.format.channels()
    }

    pub fn bit_depth(&self) -> u16 {
        self.format.bits_per_sample()
    }

    pub fn format_tag(&self) -> u16 {
        self.format_tag
    }

    pub fn format_flags(&self) -> u8 {
        self.format_flags
    }

    /// The PCM payload, shared with any voice playing it.
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Number of frames in the payload.
    pub fn frames(&self) -> usize {
        self.data.len() / self.format.bytes_per_frame()
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("sfx_id", &self.sfx_id)
            .field("filename", &self.filename)
            .field("sample_rate", &self.sample_rate)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// An ordered list of samples, indexed by sample table id.
#[derive(Debug, Clone, Default)]
pub struct SoundBank {
    samples: Vec<Sample>,
    path: Option<PathBuf>,
}

impl SoundBank {
    pub fn new(samples: Vec<Sample>) -> SoundBank {
        SoundBank {
            samples,
            path: None,
        }
    }

    pub fn get(&self, id: SampleTableId) -> Option<&Sample> {
        self.samples.get(usize::from(id))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// The file this bank was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// The effects and speech banks.
#[derive(Debug, Default)]
pub struct SoundBanks {
    pub effects: SoundBank,
    pub speech: SoundBank,
}

impl SoundBanks {
    pub fn get(&self, bank_id: BankId) -> Option<&SoundBank> {
        match bank_id {
            EFFECTS_BANK => Some(&self.effects),
            SPEECH_BANK => Some(&self.speech),
            _ => None,
        }
    }

    pub fn sample(&self, bank_id: BankId, id: SampleTableId) -> Option<&Sample> {
        self.get(bank_id)?.get(id)
    }
}

#[derive(Debug, Clone, Copy)]
struct DirectoryEntry {
    first_sample_offset: u32,
    first_data_offset: u32,
    total_samples_size: u32,
}

#[derive(Debug)]
struct Descriptor {
    filename: String,
    data_offset: u32,
    sample_rate: u32,
    data_size: u32,
    sfx_id: SfxId,
    format_flags: u8,
}

/// Loads every sample of the bank file at `path`.
pub fn load_bank(path: &Path) -> Result<SoundBank, BankError> {
    info!(path = ?path, "Loading sound bank");
    let mut reader = BufReader::new(File::open(path)?);
    let mut bank = read_bank(&mut reader)?;
    bank.path = Some(path.to_path_buf());
    Ok(bank)
}

/// Reads a bank from any seekable stream.
pub fn read_bank<R: Read + Seek>(reader: &mut R) -> Result<SoundBank, BankError> {
    reader.seek(SeekFrom::End(-4))?;
    let header_offset = read_u32(reader)?;

    let entry = read_directory(reader, u64::from(header_offset))?;
    if entry.first_sample_offset == 0 {
        return Err(BankError::InvalidSampleOffset);
    }
    if entry.total_samples_size < DESCRIPTOR_SIZE {
        return Err(BankError::InvalidSamplesSize {
            size: entry.total_samples_size,
        });
    }

    // The descriptor table has to fit inside the file.
    let stream_len = reader.seek(SeekFrom::End(0))?;
    let table_end = u64::from(entry.first_sample_offset) + u64::from(entry.total_samples_size);
    if table_end > stream_len {
        return Err(BankError::InvalidSamplesSize {
            size: entry.total_samples_size,
        });
    }

    let sample_count = (entry.total_samples_size / DESCRIPTOR_SIZE) as usize;
    let mut samples = Vec::new();
    for index in 0..sample_count {
        let offset = u64::from(entry.first_sample_offset) + (index as u64) * u64::from(DESCRIPTOR_SIZE);
        reader.seek(SeekFrom::Start(offset))?;
        let descriptor = read_descriptor(reader)?;

        reader.seek(SeekFrom::Start(
            u64::from(entry.first_data_offset) + u64::from(descriptor.data_offset),
        ))?;
        let waveform = match wave::decode(reader) {
            Ok(waveform) => waveform,
            Err(e) => {
                error!(
                    index,
                    filename = %descriptor.filename,
                    err = %e,
                    "Failed to load sound sample"
                );
                return Err(BankError::Sample {
                    index,
                    filename: descriptor.filename,
                    source: e,
                });
            }
        };
        debug!(
            index,
            sfx_id = descriptor.sfx_id,
            filename = %descriptor.filename,
            size = descriptor.data_size,
            descriptor_rate = descriptor.sample_rate,
            rate = waveform.sample_rate,
            format = ?waveform.format,
            "Decoded sample"
        );

        samples.push(Sample {
            sfx_id: descriptor.sfx_id,
            filename: descriptor.filename,
            sample_rate: waveform.sample_rate,
            format: waveform.format,
            format_tag: waveform.format_tag,
            format_flags: descriptor.format_flags,
            data: waveform.data.into(),
        });
    }

    info!(count = samples.len(), "Loaded {} sound samples", samples.len());
    Ok(SoundBank::new(samples))
}

fn read_directory<R: Read + Seek>(reader: &mut R, header_offset: u64) -> Result<DirectoryEntry, BankError> {
    // The signature and version are informational only.
    reader.seek(SeekFrom::Start(
        header_offset + HEADER_SIZE + (DIRECTORY_INDEX * DIRECTORY_ENTRY_SIZE) as u64,
    ))?;

    Ok(DirectoryEntry {
        first_sample_offset: read_u32(reader)?,
        first_data_offset: read_u32(reader)?,
        total_samples_size: read_u32(reader)?,
    })
}

fn read_descriptor<R: Read>(reader: &mut R) -> Result<Descriptor, BankError> {
    let mut raw = [0u8; DESCRIPTOR_SIZE as usize];
    reader.read_exact(&mut raw)?;

    let name = &raw[..FILENAME_SIZE];
    let end = name.iter().position(|b| *b == 0).unwrap_or(FILENAME_SIZE);
    let field = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);

    Ok(Descriptor {
        filename: String::from_utf8_lossy(&name[..end]).into_owned(),
        data_offset: field(18),
        sample_rate: field(22),
        data_size: field(26),
        sfx_id: SfxId::from(raw[30]),
        format_flags: raw[31],
    })
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}
