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
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sndlib::audio::{self, levels};
use sndlib::bank::{self, BankId};
use sndlib::{AudioEngine, EngineConfig};

/// How often the CLI runs engine maintenance, roughly one game tick.
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A game sound engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the samples of a sound bank file.
    Bank {
        /// The path to the bank file.
        path: PathBuf,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Plays one sample from a bank through the configured device.
    Play {
        /// The engine configuration file.
        config: PathBuf,
        /// 0 for effects, 1 for speech.
        bank_id: BankId,
        /// The sample's index in the bank.
        index: u16,
        /// Overrides the configured device.
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Loops a music file until interrupted.
    Music {
        /// The engine configuration file.
        config: PathBuf,
        /// The music file.
        path: PathBuf,
    },
}

fn load_config(path: &Path, device: Option<&str>) -> Result<EngineConfig, Box<dyn Error>> {
    let config = EngineConfig::from_file(path)?;
    Ok(match device {
        Some(device) => config.with_device(device),
        None => config,
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Bank { path } => {
            let bank = bank::load_bank(&path)?;

            if bank.is_empty() {
                println!("No samples found in {}.", path.display());
                return Ok(());
            }

            println!("Samples ({}):", bank.len());
            for (index, sample) in bank.iter().enumerate() {
                println!(
                    "- {:4} sfx={:3} {:5}Hz {}ch {:2}bit {:7}B {}",
                    index,
                    sample.sfx_id(),
                    sample.sample_rate(),
                    sample.channel_count(),
                    sample.bit_depth(),
                    sample.data().len(),
                    sample.filename()
                );
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            config,
            bank_id,
            index,
            device,
        } => {
            let mut engine = AudioEngine::new(load_config(&config, device.as_deref())?);
            if !engine.init_audio() {
                return Err("unable to initialize sound".into());
            }

            engine.tick_maintenance();
            let Some(voice) = engine.play_sample(
                1,
                index,
                levels::FULL_LOUDNESS,
                levels::PAN_CENTER,
                levels::NORMAL_PITCH,
                0,
                0,
                bank_id,
            ) else {
                return Err(format!("unable to play sample {} of bank {}", index, bank_id).into());
            };
            println!(
                "Playing sample {} (sfx {}) on voice {}.",
                index,
                engine.get_sample_sfx_id(index, bank_id),
                voice
            );

            while engine.is_sample_playing(voice) {
                thread::sleep(TICK);
                engine.tick_maintenance();
            }
            engine.shutdown_audio();
        }
        Commands::Music { config, path } => {
            let mut engine = AudioEngine::new(load_config(&config, None)?);
            if !engine.init_audio() {
                return Err("unable to initialize sound".into());
            }

            let path = path.canonicalize()?;
            if !engine.play_music(&path.to_string_lossy()) {
                return Err(format!("unable to play {}", path.display()).into());
            }
            println!("Playing {}.", path.display());

            while engine.music_playing() {
                thread::sleep(TICK);
                engine.tick_maintenance();
            }
            engine.shutdown_audio();
        }
    }

    Ok(())
}
