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
use std::{
    fmt,
    sync::Arc,
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use crate::audio::mixer::{MixEvents, SoftMixer};
use crate::audio::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use crate::audio::{BackendError, Clip, FinishedCallback, VoiceId};
use crate::bank::Sample;

/// Name that selects the host's default output device.
pub const DEFAULT_DEVICE: &str = "default";

#[derive(Default)]
struct Callbacks {
    channel: Option<FinishedCallback>,
    music: Option<FinishedCallback>,
}

/// State shared between the backend and the output callback.
#[derive(Clone)]
struct Shared {
    mixer: Arc<Mutex<SoftMixer>>,
    callbacks: Arc<Mutex<Callbacks>>,
}

impl Shared {
    /// Fires finished callbacks. Must be called without the mixer lock held.
    fn notify(&self, events: MixEvents) {
        if events.channel_finished.is_none() && events.music_finished.is_none() {
            return;
        }
        let mut callbacks = self.callbacks.lock();
        if let (Some(clip), Some(callback)) = (&events.channel_finished, callbacks.channel.as_mut()) {
            callback(clip);
        }
        if let (Some(clip), Some(callback)) = (&events.music_finished, callbacks.music.as_mut()) {
            callback(clip);
        }
    }
}

/// A cpal output device driven by the software mixer.
pub struct Backend {
    name: String,
    host_id: cpal::HostId,
    channels: u16,
    sample_rate: u32,
    shared: Shared,
    /// Dropping this sender stops the output thread.
    shutdown_tx: Option<crossbeam_channel::Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, Rate={}) ({})",
            self.name,
            self.channels,
            self.sample_rate,
            self.host_id.name()
        )
    }
}

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> Option<String> {
    device.name().ok()
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Shared,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let mut scratch: Vec<f32> = Vec::new();

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            configure_audio_thread_priority(priority, rt_audio, &mut priority_set);

            scratch.resize(data.len(), 0.0);
            let events = shared.mixer.lock().render(&mut scratch);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(*src);
            }
            shared.notify(events);
        },
        |err| error!(err = %err, "CPAL output stream error"),
        None,
    )
}

impl Backend {
    /// Lists the output devices of every available host.
    pub fn list() -> Result<Vec<String>, BackendError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout().map_err(|e| BackendError::Device(e.to_string()))?;
        let _shh_stderr = shh::stderr().map_err(|e| BackendError::Device(e.to_string()))?;

        let mut names = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = %e, host = host_id.name(), "Unable to open host");
                    continue;
                }
            };
            let devices = match host.output_devices() {
                Ok(devices) => devices,
                Err(e) => {
                    error!(err = %e, host = host_id.name(), "Unable to list devices for host");
                    continue;
                }
            };
            names.extend(devices.filter_map(|device| device_name(&device)));
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Opens the named output device, or the host default for `"default"`,
    /// and starts its output stream.
    pub fn get(name: &str) -> Result<Backend, BackendError> {
        let span = span!(Level::INFO, "open output (cpal)");
        let _enter = span.enter();

        let host = cpal::default_host();
        let host_id = host.id();
        let device = if name == DEFAULT_DEVICE {
            host.default_output_device().ok_or(BackendError::NoDevice)?
        } else {
            host.output_devices()
                .map_err(|e| BackendError::Device(e.to_string()))?
                .find(|device| device_name(device).is_some_and(|n| n.trim() == name))
                .ok_or_else(|| BackendError::Device(format!("no device found with name {}", name)))?
        };
        let device_label = device_name(&device).unwrap_or_else(|| name.to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| BackendError::Device(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();
        let channels = config.channels;
        let sample_rate = config.sample_rate;

        let shared = Shared {
            mixer: Arc::new(Mutex::new(SoftMixer::new(channels, sample_rate))),
            callbacks: Arc::new(Mutex::new(Callbacks::default())),
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), BackendError>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let stream_shared = shared.clone();

        // cpal streams are not Send, so the stream lives on its own thread.
        let output_thread = thread::spawn(move || {
            let stream = match sample_format {
                cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, stream_shared),
                cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, stream_shared),
                cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, stream_shared),
                cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, stream_shared),
                other => {
                    let _ = ready_tx.send(Err(BackendError::Stream(format!(
                        "unsupported sample format {:?}",
                        other
                    ))));
                    return;
                }
            };
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(BackendError::Stream(e.to_string())));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(BackendError::Stream(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Returns once the backend drops its sender.
            let _ = shutdown_rx.recv();
            drop(stream);
        });

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(e);
            }
            Err(_) => return Err(BackendError::Stream("output thread did not start".into())),
        }

        info!(
            device = device_label,
            channels,
            sample_rate,
            "CPAL output stream started"
        );

        Ok(Backend {
            name: device_label,
            host_id,
            channels,
            sample_rate,
            shared,
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.shutdown_tx.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl crate::audio::Backend for Backend {
    fn create_voice(&mut self) -> Result<VoiceId, BackendError> {
        Ok(self.shared.mixer.lock().create_voice())
    }

    fn destroy_voice(&mut self, voice: VoiceId) -> Result<(), BackendError> {
        self.shared.mixer.lock().destroy_voice(voice)
    }

    fn play(&mut self, voice: VoiceId, sample: &Sample, looping: bool) -> Result<(), BackendError> {
        self.shared.mixer.lock().play(voice, sample, looping)
    }

    fn stop(&mut self, voice: VoiceId) -> Result<(), BackendError> {
        self.shared.mixer.lock().stop(voice)
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), BackendError> {
        self.shared.mixer.lock().set_gain(voice, gain)
    }

    fn set_pitch(&mut self, voice: VoiceId, factor: f32) -> Result<(), BackendError> {
        self.shared.mixer.lock().set_pitch(voice, factor)
    }

    fn set_position(&mut self, voice: VoiceId, position: f32) -> Result<(), BackendError> {
        self.shared.mixer.lock().set_position(voice, position)
    }

    fn is_playing(&self, voice: VoiceId) -> Result<bool, BackendError> {
        self.shared.mixer.lock().is_playing(voice)
    }

    fn set_master_gain(&mut self, gain: f32) -> Result<(), BackendError> {
        self.shared.mixer.lock().set_master_gain(gain);
        Ok(())
    }

    fn play_channel(&mut self, clip: Arc<Clip>, volume: u32) -> Result<(), BackendError> {
        self.shared.mixer.lock().play_channel(clip, volume);
        Ok(())
    }

    fn halt_channel(&mut self) {
        self.shared.mixer.lock().halt_channel();
    }

    fn set_channel_volume(&mut self, volume: u32) {
        self.shared.mixer.lock().set_channel_volume(volume);
    }

    fn channel_playing(&self) -> bool {
        self.shared.mixer.lock().channel_playing()
    }

    fn on_channel_finished(&mut self, callback: FinishedCallback) {
        self.shared.callbacks.lock().channel = Some(callback);
    }

    fn play_music(&mut self, clip: Arc<Clip>, looping: bool) -> Result<(), BackendError> {
        self.shared.mixer.lock().play_music(clip, looping);
        Ok(())
    }

    fn pause_music(&mut self) {
        self.shared.mixer.lock().pause_music();
    }

    fn resume_music(&mut self) {
        self.shared.mixer.lock().resume_music();
    }

    fn halt_music(&mut self) {
        self.shared.mixer.lock().halt_music();
    }

    fn fade_out_music(&mut self, duration: Duration) -> bool {
        self.shared.mixer.lock().fade_out_music(duration)
    }

    fn is_fading_music(&self) -> bool {
        self.shared.mixer.lock().is_fading_music()
    }

    fn set_music_volume(&mut self, volume: u32) {
        self.shared.mixer.lock().set_music_volume(volume);
    }

    fn on_music_finished(&mut self, callback: FinishedCallback) {
        self.shared.callbacks.lock().music = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_fires_registered_callbacks() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let shared = Shared {
            mixer: Arc::new(Mutex::new(SoftMixer::new(2, 100))),
            callbacks: Arc::new(Mutex::new(Callbacks::default())),
        };
        let channel_calls = Arc::new(AtomicUsize::new(0));
        let music_calls = Arc::new(AtomicUsize::new(0));
        {
            let mut callbacks = shared.callbacks.lock();
            let channel_calls = channel_calls.clone();
            callbacks.channel = Some(Box::new(move |_: &Arc<Clip>| {
                channel_calls.fetch_add(1, Ordering::SeqCst);
            }));
            let music_calls = music_calls.clone();
            callbacks.music = Some(Box::new(move |_: &Arc<Clip>| {
                music_calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        shared.mixer.lock().play_channel(Arc::new(Clip::from_samples(vec![0.1], 1, 100)), 128);
        let mut out = vec![0.0f32; 4];
        let events = shared.mixer.lock().render(&mut out);
        shared.notify(events);
        shared.notify(MixEvents::default());

        assert_eq!(channel_calls.load(Ordering::SeqCst), 1);
        assert_eq!(music_calls.load(Ordering::SeqCst), 0);
    }
}
