//! Live output through cpal.
//!
//! The `cpal::Stream` is not `Send` on every platform, so it is built, played
//! and dropped on one dedicated thread; this type only holds the thread's
//! control handles.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;

use affirm_mix_core::models::audio_models::OutputDeviceInfo;
use affirm_mix_core::models::error::MixerError;
use affirm_mix_core::traits::output_device::{OutputDevice, OutputUnlock, RenderCallback};

use crate::device_enumerator::{describe, resolve_device};

/// Platform output device driven by cpal.
///
/// Renders stereo from the mixer and maps it onto however many channels the
/// device exposes.
pub struct CpalOutput {
    device_name: Option<String>,
    info: OutputDeviceInfo,
    running: Arc<AtomicBool>,
    stream_handle: Mutex<Option<thread::JoinHandle<()>>>,
    error_count: Arc<AtomicU32>,
}

impl CpalOutput {
    /// Open the system default output device.
    pub fn default_device() -> Result<Self, MixerError> {
        Self::open(None)
    }

    /// Open an output device by name, falling back to the default device.
    pub fn with_device(name: impl Into<String>) -> Result<Self, MixerError> {
        Self::open(Some(name.into()))
    }

    fn open(device_name: Option<String>) -> Result<Self, MixerError> {
        let host = cpal::default_host();
        let device = resolve_device(&host, device_name.as_deref())?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        let info = describe(&device, name, device_name.is_none())?;

        log::info!(
            "Using output '{}' ({} Hz, {} ch)",
            info.name,
            info.sample_rate,
            info.channels
        );

        Ok(Self {
            device_name,
            info,
            running: Arc::new(AtomicBool::new(false)),
            stream_handle: Mutex::new(None),
            error_count: Arc::new(AtomicU32::new(0)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl OutputDevice for CpalOutput {
    fn is_available(&self) -> bool {
        resolve_device(&cpal::default_host(), self.device_name.as_deref()).is_ok()
    }

    fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    fn start(&self, render: RenderCallback) -> Result<(), MixerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MixerError::Device("output stream already running".into()));
        }

        let running = Arc::clone(&self.running);
        let error_count = Arc::clone(&self.error_count);
        let device_name = self.device_name.clone();
        let sample_rate = self.info.sample_rate;
        let (ready_tx, ready_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("cpal-output".into())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), sample_rate, render, error_count) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(20));
                }
                if let Err(e) = stream.pause() {
                    log::debug!("Failed to pause output stream: {}", e);
                }
                drop(stream);
                log::debug!("Output stream closed");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                MixerError::Device(format!("failed to spawn output thread: {}", e))
            })?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(MixerError::Device("output thread exited during startup".into())));

        match ready {
            Ok(()) => {
                *self.stream_handle.lock() = Some(handle);
                log::info!("Output stream started on '{}'", self.info.name);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn stop(&self) -> Result<(), MixerError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.stream_handle.lock().take() {
            handle
                .join()
                .map_err(|_| MixerError::Device("output thread panicked".into()))?;
            let errors = self.error_count.swap(0, Ordering::SeqCst);
            if errors > 0 {
                log::warn!("Output '{}' reported {} stream errors", self.info.name, errors);
            }
        }
        Ok(())
    }

    fn device_info(&self) -> OutputDeviceInfo {
        self.info.clone()
    }
}

#[async_trait]
impl OutputUnlock for CpalOutput {
    /// Desktop output needs no user gesture; confirm the device is still
    /// present so a missing device surfaces before the first start.
    async fn unlock(&self) -> Result<(), MixerError> {
        let device_name = self.device_name.clone();
        tokio::task::spawn_blocking(move || {
            resolve_device(&cpal::default_host(), device_name.as_deref())
                .map(|_| ())
                .map_err(|e| MixerError::Unlock(e.to_string()))
        })
        .await
        .map_err(|e| MixerError::Unlock(format!("device probe failed: {}", e)))?
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Build and start a stream on the output thread.
fn open_stream(
    device_name: Option<&str>,
    sample_rate: u32,
    render: RenderCallback,
    error_count: Arc<AtomicU32>,
) -> Result<Stream, MixerError> {
    let host = cpal::default_host();
    let device = resolve_device(&host, device_name)?;
    let supported = device
        .default_output_config()
        .map_err(|e| MixerError::Device(format!("failed to query output config: {}", e)))?;

    let sample_format = supported.sample_format();
    let mut config: StreamConfig = supported.config();
    config.sample_rate = cpal::SampleRate(sample_rate);

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, render, error_count)?,
        SampleFormat::F64 => build_stream::<f64>(&device, &config, render, error_count)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, render, error_count)?,
        SampleFormat::I32 => build_stream::<i32>(&device, &config, render, error_count)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, render, error_count)?,
        other => {
            return Err(MixerError::Device(format!("unsupported sample format: {:?}", other)));
        }
    };

    stream
        .play()
        .map_err(|e| MixerError::Device(format!("failed to start stream: {}", e)))?;
    Ok(stream)
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    render: RenderCallback,
    error_count: Arc<AtomicU32>,
) -> Result<Stream, MixerError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut stereo: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                stereo.resize(frames * 2, 0.0);
                render(&mut stereo);
                write_frames(data, channels, &stereo);
            },
            move |err| {
                log::error!("Output stream error: {}", err);
                error_count.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| MixerError::Device(format!("failed to build stream: {}", e)))
}

/// Spread interleaved stereo onto a device buffer with `channels` channels.
///
/// Mono devices get the average of both sides; channels past the second are silent.
fn write_frames<T>(data: &mut [T], channels: usize, stereo: &[f32])
where
    T: Sample + FromSample<f32>,
{
    if channels == 0 {
        return;
    }
    for (frame, pair) in data.chunks_mut(channels).zip(stereo.chunks_exact(2)) {
        if channels == 1 {
            frame[0] = T::from_sample(0.5 * (pair[0] + pair[1]));
            continue;
        }
        for (index, sample) in frame.iter_mut().enumerate() {
            let value = match index {
                0 => pair[0],
                1 => pair[1],
                _ => 0.0,
            };
            *sample = T::from_sample(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_passes_through() {
        let mut data = [0.0f32; 4];
        write_frames(&mut data, 2, &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(data, [0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn mono_device_gets_average() {
        let mut data = [0.0f32; 2];
        write_frames(&mut data, 1, &[0.2, 0.4, -0.5, 0.5]);
        assert!((data[0] - 0.3).abs() < 1e-6);
        assert_eq!(data[1], 0.0);
    }

    #[test]
    fn extra_channels_are_silent() {
        let mut data = [1.0f32; 8];
        write_frames(&mut data, 4, &[0.5, -0.5, 0.25, -0.25]);
        assert_eq!(data, [0.5, -0.5, 0.0, 0.0, 0.25, -0.25, 0.0, 0.0]);
    }

    #[test]
    fn integer_formats_are_scaled() {
        let mut data = [0i16; 2];
        write_frames(&mut data, 2, &[1.0, -1.0]);
        assert_eq!(data[0], i16::MAX);
        assert_eq!(data[1], i16::MIN);
    }

    #[test]
    fn opening_without_hardware_is_an_error_not_a_panic() {
        // Either a device exists, or a Device error is returned.
        match CpalOutput::default_device() {
            Ok(output) => {
                assert!(output.sample_rate() > 0);
                assert!(!output.is_running());
            }
            Err(e) => assert!(matches!(e, MixerError::Device(_))),
        }
    }
}
