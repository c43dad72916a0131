use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::audio_models::OutputDeviceInfo;
use crate::models::error::MixerError;
use crate::traits::output_device::{OutputDevice, OutputUnlock, RenderCallback};

/// Output device without real-time clock: audio only advances when the host
/// calls [`OfflineOutput::pump`].
///
/// Used for tests and faster-than-real-time bounces. Everything rendered is
/// kept and can be taken with [`OfflineOutput::take_output`].
pub struct OfflineOutput {
    sample_rate: u32,
    block_frames: usize,
    render: Mutex<Option<RenderCallback>>,
    output: Mutex<Vec<f32>>,
    frames_pumped: AtomicU64,
    unlock_calls: AtomicUsize,
    reject_unlock: AtomicBool,
    fail_start: AtomicBool,
    available: AtomicBool,
}

impl OfflineOutput {
    pub const DEFAULT_BLOCK_FRAMES: usize = 128;

    pub fn new(sample_rate: u32) -> Self {
        Self::with_block_size(sample_rate, Self::DEFAULT_BLOCK_FRAMES)
    }

    pub fn with_block_size(sample_rate: u32, block_frames: usize) -> Self {
        Self {
            sample_rate,
            block_frames: block_frames.max(1),
            render: Mutex::new(None),
            output: Mutex::new(Vec::new()),
            frames_pumped: AtomicU64::new(0),
            unlock_calls: AtomicUsize::new(0),
            reject_unlock: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
            available: AtomicBool::new(true),
        }
    }

    /// Drive the render callback for at least `frames` frames, in whole
    /// blocks. Returns frames rendered; zero when the device is not started.
    pub fn pump(&self, frames: usize) -> usize {
        let Some(render) = self.render.lock().clone() else {
            return 0;
        };

        let blocks = frames.div_ceil(self.block_frames);
        let mut block = vec![0.0f32; self.block_frames * 2];
        let mut rendered = Vec::with_capacity(blocks * block.len());
        for _ in 0..blocks {
            render(&mut block);
            rendered.extend_from_slice(&block);
        }
        self.output.lock().extend_from_slice(&rendered);

        let total = blocks * self.block_frames;
        self.frames_pumped.fetch_add(total as u64, Ordering::SeqCst);
        total
    }

    /// Pump `secs` seconds of audio at the device rate.
    pub fn pump_secs(&self, secs: f64) -> usize {
        self.pump((secs * self.sample_rate as f64).round() as usize)
    }

    pub fn is_running(&self) -> bool {
        self.render.lock().is_some()
    }

    pub fn frames_pumped(&self) -> u64 {
        self.frames_pumped.load(Ordering::SeqCst)
    }

    /// Everything rendered so far, interleaved stereo.
    pub fn take_output(&self) -> Vec<f32> {
        std::mem::take(&mut *self.output.lock())
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent unlock attempts fail, as a browser does without a user gesture.
    pub fn set_reject_unlock(&self, reject: bool) {
        self.reject_unlock.store(reject, Ordering::SeqCst);
    }

    /// Make subsequent `start` calls fail.
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Report the device as unplugged (or present again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl OutputDevice for OfflineOutput {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&self, render: RenderCallback) -> Result<(), MixerError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(MixerError::Device("offline output refused to start".into()));
        }
        *self.render.lock() = Some(render);
        log::debug!("Offline output started at {} Hz", self.sample_rate);
        Ok(())
    }

    fn stop(&self) -> Result<(), MixerError> {
        self.render.lock().take();
        Ok(())
    }

    fn device_info(&self) -> OutputDeviceInfo {
        OutputDeviceInfo {
            id: "offline".into(),
            name: "Offline Output".into(),
            is_default: false,
            sample_rate: self.sample_rate,
            channels: 2,
        }
    }
}

#[async_trait]
impl OutputUnlock for OfflineOutput {
    async fn unlock(&self) -> Result<(), MixerError> {
        self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_unlock.load(Ordering::SeqCst) {
            return Err(MixerError::Unlock("activation requires a user gesture".into()));
        }
        Ok(())
    }
}
