use std::sync::Arc;

use async_trait::async_trait;

use crate::models::audio_models::OutputDeviceInfo;
use crate::models::error::MixerError;

/// Callback invoked by the device clock to pull one block of audio.
///
/// The slice is interleaved stereo f32 at the device's `sample_rate()`;
/// the callee overwrites every sample.
pub type RenderCallback = Arc<dyn Fn(&mut [f32]) + Send + Sync + 'static>;

/// Interface for the sink that turns the mixed bus into sound.
///
/// Implemented by:
/// - `OfflineOutput` (this crate), a manually-clocked device for tests and bounces
/// - `CpalOutput` (`affirm-mix-cpal`), the platform default output
pub trait OutputDevice: Send + Sync {
    /// Whether a physical or virtual device is present.
    fn is_available(&self) -> bool;

    /// Rate at which the render callback is driven.
    fn sample_rate(&self) -> u32;

    /// Begin pulling audio through `render`.
    ///
    /// The callback fires on the device's own thread; keep work bounded.
    fn start(&self, render: RenderCallback) -> Result<(), MixerError>;

    /// Stop pulling audio and release the stream.
    fn stop(&self) -> Result<(), MixerError>;

    fn device_info(&self) -> OutputDeviceInfo;
}

/// One-time platform activation required before output is permitted.
///
/// Split from `OutputDevice` because it suspends, while stream control does not.
#[async_trait]
pub trait OutputUnlock: Send + Sync {
    async fn unlock(&self) -> Result<(), MixerError>;
}
