use serde::{Deserialize, Serialize};

/// Lowest accepted voice playback-rate multiplier.
pub const MIN_PLAYBACK_RATE: f32 = 0.25;

/// Highest accepted voice playback-rate multiplier.
pub const MAX_PLAYBACK_RATE: f32 = 6.0;

/// Configuration for a mixer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfiguration {
    /// Initial voice channel gain in dB (default: -18).
    pub voice_gain_db: f32,

    /// Initial voice playback-rate multiplier (default: 1.4).
    pub voice_rate: f32,

    /// Whether the voice channel loops (default: true).
    pub voice_loop: bool,

    /// Initial music channel gain in dB (default: 0).
    pub music_gain_db: f32,

    /// Length of the gain smoothing ramp in seconds (default: 0.05).
    pub ramp_secs: f32,

    /// Linear level applied at the bus (default: 1.0).
    pub bus_level: f32,

    /// Bit depth of the encoded capture (default: 16). Valid values: 16, 24, 32.
    pub capture_bit_depth: u16,

    /// Suggested file name for saved recordings.
    pub download_file_name: String,
}

impl MixerConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.voice_gain_db.is_finite() || !self.music_gain_db.is_finite() {
            return Err("gain must be a finite number of dB".into());
        }
        if !self.voice_rate.is_finite() || self.voice_rate <= 0.0 {
            return Err(format!("invalid voice rate: {}", self.voice_rate));
        }
        if !(self.ramp_secs > 0.0 && self.ramp_secs <= 1.0) {
            return Err(format!("ramp must be in (0, 1] seconds, got {}", self.ramp_secs));
        }
        if !self.bus_level.is_finite() || self.bus_level < 0.0 {
            return Err(format!("invalid bus level: {}", self.bus_level));
        }
        if ![16, 24, 32].contains(&self.capture_bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.capture_bit_depth));
        }
        if self.download_file_name.trim().is_empty() {
            return Err("download file name must not be empty".into());
        }
        Ok(())
    }
}

impl Default for MixerConfiguration {
    fn default() -> Self {
        Self {
            voice_gain_db: -18.0,
            voice_rate: 1.4,
            voice_loop: true,
            music_gain_db: 0.0,
            ramp_secs: 0.05,
            bus_level: 1.0,
            capture_bit_depth: 16,
            download_file_name: "subliminal.wav".into(),
        }
    }
}
