use serde::{Deserialize, Serialize};

/// Which of the two mixer channels a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    Voice,
    Music,
}

impl ChannelRole {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Music => "music",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Voice => 0,
            Self::Music => 1,
        }
    }
}

/// An output device the engine can render to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Real-time channel metering (RMS and peak, 0.0–1.0), updated per render block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioLevels {
    pub voice_level: f32,
    pub music_level: f32,
    pub peak_voice_level: f32,
    pub peak_music_level: f32,
}

/// Point-in-time view of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStatus {
    pub role: ChannelRole,
    pub has_buffer: bool,
    pub is_playing: bool,
    pub offset_secs: f64,
    pub duration_secs: f64,
    pub gain_db: f32,
    /// Target amplitude multiplier (`10^(gain_db/20)`, or 0 when muted).
    pub gain_linear: f32,
    pub playback_rate: f32,
    pub looping: bool,
    pub muted: bool,
    pub loops_completed: u64,
    pub ended_count: u64,
}

/// Counters for debugging a mixer session.
#[derive(Debug, Clone, Default)]
pub struct SessionDiagnostics {
    pub render_blocks: u64,
    pub frames_rendered: u64,
    pub frames_captured: u64,
    pub loads_started: u64,
    pub loads_applied: u64,
    pub loads_discarded: u64,
}

/// What became of a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The decoded buffer was installed on its channel.
    Applied,
    /// A newer load for the same channel, or disposal, superseded this one.
    Discarded,
}
