use crate::models::audio_models::{ChannelRole, ChannelStatus};
use crate::models::config::{MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
use crate::models::source::AudioBuffer;
use crate::processing::gain_ramp::{db_to_linear, GainRamp};

/// One independently controlled audio source: a decoded buffer behind its own
/// gain stage and (for voice) playback-rate control.
///
/// The channel renders into its own scratch block at the graph's output rate;
/// it never writes to a sink directly.
#[derive(Debug)]
pub struct Channel {
    role: ChannelRole,
    output_rate: u32,
    buffer: Option<AudioBuffer>,
    /// Read position in buffer frames.
    position: f64,
    gain_db: f32,
    gain: GainRamp,
    muted: bool,
    playback_rate: f32,
    looping: bool,
    playing: bool,
    /// A non-looping play-through reached the end and awaits a reset.
    finished: bool,
    loops_completed: u64,
    ended_count: u64,
    scratch: Vec<f32>,
}

impl Channel {
    pub fn new(role: ChannelRole, output_rate: u32, gain_db: f32, ramp_secs: f32) -> Self {
        let ramp_frames = (ramp_secs * output_rate as f32).round() as u32;
        Self {
            role,
            output_rate,
            buffer: None,
            position: 0.0,
            gain_db,
            gain: GainRamp::new(db_to_linear(gain_db), ramp_frames),
            muted: false,
            playback_rate: 1.0,
            looping: role == ChannelRole::Voice,
            playing: false,
            finished: false,
            loops_completed: 0,
            ended_count: 0,
            scratch: Vec::new(),
        }
    }

    /// Replace the buffer. Playback restarts from zero under the same
    /// play/pause state the channel had before.
    pub fn set_source(&mut self, buffer: AudioBuffer) {
        let was_playing = self.playing;
        self.buffer = Some(buffer);
        self.position = 0.0;
        self.finished = false;
        self.playing = was_playing;
    }

    /// Drop the buffer and stop.
    pub fn clear_source(&mut self) {
        self.buffer = None;
        self.playing = false;
        self.position = 0.0;
        self.finished = false;
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    /// Store the gain and retarget the amplitude multiplier.
    ///
    /// While audio is flowing the change is ramped; otherwise it applies at once.
    pub fn set_gain(&mut self, db: f32) {
        if db.is_nan() {
            log::warn!("Ignoring NaN gain for {} channel", self.role.name());
            return;
        }
        self.gain_db = db;
        self.apply_gain_target();
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Target amplitude multiplier, `10^(gain_db/20)`, or 0 when muted.
    pub fn gain_linear(&self) -> f32 {
        self.gain.target()
    }

    /// Multiplier applied to the most recently rendered frame.
    pub fn current_gain(&self) -> f32 {
        self.gain.current()
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.muted != muted {
            self.muted = muted;
            self.apply_gain_target();
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Clamp `rate` to [0.25, 6.0] and use it from the next render block.
    ///
    /// Only the voice channel has rate control; music keeps 1.0.
    pub fn set_playback_rate(&mut self, rate: f32) -> f32 {
        if self.role != ChannelRole::Voice {
            log::warn!("Playback rate is fixed on the {} channel", self.role.name());
            return self.playback_rate;
        }
        if rate.is_nan() {
            log::warn!("Ignoring NaN playback rate");
            return self.playback_rate;
        }
        self.playback_rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        self.playback_rate
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    /// Music always plays once through; only voice may change looping.
    pub fn set_looping(&mut self, looping: bool) {
        if self.role != ChannelRole::Voice {
            log::warn!("Looping is fixed off on the {} channel", self.role.name());
            return;
        }
        self.looping = looping;
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Start or resume from the current offset. Returns whether anything changed.
    ///
    /// No-op when already playing, when no buffer is loaded, or when a
    /// non-looping play-through has finished and not yet been reset.
    pub fn start(&mut self) -> bool {
        if self.playing || self.buffer.is_none() || self.finished {
            return false;
        }
        self.playing = true;
        true
    }

    /// Freeze at the current offset. Returns whether anything changed.
    pub fn pause(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        self.playing = false;
        true
    }

    /// Stop and rewind to offset zero.
    pub fn reset(&mut self) {
        self.playing = false;
        self.position = 0.0;
        self.finished = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn offset_secs(&self) -> f64 {
        match &self.buffer {
            Some(buffer) if buffer.sample_rate() > 0 => self.position / buffer.sample_rate() as f64,
            _ => 0.0,
        }
    }

    pub fn loops_completed(&self) -> u64 {
        self.loops_completed
    }

    pub fn ended_count(&self) -> u64 {
        self.ended_count
    }

    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            role: self.role,
            has_buffer: self.has_buffer(),
            is_playing: self.playing,
            offset_secs: self.offset_secs(),
            duration_secs: self.buffer.as_ref().map(|b| b.duration_secs()).unwrap_or(0.0),
            gain_db: self.gain_db,
            gain_linear: self.gain_linear(),
            playback_rate: self.playback_rate,
            looping: self.looping,
            muted: self.muted,
            loops_completed: self.loops_completed,
            ended_count: self.ended_count,
        }
    }

    /// Render `frames` stereo frames into the scratch block.
    ///
    /// Returns `true` when a non-looping play-through ended inside this block.
    pub fn render(&mut self, frames: usize) -> bool {
        let len = frames * 2;
        if self.scratch.len() < len {
            self.scratch.resize(len, 0.0);
        }
        self.scratch[..len].fill(0.0);

        if !self.playing {
            return false;
        }
        let Some(buffer) = self.buffer.as_ref() else {
            return false;
        };
        let total = buffer.frames();
        if total == 0 || self.output_rate == 0 {
            self.playing = false;
            return false;
        }

        let samples = buffer.samples();
        let step = self.playback_rate as f64 * buffer.sample_rate() as f64 / self.output_rate as f64;
        let end = total as f64;
        let mut ended = false;

        for frame in 0..frames {
            let index = self.position as usize;
            let fraction = (self.position - index as f64) as f32;
            // Interpolate across the seam when looping so the wrap is gapless.
            let next = if index + 1 < total {
                index + 1
            } else if self.looping {
                0
            } else {
                index
            };

            let gain = self.gain.next_gain();
            let left = samples[index * 2] * (1.0 - fraction) + samples[next * 2] * fraction;
            let right = samples[index * 2 + 1] * (1.0 - fraction) + samples[next * 2 + 1] * fraction;
            self.scratch[frame * 2] = left * gain;
            self.scratch[frame * 2 + 1] = right * gain;

            self.position += step;
            if self.position >= end {
                if self.looping {
                    let wraps = (self.position / end).floor();
                    self.position -= wraps * end;
                    self.loops_completed += wraps as u64;
                } else {
                    self.position = end;
                    self.playing = false;
                    self.finished = true;
                    self.ended_count += 1;
                    ended = true;
                    break;
                }
            }
        }

        ended
    }

    /// The block produced by the last `render` call.
    pub fn scratch(&self, frames: usize) -> &[f32] {
        &self.scratch[..(frames * 2).min(self.scratch.len())]
    }

    fn apply_gain_target(&mut self) {
        let target = if self.muted { 0.0 } else { db_to_linear(self.gain_db) };
        if self.playing {
            self.gain.ramp_to(target);
        } else {
            self.gain.jump_to(target);
        }
    }
}
