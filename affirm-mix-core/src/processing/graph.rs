use crate::capture::tap::{CaptureSession, CaptureTap};
use crate::models::audio_models::{AudioLevels, ChannelRole};
use crate::models::config::MixerConfiguration;
use crate::models::source::AudioBuffer;
use crate::processing::bus_mixer::BusMixer;
use crate::processing::channel::Channel;

/// Owns the voice and music channels and routes both into one bus, which
/// feeds the output device and the capture tap.
///
/// ```text
/// [Voice Channel] ─┐
///                  ├→ [Bus] ─┬→ output device
/// [Music Channel] ─┘         └→ [Capture tap] → CaptureSession
/// ```
///
/// Channels are only ever heard through the bus.
#[derive(Debug)]
pub struct MixerGraph {
    bus: BusMixer,
    capture: CaptureTap,
    voice: Channel,
    music: Channel,
    running: bool,
    ended: Vec<ChannelRole>,
    levels: AudioLevels,
    render_blocks: u64,
    frames_rendered: u64,
    frames_captured: u64,
}

impl MixerGraph {
    pub fn new(output_rate: u32, config: &MixerConfiguration) -> Self {
        // Sinks first: a channel must never exist without a bus and tap to feed.
        let bus = BusMixer::new(config.bus_level);
        let capture = CaptureTap::new();

        let mut voice = Channel::new(ChannelRole::Voice, output_rate, config.voice_gain_db, config.ramp_secs);
        voice.set_playback_rate(config.voice_rate);
        voice.set_looping(config.voice_loop);
        let music = Channel::new(ChannelRole::Music, output_rate, config.music_gain_db, config.ramp_secs);

        log::debug!("Mixer graph built at {} Hz, bus level {}", output_rate, bus.level());

        Self {
            bus,
            capture,
            voice,
            music,
            running: false,
            ended: Vec::with_capacity(4),
            levels: AudioLevels::default(),
            render_blocks: 0,
            frames_rendered: 0,
            frames_captured: 0,
        }
    }

    pub fn bus_level(&self) -> f32 {
        self.bus.level()
    }

    pub fn voice(&self) -> &Channel {
        &self.voice
    }

    pub fn music(&self) -> &Channel {
        &self.music
    }

    pub fn channel(&self, role: ChannelRole) -> &Channel {
        match role {
            ChannelRole::Voice => &self.voice,
            ChannelRole::Music => &self.music,
        }
    }

    pub fn channel_mut(&mut self, role: ChannelRole) -> &mut Channel {
        match role {
            ChannelRole::Voice => &mut self.voice,
            ChannelRole::Music => &mut self.music,
        }
    }

    /// Install a buffer on a channel. A channel that gets its first buffer
    /// while the transport runs joins playback from offset zero.
    pub fn set_source(&mut self, role: ChannelRole, buffer: AudioBuffer) {
        let running = self.running;
        let channel = self.channel_mut(role);
        channel.set_source(buffer);
        if running {
            channel.start();
        }
    }

    /// Release both channels' buffers.
    pub fn clear_sources(&mut self) {
        self.voice.clear_source();
        self.music.clear_source();
    }

    /// Start (or resume) both channels within the same render block.
    pub fn start_all(&mut self) {
        self.running = true;
        self.voice.start();
        self.music.start();
    }

    /// Freeze both channels at their offsets.
    pub fn pause_all(&mut self) {
        self.running = false;
        self.voice.pause();
        self.music.pause();
    }

    /// Stop both channels and rewind them to zero.
    pub fn stop_all(&mut self) {
        self.running = false;
        self.voice.reset();
        self.music.reset();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn attach_capture(&mut self, session: CaptureSession) {
        self.capture.attach(session);
    }

    pub fn detach_capture(&mut self) -> Option<CaptureSession> {
        self.capture.detach()
    }

    /// Render one block of interleaved stereo into `out`.
    pub fn render(&mut self, out: &mut [f32]) {
        let frames = out.len() / 2;
        out.fill(0.0);

        let voice_ended = self.voice.render(frames);
        let music_ended = self.music.render(frames);

        let voice_block = self.voice.scratch(frames);
        let music_block = self.music.scratch(frames);
        self.bus.mix_into(out, voice_block);
        self.bus.mix_into(out, music_block);
        self.bus.finish(out);

        self.levels = AudioLevels {
            voice_level: BusMixer::rms_level(voice_block),
            music_level: BusMixer::rms_level(music_block),
            peak_voice_level: BusMixer::peak_level(voice_block),
            peak_music_level: BusMixer::peak_level(music_block),
        };

        self.frames_captured += self.capture.mirror(&out[..frames * 2]) as u64;

        if voice_ended {
            self.ended.push(ChannelRole::Voice);
        }
        if music_ended {
            self.ended.push(ChannelRole::Music);
        }

        self.render_blocks += 1;
        self.frames_rendered += frames as u64;
    }

    /// Drain "channel ended" notices raised by the render thread.
    pub fn take_ended(&mut self) -> Vec<ChannelRole> {
        std::mem::take(&mut self.ended)
    }

    pub fn levels(&self) -> AudioLevels {
        self.levels
    }

    pub fn render_blocks(&self) -> u64 {
        self.render_blocks
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }
}
