use crate::models::audio_models::{AudioLevels, ChannelRole};
use crate::models::error::MixerError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::TransportState;

/// Observer for mixer session notifications.
///
/// Notifications are fire-and-forget and delivered to every registered
/// delegate in registration order. Transport and load notifications arrive on
/// the calling task; channel-ended and level updates arrive on the session's
/// event thread. Every method defaults to a no-op.
pub trait MixerDelegate: Send + Sync {
    /// A source finished loading into a channel.
    fn on_ready(&self, _role: ChannelRole) {}

    fn on_started(&self) {}

    fn on_stopped(&self) {}

    fn on_paused(&self) {}

    fn on_resumed(&self) {}

    fn on_state_changed(&self, _state: TransportState) {}

    /// A non-looping channel reached the end of its buffer.
    fn on_channel_ended(&self, _role: ChannelRole) {}

    /// Periodic channel metering while playing.
    fn on_levels_updated(&self, _levels: &AudioLevels) {}

    fn on_recording_finished(&self, _result: &RecordingResult) {}

    fn on_error(&self, _error: &MixerError) {}
}
