use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::audio_models::{AudioLevels, ChannelRole};
use crate::models::error::MixerError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::TransportState;
use crate::traits::mixer_delegate::MixerDelegate;

/// Fan-out of session notifications to every registered delegate, in
/// registration order.
#[derive(Default)]
pub struct EventDispatcher {
    delegates: RwLock<Vec<Arc<dyn MixerDelegate>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, delegate: Arc<dyn MixerDelegate>) {
        self.delegates.write().push(delegate);
    }

    // Snapshot first so a delegate may register another delegate from a callback.
    fn each(&self, f: impl Fn(&dyn MixerDelegate)) {
        let delegates = self.delegates.read().clone();
        for delegate in &delegates {
            f(delegate.as_ref());
        }
    }

    pub fn ready(&self, role: ChannelRole) {
        self.each(|d| d.on_ready(role));
    }

    pub fn started(&self) {
        self.each(|d| d.on_started());
    }

    pub fn stopped(&self) {
        self.each(|d| d.on_stopped());
    }

    pub fn paused(&self) {
        self.each(|d| d.on_paused());
    }

    pub fn resumed(&self) {
        self.each(|d| d.on_resumed());
    }

    pub fn state_changed(&self, state: TransportState) {
        self.each(|d| d.on_state_changed(state));
    }

    pub fn channel_ended(&self, role: ChannelRole) {
        self.each(|d| d.on_channel_ended(role));
    }

    pub fn levels_updated(&self, levels: &AudioLevels) {
        self.each(|d| d.on_levels_updated(levels));
    }

    pub fn recording_finished(&self, result: &RecordingResult) {
        self.each(|d| d.on_recording_finished(result));
    }

    pub fn error(&self, error: &MixerError) {
        self.each(|d| d.on_error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MixerDelegate for Tagged {
        fn on_started(&self) {
            self.log.lock().push(format!("{}:started", self.tag));
        }

        fn on_ready(&self, role: ChannelRole) {
            self.log.lock().push(format!("{}:ready:{}", self.tag, role.name()));
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new();
        dispatcher.add(Arc::new(Tagged { tag: "a", log: Arc::clone(&log) }));
        dispatcher.add(Arc::new(Tagged { tag: "b", log: Arc::clone(&log) }));

        dispatcher.ready(ChannelRole::Music);
        dispatcher.started();
        // Callbacks a delegate does not override are no-ops.
        dispatcher.stopped();

        assert_eq!(
            *log.lock(),
            vec!["a:ready:music", "b:ready:music", "a:started", "b:started"]
        );
    }

    #[test]
    fn empty_dispatcher_is_silent() {
        let dispatcher = EventDispatcher::new();
        dispatcher.error(&MixerError::Disposed);
        dispatcher.levels_updated(&AudioLevels::default());
    }
}
