use crate::models::error::MixerError;
use crate::models::state::RecorderState;

/// Capture lifecycle: `Idle → Recording → Finalizing → Idle`.
///
/// Only tracks state. Samples live in the `CaptureSession` attached to the
/// graph's capture tap.
#[derive(Debug, Default)]
pub struct CaptureRecorder {
    state: RecorderState,
}

impl CaptureRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Idle → Recording.
    pub fn begin(&mut self) -> Result<(), MixerError> {
        if !self.state.is_idle() {
            return Err(MixerError::AlreadyRecording);
        }
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Recording → Finalizing.
    pub fn begin_finalize(&mut self) -> Result<(), MixerError> {
        if !self.state.is_recording() {
            return Err(MixerError::NotRecording);
        }
        self.state = RecorderState::Finalizing;
        Ok(())
    }

    /// Finalizing → Idle, whether or not encoding succeeded.
    pub fn finish(&mut self) {
        self.state = RecorderState::Idle;
    }

    /// Drop any in-flight capture without encoding it.
    pub fn abort(&mut self) -> bool {
        let was_active = !self.state.is_idle();
        self.state = RecorderState::Idle;
        was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let mut recorder = CaptureRecorder::new();
        recorder.begin().unwrap();
        assert_eq!(recorder.state(), RecorderState::Recording);
        recorder.begin_finalize().unwrap();
        assert_eq!(recorder.state(), RecorderState::Finalizing);
        recorder.finish();
        assert_eq!(recorder.state(), RecorderState::Idle);
    }

    #[test]
    fn begin_twice_is_rejected() {
        let mut recorder = CaptureRecorder::new();
        recorder.begin().unwrap();
        assert_eq!(recorder.begin(), Err(MixerError::AlreadyRecording));
        assert_eq!(recorder.state(), RecorderState::Recording);
    }

    #[test]
    fn begin_while_finalizing_is_rejected() {
        let mut recorder = CaptureRecorder::new();
        recorder.begin().unwrap();
        recorder.begin_finalize().unwrap();
        assert_eq!(recorder.begin(), Err(MixerError::AlreadyRecording));
    }

    #[test]
    fn finalize_without_recording_is_rejected() {
        let mut recorder = CaptureRecorder::new();
        assert_eq!(recorder.begin_finalize(), Err(MixerError::NotRecording));

        recorder.begin().unwrap();
        recorder.begin_finalize().unwrap();
        assert_eq!(recorder.begin_finalize(), Err(MixerError::NotRecording));
    }

    #[test]
    fn abort_reports_whether_anything_was_dropped() {
        let mut recorder = CaptureRecorder::new();
        assert!(!recorder.abort());
        recorder.begin().unwrap();
        assert!(recorder.abort());
        assert!(recorder.state().is_idle());
    }
}
