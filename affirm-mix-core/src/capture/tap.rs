use chrono::{DateTime, Utc};

/// Samples accumulated while a recording is active.
#[derive(Debug)]
pub struct CaptureSession {
    samples: Vec<f32>,
    started_at: DateTime<Utc>,
}

impl CaptureSession {
    /// Reserve roughly `reserve_secs` of stereo audio up front so the render
    /// thread rarely reallocates.
    pub fn new(sample_rate: u32, reserve_secs: u32) -> Self {
        Self {
            samples: Vec::with_capacity(sample_rate as usize * 2 * reserve_secs as usize),
            started_at: Utc::now(),
        }
    }

    pub fn append(&mut self, block: &[f32]) {
        self.samples.extend_from_slice(block);
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Routing point that mirrors the bus into the active capture, if any,
/// without altering what is heard.
#[derive(Debug, Default)]
pub struct CaptureTap {
    session: Option<CaptureSession>,
}

impl CaptureTap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, session: CaptureSession) {
        self.session = Some(session);
    }

    pub fn detach(&mut self) -> Option<CaptureSession> {
        self.session.take()
    }

    /// Copy a finished bus block into the capture. Returns frames captured.
    pub fn mirror(&mut self, bus: &[f32]) -> usize {
        match self.session.as_mut() {
            Some(session) => {
                session.append(bus);
                bus.len() / 2
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_only_while_attached() {
        let mut tap = CaptureTap::new();
        assert_eq!(tap.mirror(&[0.1, 0.2]), 0);

        tap.attach(CaptureSession::new(8000, 1));
        assert_eq!(tap.mirror(&[0.1, 0.2, 0.3, 0.4]), 2);

        let session = tap.detach().unwrap();
        assert_eq!(session.frames(), 2);
        assert_eq!(session.into_samples(), vec![0.1, 0.2, 0.3, 0.4]);
        assert!(tap.detach().is_none());
        assert_eq!(tap.mirror(&[0.5, 0.5]), 0);
    }
}
