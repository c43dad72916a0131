#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use affirm_mix_core::{
    AudioBuffer, AudioLevels, AudioSource, ChannelRole, MixerConfiguration, MixerDelegate, MixerError,
    MixerSession, OfflineOutput, RecordingResult, SourceLoader, TransportState,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

pub const RATE: u32 = 8000;

/// Session defaults with unity voice gain and rate so offsets are easy to reason about.
pub fn flat_config() -> MixerConfiguration {
    MixerConfiguration {
        voice_gain_db: 0.0,
        voice_rate: 1.0,
        ..Default::default()
    }
}

pub fn offline_session(config: MixerConfiguration) -> (Arc<OfflineOutput>, MixerSession<OfflineOutput>) {
    let output = Arc::new(OfflineOutput::new(RATE));
    let session = MixerSession::new(Arc::clone(&output), config).unwrap();
    (output, session)
}

/// 16-bit stereo WAV holding a sine tone.
pub fn sine_wav(secs: f64, freq: f32, amplitude: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (secs * RATE as f64).round() as usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / RATE as f32;
            let v = (t * freq * std::f32::consts::TAU).sin() * amplitude;
            let s = (v * i16::MAX as f32) as i16;
            writer.write_sample(s).unwrap();
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn sine_source(secs: f64, freq: f32) -> AudioSource {
    AudioSource::blob_with_mime(sine_wav(secs, freq, 0.4), "audio/wav")
}

pub fn constant_buffer(secs: f64, value: f32) -> AudioBuffer {
    let frames = (secs * RATE as f64).round() as usize;
    AudioBuffer::from_stereo(vec![value; frames * 2], RATE)
}

/// Loader serving named in-memory buffers. Names registered with
/// [`GatedLoader::gate`] block until released.
#[derive(Default)]
pub struct GatedLoader {
    buffers: Mutex<HashMap<String, AudioBuffer>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    entered: Arc<Notify>,
}

impl GatedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, buffer: AudioBuffer) {
        self.buffers.lock().insert(name.to_string(), buffer);
    }

    pub fn gate(&self, name: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().insert(name.to_string(), Arc::clone(&notify));
        notify
    }

    /// Resolves once some load has reached its gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl SourceLoader for GatedLoader {
    async fn load(&self, source: AudioSource) -> Result<AudioBuffer, MixerError> {
        let AudioSource::Url(name) = source else {
            return Err(MixerError::Decode("blob sources are not served here".into()));
        };
        let gate = self.gates.lock().get(&name).cloned();
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        self.buffers
            .lock()
            .get(&name)
            .cloned()
            .ok_or_else(|| MixerError::Fetch(format!("no buffer named {}", name)))
    }
}

/// Delegate that records every notification as a string.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.as_str() == name).count()
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }
}

impl MixerDelegate for EventLog {
    fn on_ready(&self, role: ChannelRole) {
        self.push(format!("ready:{}", role.name()));
    }

    fn on_started(&self) {
        self.push("started");
    }

    fn on_stopped(&self) {
        self.push("stopped");
    }

    fn on_paused(&self) {
        self.push("paused");
    }

    fn on_resumed(&self) {
        self.push("resumed");
    }

    fn on_state_changed(&self, state: TransportState) {
        self.push(format!("state:{}", state.name()));
    }

    fn on_channel_ended(&self, role: ChannelRole) {
        self.push(format!("ended:{}", role.name()));
    }

    fn on_levels_updated(&self, _levels: &AudioLevels) {}

    fn on_recording_finished(&self, _result: &RecordingResult) {
        self.push("recording_finished");
    }

    fn on_error(&self, error: &MixerError) {
        self.push(format!("error:{}", error));
    }
}
