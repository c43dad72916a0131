use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::capture::recorder::CaptureRecorder;
use crate::capture::tap::CaptureSession;
use crate::capture::wav_encoder::{sha256_hex, WavEncoder};
use crate::loader::DecodingLoader;
use crate::models::audio_models::{
    AudioLevels, ChannelRole, ChannelStatus, LoadOutcome, OutputDeviceInfo, SessionDiagnostics,
};
use crate::models::config::MixerConfiguration;
use crate::models::error::MixerError;
use crate::models::recording_result::{MixSnapshot, RecordingMetadata, RecordingResult};
use crate::models::source::AudioSource;
use crate::models::state::{RecorderState, TransportState};
use crate::processing::graph::MixerGraph;
use crate::session::events::EventDispatcher;
use crate::session::transport::TransportController;
use crate::traits::mixer_delegate::MixerDelegate;
use crate::traits::output_device::{OutputDevice, OutputUnlock, RenderCallback};
use crate::traits::source_loader::SourceLoader;

/// How often the event thread drains channel-ended notices and meters.
const EVENT_INTERVAL: Duration = Duration::from_millis(50);

/// Seconds of capture buffer reserved when a recording starts.
const CAPTURE_RESERVE_SECS: u32 = 30;

#[derive(Default)]
struct LoadCounters {
    started: AtomicU64,
    applied: AtomicU64,
    discarded: AtomicU64,
}

/// The object a host application holds: two channels, one transport, one
/// optional capture.
///
/// Generic over the output device so the same session drives a real sound
/// card or a manually clocked offline device.
/// ```text
/// load_voice ─→ [SourceLoader] ─→ [Voice Channel] ─┐
///                                                  ├→ [Bus] ─┬→ OutputDevice
/// load_music ─→ [SourceLoader] ─→ [Music Channel] ─┘         └→ [Capture tap]
///                                                                  ↓
///                                                      stop_recording → WAV
/// ```
///
/// All methods take `&self`; wrap the session in an `Arc` to load both
/// channels concurrently.
pub struct MixerSession<D: OutputDevice + OutputUnlock + 'static> {
    device: Arc<D>,
    loader: Arc<dyn SourceLoader>,
    config: MixerConfiguration,
    sample_rate: u32,
    graph: Arc<Mutex<MixerGraph>>,
    transport: Arc<TransportController>,
    recorder: Mutex<CaptureRecorder>,
    events: Arc<EventDispatcher>,
    dispatch_lock: Arc<Mutex<()>>,
    generations: [AtomicU64; 2],
    /// Description of the source installed on each channel.
    sources: Mutex<[Option<String>; 2]>,
    loads: LoadCounters,
    device_running: AtomicBool,
    device_starting: tokio::sync::Mutex<()>,

    // Event thread control
    events_running: Arc<AtomicBool>,
    events_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl<D: OutputDevice + OutputUnlock + 'static> MixerSession<D> {
    /// Build a session that decodes sources with [`DecodingLoader`].
    pub fn new(device: Arc<D>, config: MixerConfiguration) -> Result<Self, MixerError> {
        Self::with_loader(device, config, Arc::new(DecodingLoader::new()))
    }

    pub fn with_loader(
        device: Arc<D>,
        config: MixerConfiguration,
        loader: Arc<dyn SourceLoader>,
    ) -> Result<Self, MixerError> {
        config.validate().map_err(MixerError::ConfigurationFailed)?;

        let sample_rate = device.sample_rate();
        if sample_rate == 0 {
            return Err(MixerError::ConfigurationFailed("output device reports 0 Hz".into()));
        }
        // Fail early rather than after a whole take has been recorded.
        WavEncoder::new(sample_rate, config.capture_bit_depth)
            .map_err(|e| MixerError::ConfigurationFailed(e.to_string()))?;

        let graph = Arc::new(Mutex::new(MixerGraph::new(sample_rate, &config)));

        let mut session = Self {
            device,
            loader,
            config,
            sample_rate,
            graph,
            transport: Arc::new(TransportController::new()),
            recorder: Mutex::new(CaptureRecorder::new()),
            events: Arc::new(EventDispatcher::new()),
            dispatch_lock: Arc::new(Mutex::new(())),
            generations: [AtomicU64::new(0), AtomicU64::new(0)],
            sources: Mutex::new([None, None]),
            loads: LoadCounters::default(),
            device_running: AtomicBool::new(false),
            device_starting: tokio::sync::Mutex::new(()),
            events_running: Arc::new(AtomicBool::new(false)),
            events_handle: Mutex::new(None),
        };
        session.start_event_thread()?;

        log::info!(
            "Mixer session created on '{}' at {} Hz",
            session.device.device_info().name,
            sample_rate
        );
        Ok(session)
    }

    pub fn add_delegate(&self, delegate: Arc<dyn MixerDelegate>) {
        self.events.add(delegate);
    }

    // --- Loading ---

    /// Load the voice channel's source. Concurrent loads for the other
    /// channel proceed independently.
    pub async fn load_voice(&self, source: AudioSource) -> Result<LoadOutcome, MixerError> {
        self.load(ChannelRole::Voice, source).await
    }

    pub async fn load_music(&self, source: AudioSource) -> Result<LoadOutcome, MixerError> {
        self.load(ChannelRole::Music, source).await
    }

    async fn load(&self, role: ChannelRole, source: AudioSource) -> Result<LoadOutcome, MixerError> {
        let (ticket, change) = self.transport.begin_load(role)?;
        self.emit_state(change);

        let generation = self.generations[role.index()].fetch_add(1, Ordering::SeqCst) + 1;
        self.loads.started.fetch_add(1, Ordering::Relaxed);
        log::debug!("Loading {} source #{}: {:?}", role.name(), generation, source);
        let descriptor = source.describe();

        let result = self.loader.load(source).await;
        let is_current = || self.generations[role.index()].load(Ordering::SeqCst) == generation;

        match result {
            Ok(buffer) => {
                let duration = buffer.duration_secs();
                let settled = ticket.complete(|| {
                    if !is_current() {
                        return false;
                    }
                    self.graph.lock().set_source(role, buffer);
                    self.sources.lock()[role.index()] = Some(descriptor);
                    true
                });
                self.emit_state(settled.state_change);

                if settled.applied {
                    self.loads.applied.fetch_add(1, Ordering::Relaxed);
                    log::info!("{} source #{} ready ({:.2}s)", role.name(), generation, duration);
                    self.events.ready(role);
                    Ok(LoadOutcome::Applied)
                } else {
                    self.loads.discarded.fetch_add(1, Ordering::Relaxed);
                    log::debug!("{} source #{} discarded", role.name(), generation);
                    Ok(LoadOutcome::Discarded)
                }
            }
            Err(error) => {
                let change = ticket.fail();
                self.emit_state(change);

                if !is_current() || self.transport.state().is_disposed() {
                    self.loads.discarded.fetch_add(1, Ordering::Relaxed);
                    log::debug!(
                        "{} source #{} failed after being superseded: {}",
                        role.name(),
                        generation,
                        error
                    );
                    return Ok(LoadOutcome::Discarded);
                }
                log::warn!("{} source #{} failed: {}", role.name(), generation, error);
                self.events.error(&error);
                Err(error)
            }
        }
    }

    // --- Parameters ---

    /// Set the voice gain in dB. Ramped while audio is flowing.
    pub fn set_voice_gain(&self, db: f32) -> Result<(), MixerError> {
        self.transport.ensure_live()?;
        self.graph.lock().channel_mut(ChannelRole::Voice).set_gain(db);
        Ok(())
    }

    pub fn set_music_gain(&self, db: f32) -> Result<(), MixerError> {
        self.transport.ensure_live()?;
        self.graph.lock().channel_mut(ChannelRole::Music).set_gain(db);
        Ok(())
    }

    /// Set the voice playback rate. Returns the rate actually applied after
    /// clamping to `[0.25, 6.0]`.
    pub fn set_voice_rate(&self, rate: f32) -> Result<f32, MixerError> {
        self.transport.ensure_live()?;
        Ok(self.graph.lock().channel_mut(ChannelRole::Voice).set_playback_rate(rate))
    }

    pub fn set_voice_loop(&self, looping: bool) -> Result<(), MixerError> {
        self.transport.ensure_live()?;
        self.graph.lock().channel_mut(ChannelRole::Voice).set_looping(looping);
        Ok(())
    }

    /// Silence the music channel so only the voice is heard.
    pub fn solo_voice(&self) -> Result<(), MixerError> {
        self.transport.ensure_live()?;
        self.graph.lock().channel_mut(ChannelRole::Music).set_muted(true);
        Ok(())
    }

    pub fn unsolo_voice(&self) -> Result<(), MixerError> {
        self.transport.ensure_live()?;
        self.graph.lock().channel_mut(ChannelRole::Music).set_muted(false);
        Ok(())
    }

    // --- Transport ---

    /// Start both channels together. The first call unlocks the output.
    ///
    /// A no-op while already playing; resumes when paused.
    pub async fn start(&self) -> Result<(), MixerError> {
        if self.transport.ensure_live()?.is_playing() {
            return Ok(());
        }

        if let Err(error) = self.transport.unlock(self.device.as_ref()).await {
            log::warn!("Output unlock rejected: {}", error);
            self.events.error(&error);
            return Err(error);
        }

        self.transport.ensure_live()?;
        self.ensure_device_running().await?;

        let graph = &self.graph;
        let previous = match self.transport.transition(
            |state| !state.is_playing(),
            TransportState::Playing,
            || graph.lock().start_all(),
        ) {
            Ok(previous) => previous,
            Err(error) => {
                // Disposed while unlocking; do not leave the device we just opened running.
                self.stop_device();
                return Err(error);
            }
        };

        if let Some(previous) = previous {
            self.events.state_changed(TransportState::Playing);
            if previous.is_paused() {
                log::info!("Transport resumed");
                self.events.resumed();
            } else {
                log::info!("Transport started");
                self.events.started();
            }
        }
        Ok(())
    }

    /// Freeze both channels at their current offsets.
    pub fn pause(&self) -> Result<(), MixerError> {
        let graph = &self.graph;
        let previous = self.transport.transition(
            |state| state.is_playing(),
            TransportState::Paused,
            || graph.lock().pause_all(),
        )?;
        if previous.is_some() {
            log::info!("Transport paused");
            self.events.state_changed(TransportState::Paused);
            self.events.paused();
        }
        Ok(())
    }

    /// Continue from the paused offsets.
    pub fn resume(&self) -> Result<(), MixerError> {
        let graph = &self.graph;
        let previous = self.transport.transition(
            |state| state.is_paused(),
            TransportState::Playing,
            || graph.lock().start_all(),
        )?;
        if previous.is_some() {
            log::info!("Transport resumed");
            self.events.state_changed(TransportState::Playing);
            self.events.resumed();
        }
        Ok(())
    }

    /// Stop both channels and rewind them to zero.
    pub fn stop(&self) -> Result<(), MixerError> {
        let graph = &self.graph;
        let previous = self.transport.transition(
            |state| state.is_started(),
            TransportState::Stopped,
            || graph.lock().stop_all(),
        )?;
        if previous.is_some() {
            log::info!("Transport stopped");
            self.events.state_changed(TransportState::Stopped);
            self.events.stopped();
        }
        Ok(())
    }

    // --- Capture ---

    /// Begin capturing the bus from this moment on.
    ///
    /// Allowed in any transport state. Once the output has been started the
    /// device clock keeps running, so paused or stopped stretches are
    /// captured as silence. Before the first `start()` nothing is rendered.
    pub fn record(&self) -> Result<(), MixerError> {
        let mut recorder = self.recorder.lock();
        self.transport.ensure_live()?;
        recorder.begin()?;
        self.graph
            .lock()
            .attach_capture(CaptureSession::new(self.sample_rate, CAPTURE_RESERVE_SECS));
        log::info!("Recording started");
        Ok(())
    }

    /// Stop capturing and encode what was captured.
    pub async fn stop_recording(&self) -> Result<RecordingResult, MixerError> {
        let (capture, mix) = {
            let mut recorder = self.recorder.lock();
            self.transport.ensure_live()?;
            recorder.begin_finalize()?;
            let mut graph = self.graph.lock();
            let [voice_source, music_source] = self.sources.lock().clone();
            let mix = MixSnapshot {
                voice_gain_db: graph.voice().gain_db(),
                music_gain_db: graph.music().gain_db(),
                voice_rate: graph.voice().playback_rate(),
                voice_loop: graph.voice().looping(),
                voice_solo: graph.music().is_muted(),
                voice_source,
                music_source,
            };
            match graph.detach_capture() {
                Some(capture) => (capture, mix),
                None => {
                    recorder.finish();
                    return Err(MixerError::Encoding("capture tap was not attached".into()));
                }
            }
        };

        let encoded = self.encode_capture(capture, mix).await;
        self.recorder.lock().finish();

        let result = match encoded {
            Ok(result) => result,
            Err(error) => {
                log::error!("Failed to finalize recording: {}", error);
                self.events.error(&error);
                return Err(error);
            }
        };
        if self.transport.state().is_disposed() {
            return Err(MixerError::Disposed);
        }

        log::info!(
            "Recording finished: {:.2}s, {} bytes",
            result.duration_secs,
            result.data.len()
        );
        self.events.recording_finished(&result);
        Ok(result)
    }

    async fn encode_capture(
        &self,
        capture: CaptureSession,
        mix: MixSnapshot,
    ) -> Result<RecordingResult, MixerError> {
        let encoder = WavEncoder::new(self.sample_rate, self.config.capture_bit_depth)?;
        let started_at = capture.started_at();

        let (data, duration_secs) = tokio::task::spawn_blocking(move || {
            let samples = capture.into_samples();
            let duration = encoder.duration_secs(samples.len());
            encoder.encode(&samples).map(|data| (data, duration))
        })
        .await
        .map_err(|e| MixerError::Encoding(format!("encoder task failed: {}", e)))??;

        let checksum = sha256_hex(&data);
        let metadata = RecordingMetadata::new_wav(
            duration_secs,
            &checksum,
            self.sample_rate,
            self.config.capture_bit_depth,
            started_at,
            mix,
        );

        Ok(RecordingResult {
            data: data.into(),
            duration_secs,
            metadata,
            checksum,
            suggested_file_name: self.config.download_file_name.clone(),
        })
    }

    // --- Lifecycle ---

    /// Release everything. Idempotent; also runs on drop.
    ///
    /// An active recording is discarded without encoding. Loads still in
    /// flight resolve as [`LoadOutcome::Discarded`].
    pub fn dispose(&self) {
        let Some(previous) = self.transport.dispose() else {
            return;
        };

        if self.recorder.lock().abort() {
            log::info!("Active recording discarded");
        }
        {
            let mut graph = self.graph.lock();
            graph.stop_all();
            graph.detach_capture();
            graph.clear_sources();
        }
        *self.sources.lock() = [None, None];
        self.stop_device();
        self.stop_event_thread();

        if previous.is_started() {
            self.events.stopped();
        }
        self.events.state_changed(TransportState::Disposed);
        log::info!("Mixer session disposed");
    }

    /// Deliver queued channel-ended notices and current levels now instead
    /// of waiting for the event thread.
    pub fn dispatch_pending_events(&self) -> Result<(), MixerError> {
        self.transport.ensure_live()?;
        drain_events(&self.graph, &self.events, &self.dispatch_lock);
        Ok(())
    }

    // --- Queries ---

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.lock().state()
    }

    pub fn channel_status(&self, role: ChannelRole) -> ChannelStatus {
        self.graph.lock().channel(role).status()
    }

    pub fn current_levels(&self) -> AudioLevels {
        self.graph.lock().levels()
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        let graph = self.graph.lock();
        SessionDiagnostics {
            render_blocks: graph.render_blocks(),
            frames_rendered: graph.frames_rendered(),
            frames_captured: graph.frames_captured(),
            loads_started: self.loads.started.load(Ordering::Relaxed),
            loads_applied: self.loads.applied.load(Ordering::Relaxed),
            loads_discarded: self.loads.discarded.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &MixerConfiguration {
        &self.config
    }

    pub fn output_device(&self) -> OutputDeviceInfo {
        self.device.device_info()
    }

    pub fn is_unlocked(&self) -> bool {
        self.transport.is_unlocked()
    }

    // --- Internal helpers ---

    fn emit_state(&self, change: Option<TransportState>) {
        if let Some(state) = change {
            self.events.state_changed(state);
        }
    }

    /// Open the output stream once. It keeps pulling from the graph until
    /// disposal, whatever the transport state.
    ///
    /// Opening a platform stream blocks until the backend is ready, so it runs
    /// on a blocking worker. Concurrent starts wait for the first attempt.
    async fn ensure_device_running(&self) -> Result<(), MixerError> {
        let _starting = self.device_starting.lock().await;
        if self.device_running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let graph = Arc::clone(&self.graph);
        let render: RenderCallback = Arc::new(move |out: &mut [f32]| graph.lock().render(out));
        let device = Arc::clone(&self.device);

        let started = tokio::task::spawn_blocking(move || {
            if !device.is_available() {
                let name = device.device_info().name;
                return Err(MixerError::Device(format!("output '{}' is not available", name)));
            }
            device.start(render)
        })
        .await
        .map_err(|e| MixerError::Device(format!("output start task failed: {}", e)))
        .and_then(|started| started);

        if let Err(error) = started {
            log::error!("Failed to start output: {}", error);
            self.events.error(&error);
            return Err(error);
        }
        self.device_running.store(true, Ordering::SeqCst);
        log::info!("Output '{}' running", self.device.device_info().name);
        Ok(())
    }

    fn stop_device(&self) {
        if self.device_running.swap(false, Ordering::SeqCst) {
            if let Err(error) = self.device.stop() {
                log::warn!("Failed to stop output: {}", error);
            }
        }
    }

    fn start_event_thread(&mut self) -> Result<(), MixerError> {
        self.events_running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.events_running);
        let graph = Arc::clone(&self.graph);
        let events = Arc::clone(&self.events);
        let dispatch_lock = Arc::clone(&self.dispatch_lock);

        let handle = thread::Builder::new()
            .name("mixer-events".into())
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    thread::sleep(EVENT_INTERVAL);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    drain_events(&graph, &events, &dispatch_lock);
                }
            })
            .map_err(|e| MixerError::Device(format!("failed to spawn event thread: {}", e)))?;

        *self.events_handle.lock() = Some(handle);
        Ok(())
    }

    fn stop_event_thread(&self) {
        self.events_running.store(false, Ordering::SeqCst);
        let Some(handle) = self.events_handle.lock().take() else {
            return;
        };
        // Disposal requested from a delegate callback runs on the event thread itself.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        let _ = handle.join();
    }
}

fn drain_events(graph: &Mutex<MixerGraph>, events: &EventDispatcher, dispatch_lock: &Mutex<()>) {
    let _dispatching = dispatch_lock.lock();
    let (ended, levels, running) = {
        let mut graph = graph.lock();
        (graph.take_ended(), graph.levels(), graph.is_running())
    };
    for role in ended {
        log::debug!("{} channel ended", role.name());
        events.channel_ended(role);
    }
    if running {
        events.levels_updated(&levels);
    }
}

impl<D: OutputDevice + OutputUnlock + 'static> Drop for MixerSession<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}
