//! # affirm-mix-core
//!
//! Platform-agnostic affirmation mixing and capture engine.
//!
//! Mixes a looping voice track with a linear music track, each behind its
//! own gain stage (and, for voice, a playback-rate control), and captures
//! the mixed bus to WAV. Output backends implement the `OutputDevice` and
//! `OutputUnlock` traits and plug into the generic `MixerSession`.
//!
//! ## Architecture
//!
//! ```text
//! affirm-mix-core (this crate)
//! ├── traits/       ← OutputDevice, OutputUnlock, SourceLoader, MixerDelegate
//! ├── models/       ← MixerError, TransportState, MixerConfiguration, AudioSource, etc.
//! ├── loader/       ← DecodingLoader (reqwest + symphonia), blob handles
//! ├── processing/   ← Channel, GainRamp, BusMixer, MixerGraph
//! ├── capture/      ← CaptureRecorder, capture tap, WAV encoding
//! ├── session/      ← MixerSession (facade), TransportController, events
//! ├── devices/      ← OfflineOutput (manually clocked)
//! └── storage/      ← mix sidecar and saved-file verification
//! ```

pub mod capture;
pub mod devices;
pub mod loader;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use capture::recorder::CaptureRecorder;
pub use devices::offline::OfflineOutput;
pub use loader::DecodingLoader;
pub use models::audio_models::{
    AudioLevels, ChannelRole, ChannelStatus, LoadOutcome, OutputDeviceInfo, SessionDiagnostics,
};
pub use models::config::{MixerConfiguration, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
pub use models::error::MixerError;
pub use models::recording_result::{MixSnapshot, RecordingMetadata, RecordingResult};
pub use models::source::{AudioBuffer, AudioSource};
pub use models::state::{RecorderState, TransportState};
pub use processing::channel::Channel;
pub use processing::graph::MixerGraph;
pub use session::mixer_session::MixerSession;
pub use session::transport::TransportController;
pub use traits::mixer_delegate::MixerDelegate;
pub use traits::output_device::{OutputDevice, OutputUnlock, RenderCallback};
pub use traits::source_loader::SourceLoader;
