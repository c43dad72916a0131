use thiserror::Error;

/// Errors surfaced by the mixing engine.
///
/// Loader failures (`Fetch`, `Decode`) leave the affected channel's previous
/// buffer untouched. State-machine violations (`AlreadyRecording`,
/// `NotRecording`, `Disposed`) are caller mistakes and are always returned,
/// never swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MixerError {
    #[error("failed to fetch audio source: {0}")]
    Fetch(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("audio output could not be unlocked: {0}")]
    Unlock(String),

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording is in progress")]
    NotRecording,

    #[error("mixer session has been disposed")]
    Disposed,

    #[error("output device error: {0}")]
    Device(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}
