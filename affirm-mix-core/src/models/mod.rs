pub mod audio_models;
pub mod config;
pub mod error;
pub mod recording_result;
pub mod source;
pub mod state;
