//! # affirm-mix-cpal
//!
//! cpal output backend for affirm-mix.
//!
//! Provides:
//! - `CpalOutput` — live output on the default (or a named) device
//! - `DeviceEnumerator` — output device listing
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use affirm_mix_core::{AudioSource, MixerConfiguration, MixerSession};
//! use affirm_mix_cpal::CpalOutput;
//!
//! let output = Arc::new(CpalOutput::default_device()?);
//! let session = MixerSession::new(output, MixerConfiguration::default())?;
//! session.load_voice(AudioSource::url("voice.wav")).await?;
//! session.load_music(AudioSource::url("https://example.com/music.mp3")).await?;
//! session.start().await?;
//! ```

pub mod cpal_output;
pub mod device_enumerator;

pub use cpal_output::CpalOutput;
pub use device_enumerator::DeviceEnumerator;
