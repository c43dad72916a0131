use async_trait::async_trait;

use crate::models::error::MixerError;
use crate::models::source::{AudioBuffer, AudioSource};

/// Turns an audio source into a decoded buffer.
///
/// Implementations must release any temporary resources they create for the
/// source before returning, on success and on failure alike, and must not
/// retry on their own.
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, source: AudioSource) -> Result<AudioBuffer, MixerError>;
}
