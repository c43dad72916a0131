use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::MixerError;
use crate::storage::sidecar;

/// Result returned when a capture is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    /// Encoded WAV bytes.
    pub data: Arc<[u8]>,
    pub duration_secs: f64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
    pub suggested_file_name: String,
}

impl RecordingResult {
    /// Save the recording into `dir`, using `file_name` or the suggested name.
    ///
    /// This is the "download" action handed back to the host application.
    pub fn download(&self, dir: &Path, file_name: Option<&str>) -> Result<PathBuf, MixerError> {
        let name = file_name.unwrap_or(&self.suggested_file_name);
        fs::create_dir_all(dir)
            .map_err(|e| MixerError::Storage(format!("failed to create directory: {}", e)))?;

        let path = dir.join(name);
        fs::write(&path, &self.data)
            .map_err(|e| MixerError::Storage(format!("failed to write recording: {}", e)))?;

        log::info!("Saved recording to {}", path.display());
        Ok(path)
    }

    /// Save the recording plus a `.mix.json` sidecar describing how it was mixed.
    ///
    /// Use [`sidecar::verify_recording`] to check a saved file against it later.
    pub fn download_with_metadata(&self, dir: &Path, file_name: Option<&str>) -> Result<PathBuf, MixerError> {
        let path = self.download(dir, file_name)?;
        sidecar::write_sidecar(&self.metadata, &path)?;
        Ok(path)
    }
}

/// Metadata describing a finished recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub checksum: String,
    pub format: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub started_at: String,
    pub created_at: String,
    pub mix: MixSnapshot,
}

/// Mix settings in effect when a capture was finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixSnapshot {
    pub voice_gain_db: f32,
    pub music_gain_db: f32,
    pub voice_rate: f32,
    pub voice_loop: bool,
    /// Music was muted so only the voice was heard.
    pub voice_solo: bool,
    /// Where each channel's audio came from, `None` when nothing was loaded.
    pub voice_source: Option<String>,
    pub music_source: Option<String>,
}

impl RecordingMetadata {
    pub fn new_wav(
        duration_secs: f64,
        checksum: &str,
        sample_rate: u32,
        bit_depth: u16,
        started_at: chrono::DateTime<chrono::Utc>,
        mix: MixSnapshot,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            checksum: checksum.to_string(),
            format: "wav".into(),
            sample_rate,
            channels: 2,
            bit_depth,
            started_at: started_at.to_rfc3339(),
            created_at: chrono::Utc::now().to_rfc3339(),
            mix,
        }
    }
}
