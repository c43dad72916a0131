//! JSON sidecar written next to a downloaded mix, and the check that a saved
//! WAV still matches what was recorded.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use hound::WavReader;

use crate::capture::wav_encoder::sha256_hex;
use crate::models::error::MixerError;
use crate::models::recording_result::RecordingMetadata;

/// `morning.wav` → `morning.mix.json`.
pub fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("mix.json")
}

/// Write `metadata` beside the recording. Returns the sidecar path.
pub fn write_sidecar(metadata: &RecordingMetadata, recording_path: &Path) -> Result<PathBuf, MixerError> {
    let path = sidecar_path(recording_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| MixerError::Storage(format!("failed to serialize mix sidecar: {}", e)))?;
    fs::write(&path, json)
        .map_err(|e| MixerError::Storage(format!("failed to write {}: {}", path.display(), e)))?;
    log::debug!("Wrote mix sidecar {}", path.display());
    Ok(path)
}

pub fn read_sidecar(recording_path: &Path) -> Result<RecordingMetadata, MixerError> {
    let path = sidecar_path(recording_path);
    let json = fs::read_to_string(&path)
        .map_err(|e| MixerError::Storage(format!("failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map_err(|e| MixerError::Storage(format!("malformed mix sidecar: {}", e)))
}

/// Read the sidecar and confirm the saved WAV is the recording it describes.
///
/// The checksum must match byte for byte, and the WAV header must agree with
/// the recorded sample rate, channel count, bit depth and duration.
pub fn verify_recording(recording_path: &Path) -> Result<RecordingMetadata, MixerError> {
    let metadata = read_sidecar(recording_path)?;
    let data = fs::read(recording_path)
        .map_err(|e| MixerError::Storage(format!("failed to read {}: {}", recording_path.display(), e)))?;

    let checksum = sha256_hex(&data);
    if checksum != metadata.checksum {
        return Err(MixerError::Storage(format!(
            "checksum mismatch for {}: expected {}, found {}",
            recording_path.display(),
            metadata.checksum,
            checksum
        )));
    }

    let reader = WavReader::new(Cursor::new(&data)).map_err(|e| {
        MixerError::Storage(format!("{} is not a readable WAV: {}", recording_path.display(), e))
    })?;
    let spec = reader.spec();
    if spec.sample_rate != metadata.sample_rate
        || spec.channels != metadata.channels
        || spec.bits_per_sample != metadata.bit_depth
    {
        return Err(MixerError::Storage(format!(
            "WAV format {} Hz/{} ch/{} bit does not match sidecar {} Hz/{} ch/{} bit",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            metadata.sample_rate,
            metadata.channels,
            metadata.bit_depth
        )));
    }

    let duration = reader.duration() as f64 / spec.sample_rate as f64;
    if (duration - metadata.duration_secs).abs() > 1.0 / spec.sample_rate as f64 {
        return Err(MixerError::Storage(format!(
            "WAV holds {:.3}s but sidecar records {:.3}s",
            duration, metadata.duration_secs
        )));
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::wav_encoder::WavEncoder;
    use crate::models::recording_result::MixSnapshot;

    const RATE: u32 = 8000;

    fn mix() -> MixSnapshot {
        MixSnapshot {
            voice_gain_db: -18.0,
            music_gain_db: -3.0,
            voice_rate: 1.4,
            voice_loop: true,
            voice_solo: false,
            voice_source: Some("blob (2048 bytes, audio/webm)".into()),
            music_source: Some("https://cdn.example/rain.mp3".into()),
        }
    }

    /// Save a half-second recording and its sidecar into a fresh directory.
    fn saved_recording() -> (PathBuf, PathBuf, RecordingMetadata) {
        let dir = std::env::temp_dir().join(format!("affirm_mix_sidecar_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let encoder = WavEncoder::new(RATE, 16).unwrap();
        let samples = vec![0.25f32; RATE as usize];
        let data = encoder.encode(&samples).unwrap();
        let metadata = RecordingMetadata::new_wav(
            encoder.duration_secs(samples.len()),
            &sha256_hex(&data),
            RATE,
            16,
            chrono::Utc::now(),
            mix(),
        );

        let path = dir.join("morning.wav");
        fs::write(&path, &data).unwrap();
        write_sidecar(&metadata, &path).unwrap();
        (dir, path, metadata)
    }

    #[test]
    fn sidecar_sits_beside_recording() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/mixes/morning.wav")),
            PathBuf::from("/tmp/mixes/morning.mix.json")
        );
    }

    #[test]
    fn untouched_recording_verifies() {
        let (dir, path, metadata) = saved_recording();

        let verified = verify_recording(&path).unwrap();

        assert_eq!(verified, metadata);
        assert_eq!(verified.mix.music_source.as_deref(), Some("https://cdn.example/rain.mp3"));
        assert!((verified.duration_secs - 0.5).abs() < 1e-9);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn modified_recording_fails_checksum() {
        let (dir, path, _) = saved_recording();
        let mut data = fs::read(&path).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        fs::write(&path, data).unwrap();

        let err = verify_recording(&path).unwrap_err();

        assert!(matches!(err, MixerError::Storage(ref msg) if msg.contains("checksum mismatch")));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn sidecar_format_must_match_header() {
        let (dir, path, mut metadata) = saved_recording();
        metadata.bit_depth = 24;
        write_sidecar(&metadata, &path).unwrap();

        let err = verify_recording(&path).unwrap_err();

        assert!(matches!(err, MixerError::Storage(ref msg) if msg.contains("does not match sidecar")));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn sidecar_duration_must_match_header() {
        let (dir, path, mut metadata) = saved_recording();
        metadata.duration_secs = 2.0;
        write_sidecar(&metadata, &path).unwrap();

        assert!(verify_recording(&path).is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_sidecar_is_a_storage_error() {
        let (dir, path, _) = saved_recording();
        fs::remove_file(sidecar_path(&path)).unwrap();

        assert!(matches!(verify_recording(&path), Err(MixerError::Storage(_))));
        fs::remove_dir_all(&dir).ok();
    }
}
