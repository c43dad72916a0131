mod common;

use std::io::Cursor;

use affirm_mix_core::storage::sidecar::{sidecar_path, verify_recording};
use affirm_mix_core::{
    AudioSource, DecodingLoader, MixerConfiguration, MixerError, RecorderState, SourceLoader,
};
use approx::assert_relative_eq;

use common::{flat_config, offline_session, sine_source, EventLog, RATE};

const BLOCK_SECS: f64 = 128.0 / RATE as f64;

#[tokio::test]
async fn recording_round_trips_through_loader() {
    let (output, session) = offline_session(flat_config());
    let log = EventLog::new();
    session.add_delegate(log.clone());
    session.load_voice(sine_source(1.5, 440.0)).await.unwrap();
    session.load_music(sine_source(10.0, 110.0)).await.unwrap();
    session.start().await.unwrap();

    session.record().unwrap();
    assert_eq!(session.recorder_state(), RecorderState::Recording);
    output.pump_secs(3.0);
    let result = session.stop_recording().await.unwrap();

    assert_eq!(session.recorder_state(), RecorderState::Idle);
    assert_relative_eq!(result.duration_secs, 3.0, epsilon = BLOCK_SECS);
    assert_eq!(result.suggested_file_name, "subliminal.wav");
    assert_eq!(result.checksum.len(), 64);
    assert_eq!(result.metadata.sample_rate, RATE);
    assert_eq!(result.metadata.bit_depth, 16);
    assert_eq!(log.count("recording_finished"), 1);

    let decoded = DecodingLoader::new()
        .load(AudioSource::blob_with_mime(result.data.to_vec(), "audio/wav"))
        .await
        .unwrap();
    assert_relative_eq!(decoded.duration_secs(), result.duration_secs, epsilon = 1e-9);
}

#[tokio::test]
async fn capture_matches_what_is_heard() {
    let config = MixerConfiguration {
        capture_bit_depth: 32,
        ..flat_config()
    };
    let (output, session) = offline_session(config);
    session.load_voice(sine_source(1.0, 440.0)).await.unwrap();
    session.load_music(sine_source(4.0, 220.0)).await.unwrap();
    session.start().await.unwrap();
    output.pump_secs(0.5);
    output.take_output();

    session.record().unwrap();
    output.pump_secs(1.0);
    let result = session.stop_recording().await.unwrap();
    let heard = output.take_output();

    let mut reader = hound::WavReader::new(Cursor::new(result.data.to_vec())).unwrap();
    let captured: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(captured, heard);
}

#[tokio::test]
async fn paused_interval_is_captured_as_silence() {
    let config = MixerConfiguration {
        capture_bit_depth: 32,
        ..flat_config()
    };
    let (output, session) = offline_session(config);
    session.load_music(sine_source(4.0, 220.0)).await.unwrap();
    session.start().await.unwrap();
    session.pause().unwrap();

    session.record().unwrap();
    output.pump(1280);
    let result = session.stop_recording().await.unwrap();

    assert_relative_eq!(result.duration_secs, 1280.0 / RATE as f64, epsilon = 1e-9);
    let mut reader = hound::WavReader::new(Cursor::new(result.data.to_vec())).unwrap();
    assert!(reader.samples::<f32>().all(|s| s.unwrap() == 0.0));
}

#[tokio::test]
async fn recording_before_first_start_is_empty() {
    let (output, session) = offline_session(flat_config());
    session.load_voice(sine_source(1.0, 440.0)).await.unwrap();

    session.record().unwrap();
    output.pump(1024);
    let result = session.stop_recording().await.unwrap();

    assert_eq!(result.duration_secs, 0.0);
    assert_eq!(result.data.len(), 44);
}

#[tokio::test]
async fn recorder_guards() {
    let (output, session) = offline_session(flat_config());
    session.load_voice(sine_source(1.0, 440.0)).await.unwrap();
    session.start().await.unwrap();

    assert_eq!(session.stop_recording().await, Err(MixerError::NotRecording));
    assert_eq!(session.recorder_state(), RecorderState::Idle);

    session.record().unwrap();
    output.pump_secs(0.5);
    assert_eq!(session.record(), Err(MixerError::AlreadyRecording));
    output.pump_secs(0.5);

    // The second record() did not restart the capture.
    let result = session.stop_recording().await.unwrap();
    assert_relative_eq!(result.duration_secs, 1.0, epsilon = 2.0 * BLOCK_SECS);
}

#[tokio::test]
async fn gain_change_while_recording_is_ramped() {
    let config = MixerConfiguration {
        capture_bit_depth: 32,
        ..flat_config()
    };
    let (output, session) = offline_session(config);
    // A slow tone keeps sample-to-sample movement small.
    session.load_voice(sine_source(2.0, 5.0)).await.unwrap();
    session.start().await.unwrap();
    output.pump_secs(0.1);

    session.record().unwrap();
    output.pump_secs(0.1);
    session.set_voice_gain(-30.0).unwrap();
    output.pump_secs(0.2);
    let result = session.stop_recording().await.unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(result.data.to_vec())).unwrap();
    let left: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).step_by(2).collect();
    let max_jump = left.windows(2).map(|w| (w[1] - w[0]).abs()).fold(0.0f32, f32::max);
    assert!(max_jump < 0.01, "gain change produced a {} step", max_jump);
    assert!(left.last().unwrap().abs() < 0.05);
}

#[tokio::test]
async fn dispose_discards_active_recording() {
    let (output, session) = offline_session(flat_config());
    let log = EventLog::new();
    session.add_delegate(log.clone());
    session.load_voice(sine_source(1.0, 440.0)).await.unwrap();
    session.start().await.unwrap();
    session.record().unwrap();
    output.pump_secs(0.5);

    session.dispose();

    assert_eq!(session.recorder_state(), RecorderState::Idle);
    assert_eq!(session.stop_recording().await, Err(MixerError::Disposed));
    assert_eq!(log.count("recording_finished"), 0);
}

#[tokio::test]
async fn download_writes_file_and_sidecar() {
    let (output, session) = offline_session(flat_config());
    session.load_voice(sine_source(1.0, 440.0)).await.unwrap();
    session.start().await.unwrap();
    session.record().unwrap();
    output.pump_secs(0.25);
    let result = session.stop_recording().await.unwrap();

    let dir = std::env::temp_dir().join(format!("affirm_mix_it_{}", uuid::Uuid::new_v4()));
    let path = result.download_with_metadata(&dir, None).unwrap();

    assert!(path.ends_with("subliminal.wav"));
    assert!(sidecar_path(&path).exists());
    assert_eq!(std::fs::read(&path).unwrap(), result.data.to_vec());
    let metadata = verify_recording(&path).unwrap();
    assert_eq!(metadata, result.metadata);
    assert_relative_eq!(metadata.mix.voice_rate, 1.0);
    assert!(metadata.mix.voice_source.as_deref().unwrap().starts_with("blob ("));
    assert_eq!(metadata.mix.music_source, None);

    let _ = std::fs::remove_dir_all(&dir);
}
