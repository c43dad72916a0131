use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::models::error::MixerError;
use crate::models::source::AudioBuffer;
use crate::processing::bus_mixer::BusMixer;

/// Optional format hints gathered from the URL or blob MIME type.
#[derive(Debug, Clone, Default)]
pub struct FormatHint {
    pub extension: Option<String>,
    pub mime: Option<String>,
}

impl FormatHint {
    fn to_probe_hint(&self) -> Hint {
        let mut hint = Hint::new();
        if let Some(ext) = self.extension.as_deref() {
            hint.with_extension(ext);
        }
        if let Some(mime) = self.mime.as_deref() {
            hint.mime_type(mime);
        }
        hint
    }
}

/// Decode a complete encoded file held in memory into a stereo buffer.
///
/// Blocking; run it off the async executor.
pub fn decode_bytes(bytes: Arc<[u8]>, format: &FormatHint) -> Result<AudioBuffer, MixerError> {
    let byte_len = bytes.len();
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &format.to_probe_hint(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MixerError::Decode(format!("unrecognized audio format: {}", e)))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MixerError::Decode("no audio track found".into()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MixerError::Decode(format!("unsupported codec: {}", e)))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("Stopped reading packets: {}", e);
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count());

                let frames = decoded.capacity();
                let needed = frames * spec.channels.count();
                if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                    sample_buf = Some(SampleBuffer::<f32>::new(frames as u64, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet: {}", e);
            }
            Err(e) => return Err(MixerError::Decode(format!("decoder failed: {}", e))),
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| MixerError::Decode("sample rate unknown".into()))?;
    let channels = channels.ok_or_else(|| MixerError::Decode("channel layout unknown".into()))?;
    if interleaved.is_empty() || channels == 0 {
        return Err(MixerError::Decode("source contains no audio frames".into()));
    }

    let buffer = AudioBuffer::from_stereo(BusMixer::to_stereo(&interleaved, channels), sample_rate);
    log::debug!(
        "Decoded {} bytes: {} frames, {} ch, {} Hz ({:.2}s)",
        byte_len,
        buffer.frames(),
        channels,
        sample_rate,
        buffer.duration_secs()
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, frames: usize) -> Arc<[u8]> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                for _ in 0..channels {
                    writer.write_sample(((i % 100) as i16) * 100).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        Arc::from(cursor.into_inner())
    }

    #[test]
    fn decodes_stereo_wav() {
        let buffer = decode_bytes(wav_bytes(2, 8000), &FormatHint::default()).unwrap();
        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.frames(), 8000);
        approx::assert_relative_eq!(buffer.duration_secs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn mono_wav_is_duplicated_to_stereo() {
        let buffer = decode_bytes(
            wav_bytes(1, 400),
            &FormatHint {
                extension: Some("wav".into()),
                mime: None,
            },
        )
        .unwrap();
        assert_eq!(buffer.frames(), 400);
        let samples = buffer.samples();
        assert_eq!(samples[10], samples[11]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let bytes: Arc<[u8]> = Arc::from(vec![0x42u8; 512]);
        assert!(matches!(
            decode_bytes(bytes, &FormatHint::default()),
            Err(MixerError::Decode(_))
        ));
    }

    #[test]
    fn empty_wav_is_a_decode_error() {
        assert!(matches!(
            decode_bytes(wav_bytes(2, 0), &FormatHint::default()),
            Err(MixerError::Decode(_))
        ));
    }
}
