use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use sha2::{Digest, Sha256};

use crate::models::error::MixerError;

/// Encodes captured interleaved stereo `f32` into an in-memory WAV file.
///
/// 16 and 24 bit produce integer PCM, 32 bit produces IEEE float.
#[derive(Debug, Clone, Copy)]
pub struct WavEncoder {
    sample_rate: u32,
    bit_depth: u16,
}

impl WavEncoder {
    pub const CHANNELS: u16 = 2;

    pub fn new(sample_rate: u32, bit_depth: u16) -> Result<Self, MixerError> {
        if !matches!(bit_depth, 16 | 24 | 32) {
            return Err(MixerError::Encoding(format!("unsupported bit depth {}", bit_depth)));
        }
        if sample_rate == 0 {
            return Err(MixerError::Encoding("sample rate must be positive".into()));
        }
        Ok(Self { sample_rate, bit_depth })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: Self::CHANNELS,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bit_depth,
            sample_format: if self.bit_depth == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }

    /// Encode the samples to a complete WAV byte stream.
    pub fn encode(&self, samples: &[f32]) -> Result<Vec<u8>, MixerError> {
        let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * (self.bit_depth as usize / 8)));
        {
            let mut writer = WavWriter::new(&mut cursor, self.spec())
                .map_err(|e| MixerError::Encoding(format!("failed to start WAV stream: {}", e)))?;

            let result = match self.bit_depth {
                16 => samples
                    .iter()
                    .try_for_each(|s| writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)),
                24 => samples
                    .iter()
                    .try_for_each(|s| writer.write_sample((s.clamp(-1.0, 1.0) * 8_388_607.0) as i32)),
                _ => samples.iter().try_for_each(|s| writer.write_sample(*s)),
            };
            result.map_err(|e| MixerError::Encoding(format!("failed to write samples: {}", e)))?;

            writer
                .finalize()
                .map_err(|e| MixerError::Encoding(format!("failed to finalize WAV: {}", e)))?;
        }
        Ok(cursor.into_inner())
    }

    /// Duration of `samples` interleaved stereo values at this encoder's rate.
    pub fn duration_secs(&self, samples: usize) -> f64 {
        (samples / Self::CHANNELS as usize) as f64 / self.sample_rate as f64
    }
}

/// SHA-256 hex digest of an encoded recording.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
