/// Stereo summing bus and the sample-math helpers around it.
///
/// All operations work on interleaved stereo `&[f32]` blocks
/// `[L0, R0, L1, R1, ...]` with no platform dependencies.
///
/// Bus output: `out[i] = clamp(level * Σ channel[i], -1, 1)`.
#[derive(Debug, Clone)]
pub struct BusMixer {
    level: f32,
}

impl BusMixer {
    pub fn new(level: f32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Add a channel block onto the bus. A shorter channel block counts as
    /// silence for the missing tail.
    pub fn mix_into(&self, bus: &mut [f32], channel: &[f32]) {
        for (out, sample) in bus.iter_mut().zip(channel) {
            *out += *sample;
        }
    }

    /// Apply the bus level and clamp to the legal sample range.
    pub fn finish(&self, bus: &mut [f32]) {
        for sample in bus.iter_mut() {
            *sample = (*sample * self.level).clamp(-1.0, 1.0);
        }
    }

    /// Convert interleaved audio with `channels` channels to interleaved stereo.
    ///
    /// Mono is duplicated into both sides; anything wider keeps its first two
    /// channels.
    pub fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
        match channels {
            0 => Vec::new(),
            1 => Self::interleave(samples, samples),
            2 => samples.to_vec(),
            n => {
                let frame_count = samples.len() / n;
                let mut stereo = Vec::with_capacity(frame_count * 2);
                for frame in samples.chunks_exact(n) {
                    stereo.push(frame[0]);
                    stereo.push(frame[1]);
                }
                stereo
            }
        }
    }

    /// Interleave two mono channels into stereo `[L0, R0, L1, R1, ...]`.
    pub fn interleave(left: &[f32], right: &[f32]) -> Vec<f32> {
        let frame_count = left.len().max(right.len());
        let mut stereo = vec![0.0f32; frame_count * 2];
        for i in 0..frame_count {
            stereo[i * 2] = left.get(i).copied().unwrap_or(0.0);
            stereo[i * 2 + 1] = right.get(i).copied().unwrap_or(0.0);
        }
        stereo
    }

    /// RMS level of samples (0.0–1.0 for normalized audio).
    pub fn rms_level(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Peak absolute level of samples.
    pub fn peak_level(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }
}

impl Default for BusMixer {
    fn default() -> Self {
        Self::new(1.0)
    }
}
