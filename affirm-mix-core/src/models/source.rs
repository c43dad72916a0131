use std::fmt;
use std::sync::Arc;

/// Where audio for a channel comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// `http(s)://` or `file://` URL, or a plain filesystem path.
    Url(String),
    /// In-memory encoded audio (e.g. a freshly recorded voice clip).
    Blob { bytes: Arc<[u8]>, mime: Option<String> },
}

impl AudioSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn blob(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Blob {
            bytes: bytes.into(),
            mime: None,
        }
    }

    pub fn blob_with_mime(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self::Blob {
            bytes: bytes.into(),
            mime: Some(mime.into()),
        }
    }

    /// Short human-readable origin, recorded alongside a finished mix.
    ///
    /// Blob contents are never included, only their size and type.
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Blob { bytes, mime } => {
                format!("blob ({} bytes, {})", bytes.len(), mime.as_deref().unwrap_or("unknown type"))
            }
        }
    }
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Blob { bytes, mime } => f
                .debug_struct("Blob")
                .field("len", &bytes.len())
                .field("mime", mime)
                .finish(),
        }
    }
}

/// Decoded, immutable PCM audio.
///
/// Samples are interleaved stereo `[L0, R0, L1, R1, ...]` at `sample_rate`.
/// Cloning is cheap; the sample data is shared.
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub const CHANNELS: usize = 2;

    /// Wrap interleaved stereo samples. A trailing half frame is dropped.
    pub fn from_stereo(mut samples: Vec<f32>, sample_rate: u32) -> Self {
        samples.truncate(samples.len() - samples.len() % Self::CHANNELS);
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / Self::CHANNELS
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
