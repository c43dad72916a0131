/// Transport state machine.
///
/// ```text
/// idle → loading → ready → playing ⇄ paused
///                             ↓         ↓
///                          stopped ←────┘
/// (any) → disposed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Stopped,
    Disposed,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    /// Playing or paused: the channels hold a meaningful offset.
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Disposed => "disposed",
        }
    }
}

/// Capture recorder state machine.
///
/// ```text
/// idle → recording → finalizing → idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
    Finalizing,
}

impl RecorderState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }
}
