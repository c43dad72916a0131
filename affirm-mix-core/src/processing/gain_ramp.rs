/// Convert decibels to an amplitude multiplier: `10^(db/20)`.
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Convert an amplitude multiplier to decibels. Silence maps to `-inf`.
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        return f32::NEG_INFINITY;
    }
    20.0 * linear.log10()
}

/// Per-sample linear ramp between amplitude multipliers.
///
/// A new target restarts the ramp from the current value, so overlapping
/// changes never jump.
#[derive(Debug, Clone)]
pub struct GainRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_frames: u32,
}

impl GainRamp {
    pub fn new(initial: f32, ramp_frames: u32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_frames,
        }
    }

    /// Glide to `target` over the configured ramp length.
    pub fn ramp_to(&mut self, target: f32) {
        self.target = target;
        if self.ramp_frames == 0 || (target - self.current).abs() < f32::EPSILON {
            self.jump_to(target);
            return;
        }
        self.step = (target - self.current) / self.ramp_frames as f32;
        self.remaining = self.ramp_frames;
    }

    /// Set `target` immediately. Only valid while no audio is flowing.
    pub fn jump_to(&mut self, target: f32) {
        self.current = target;
        self.target = target;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Advance one frame and return the multiplier to apply to it.
    #[inline]
    pub fn next_gain(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }
}
