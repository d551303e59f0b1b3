//! Beeper sample producer.
//!
//! The core's audio boundary is a run-length stream: one `(level,
//! duration_in_tstates)` tuple per stretch of constant speaker level. The
//! host sink resamples against the 3.5 MHz T-state clock; no resampling
//! happens here.

/// Speaker levels as the sink sees them.
const LEVEL_HIGH: f32 = 1.0;
const LEVEL_LOW: f32 = 0.0;

/// Run-length encoder over speaker transitions.
pub struct Beeper {
    samples: Vec<(f32, u32)>,
    level: bool,
    /// T-state at which the current level began.
    since: u64,
}

impl Beeper {
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            level: false,
            since: 0,
        }
    }

    /// Record a speaker transition at absolute T-state `at`.
    pub fn set_level(&mut self, level: bool, at: u64) {
        if level == self.level {
            return;
        }
        self.push_interval(at);
        self.level = level;
    }

    /// Close out the running interval (end of frame).
    pub fn flush(&mut self, at: u64) {
        self.push_interval(at);
    }

    /// Hand the accumulated stream to the sink.
    pub fn take_samples(&mut self) -> Vec<(f32, u32)> {
        std::mem::take(&mut self.samples)
    }

    /// Current speaker level as a sample value.
    #[must_use]
    pub fn level(&self) -> f32 {
        if self.level { LEVEL_HIGH } else { LEVEL_LOW }
    }

    fn push_interval(&mut self, until: u64) {
        let duration = until.saturating_sub(self.since);
        if duration > 0 {
            self.samples.push((self.level(), duration as u32));
            self.since = until;
        }
    }
}

impl Default for Beeper {
    fn default() -> Self {
        Self::new()
    }
}
