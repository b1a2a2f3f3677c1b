use std::time::Duration;

use terminal_crowd_core::{Position, StopOrder};

/// Displacement that counts as real progress, in world units.
pub const DEFAULT_STUCK_DISTANCE: f64 = 0.2;

/// Accumulates time spent within a small radius of the last significant move.
#[derive(Clone, Debug, PartialEq)]
pub struct StuckDetector {
    elapsed: Duration,
    anchor: Option<Position>,
    distance: f64,
}

impl StuckDetector {
    /// Creates a detector that treats any move of at least `distance` as progress.
    #[must_use]
    pub const fn new(distance: f64) -> Self {
        Self {
            elapsed: Duration::ZERO,
            anchor: None,
            distance,
        }
    }

    /// Samples the agent's position after a tick of length `dt`.
    ///
    /// Seated agents neither accumulate time nor move their reference point.
    pub fn update(&mut self, dt: Duration, position: Position, seated: bool) {
        if seated || position.is_none() {
            return;
        }
        match self.anchor {
            Some(anchor) if anchor.distance(position) < self.distance => {
                self.elapsed = self.elapsed.saturating_add(dt);
            }
            _ => {
                self.anchor = Some(position);
                self.elapsed = Duration::ZERO;
            }
        }
    }

    /// Reports whether the agent has been at rest for longer than `seconds`.
    #[must_use]
    pub fn is_stuck(&self, seconds: f64) -> bool {
        self.elapsed.as_secs_f64() > seconds
    }

    /// Like [`StuckDetector::is_stuck`], but an active stop order always means "not stuck".
    #[must_use]
    pub fn is_stuck_with_stop_order(&self, stop_order: StopOrder, seconds: f64) -> bool {
        !stop_order.is_active() && self.is_stuck(seconds)
    }

    /// Time spent at rest since the last significant move.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Clears the accumulator; the next sample becomes the new reference point.
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.anchor = None;
    }
}

impl Default for StuckDetector {
    fn default() -> Self {
        Self::new(DEFAULT_STUCK_DISTANCE)
    }
}
