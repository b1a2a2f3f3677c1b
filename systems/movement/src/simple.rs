//! Strategies without collision avoidance.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use terminal_crowd_core::Vector;

use crate::{MovementContext, MovementState, MovementStrategy};

/// Keeps the stored velocity. Used for fixed operators.
#[derive(Clone, Copy, Debug, Default)]
pub struct Static;

impl MovementStrategy for Static {
    fn name(&self) -> &'static str {
        "static"
    }

    fn next_velocity(
        &mut self,
        state: &MovementState,
        _desired_speed: f64,
        _dt: Duration,
        _context: &MovementContext<'_>,
    ) -> Vector {
        state.velocity
    }
}

/// Picks a fresh uniformly random heading every tick.
#[derive(Clone, Debug)]
pub struct RandomWalk {
    rng: ChaCha8Rng,
}

impl RandomWalk {
    /// Creates a walk whose headings are reproducible from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl MovementStrategy for RandomWalk {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next_velocity(
        &mut self,
        _state: &MovementState,
        desired_speed: f64,
        _dt: Duration,
        _context: &MovementContext<'_>,
    ) -> Vector {
        let heading = Vector::new(
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
        );
        heading.with_length(desired_speed)
    }
}

/// Walks straight at the goal at the desired speed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Basic;

impl MovementStrategy for Basic {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn next_velocity(
        &mut self,
        _state: &MovementState,
        desired_speed: f64,
        _dt: Duration,
        context: &MovementContext<'_>,
    ) -> Vector {
        context.goal.map_or(Vector::ZERO, |goal| {
            context.position.vector_to(goal).with_length(desired_speed)
        })
    }
}
