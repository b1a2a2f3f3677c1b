#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Operational movement: turns the current waypoint and the agent's
//! surroundings into a per-tick displacement.
//!
//! A [`MovementModel`] owns the velocity, stop order and seat of one agent and
//! delegates the velocity update to a [`MovementStrategy`]. Strategies are
//! selected by [`MovementKind`] and never see each other's state.

mod helbing;
mod simple;

use std::{fmt, time::Duration};

use serde::Deserialize;
use terminal_crowd_core::{ChairId, ConfigurationError, Position, SpatialQuery, StopOrder, Vector};

pub use helbing::{Helbing, HelbingParameters};
pub use simple::{Basic, RandomWalk, Static};

/// Multiple of the desired speed no agent may exceed.
pub const MAX_SPEED_FACTOR: f64 = 1.5;

/// Per-agent movement state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementState {
    /// Velocity committed during the most recent tick, in units per second.
    pub velocity: Vector,
    /// Cooperative halt currently in force.
    pub stop_order: StopOrder,
    /// Chair the agent sits on, if any.
    pub seat: Option<ChairId>,
}

/// Per-tick inputs of a movement strategy.
#[derive(Clone, Copy)]
pub struct MovementContext<'a> {
    /// Agent position at the start of the tick.
    pub position: Position,
    /// Body radius.
    pub radius: f64,
    /// Body mass.
    pub mass: f64,
    /// Waypoint the agent is heading for.
    pub goal: Option<Position>,
    /// Map and neighbour queries.
    pub surroundings: &'a dyn SpatialQuery,
}

/// Velocity update rule.
pub trait MovementStrategy: fmt::Debug + Send {
    /// Stable identifier used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Computes the velocity for this tick from the previous state.
    fn next_velocity(
        &mut self,
        state: &MovementState,
        desired_speed: f64,
        dt: Duration,
        context: &MovementContext<'_>,
    ) -> Vector;
}

/// Movement strategy selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Keeps whatever velocity is stored.
    Static,
    /// Uniformly random heading every tick.
    Random,
    /// Straight line toward the goal.
    Basic,
    /// Social-force model.
    #[default]
    Helbing,
}

impl MovementKind {
    /// Instantiates the strategy. `seed` feeds the random walk only.
    #[must_use]
    pub fn strategy(self, parameters: &HelbingParameters, seed: u64) -> Box<dyn MovementStrategy> {
        match self {
            Self::Static => Box::new(Static),
            Self::Random => Box::new(RandomWalk::new(seed)),
            Self::Basic => Box::new(Basic),
            Self::Helbing => Box::new(Helbing::new(parameters.clone())),
        }
    }
}

/// Rescales `velocity` to at most `1.5 × desired_speed`, keeping its direction.
#[must_use]
pub fn bound_speed(velocity: Vector, desired_speed: f64) -> Vector {
    let limit = desired_speed * MAX_SPEED_FACTOR;
    if velocity.length() > limit {
        velocity.with_length(limit)
    } else {
        velocity
    }
}

/// Movement of one agent.
#[derive(Debug)]
pub struct MovementModel {
    state: MovementState,
    desired_speed: f64,
    strategy: Box<dyn MovementStrategy>,
}

impl MovementModel {
    /// Creates a model at rest. Fails when `desired_speed` is negative or non-finite.
    pub fn new(
        strategy: Box<dyn MovementStrategy>,
        desired_speed: f64,
    ) -> Result<Self, ConfigurationError> {
        if !desired_speed.is_finite() || desired_speed < 0.0 {
            return Err(ConfigurationError::NegativeDesiredSpeed(desired_speed));
        }
        Ok(Self {
            state: MovementState::default(),
            desired_speed,
            strategy,
        })
    }

    /// Sets the stored velocity, e.g. for static agents that drift at a fixed rate.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vector) -> Self {
        self.state.velocity = velocity;
        self
    }

    /// Snapshot of the movement state.
    #[must_use]
    pub const fn state(&self) -> &MovementState {
        &self.state
    }

    /// Velocity committed during the most recent tick.
    #[must_use]
    pub const fn velocity(&self) -> Vector {
        self.state.velocity
    }

    /// Preferred walking speed.
    #[must_use]
    pub const fn desired_speed(&self) -> f64 {
        self.desired_speed
    }

    /// Name of the configured strategy.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Stop order currently in force.
    #[must_use]
    pub const fn stop_order(&self) -> StopOrder {
        self.state.stop_order
    }

    /// Replaces the stop order. The goal is left untouched.
    pub fn issue_stop_order(&mut self, order: StopOrder) {
        self.state.stop_order = order;
    }

    /// Chair the agent is seated on.
    #[must_use]
    pub const fn seat(&self) -> Option<ChairId> {
        self.state.seat
    }

    /// Reports whether the agent is seated.
    #[must_use]
    pub const fn is_seated(&self) -> bool {
        self.state.seat.is_some()
    }

    /// Seats the agent and brings it to rest.
    pub fn sit(&mut self, chair: ChairId) {
        self.state.seat = Some(chair);
        self.state.velocity = Vector::ZERO;
    }

    /// Releases the agent from its chair.
    pub fn stand(&mut self) -> Option<ChairId> {
        self.state.seat.take()
    }

    /// Counts a timed stop order down.
    pub fn update(&mut self, dt: Duration) {
        self.state.stop_order = self.state.stop_order.advanced(dt);
    }

    /// Current speed, zero while stopped or seated.
    #[must_use]
    pub fn current_speed(&self) -> f64 {
        if self.state.stop_order.is_active() || self.is_seated() {
            0.0
        } else {
            self.state.velocity.length()
        }
    }

    /// Clamps `velocity` to this agent's speed limit.
    #[must_use]
    pub fn bound_speed(&self, velocity: Vector) -> Vector {
        bound_speed(velocity, self.desired_speed)
    }

    /// Displacement for this tick. Updates the stored velocity as a side effect.
    pub fn get_move(&mut self, dt: Duration, context: &MovementContext<'_>) -> Vector {
        if self.state.stop_order.is_active() || self.is_seated() {
            self.state.velocity = Vector::ZERO;
            return Vector::ZERO;
        }

        let velocity = self
            .strategy
            .next_velocity(&self.state, self.desired_speed, dt, context);
        self.state.velocity = if velocity.is_finite() {
            velocity
        } else {
            Vector::ZERO
        };
        self.state.velocity * dt.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_speed_clamps_and_keeps_direction() {
        let clamped = bound_speed(Vector::new(3.0, 4.0), 2.0);
        assert!((clamped.length() - 3.0).abs() < 1e-12);
        assert!((clamped.x() / clamped.y() - 0.75).abs() < 1e-12);

        let untouched = Vector::new(0.5, -1.0);
        assert_eq!(bound_speed(untouched, 2.0), untouched);
    }

    #[test]
    fn negative_desired_speed_is_rejected() {
        assert_eq!(
            MovementModel::new(Box::new(Static), -0.1).err(),
            Some(ConfigurationError::NegativeDesiredSpeed(-0.1))
        );
    }

    #[test]
    fn kind_parses_from_configuration() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: MovementKind,
        }
        let parsed: Wrapper = toml::from_str("kind = \"basic\"").expect("parse");
        assert_eq!(parsed.kind, MovementKind::Basic);
        assert_eq!(
            parsed
                .kind
                .strategy(&HelbingParameters::default(), 0)
                .name(),
            "basic"
        );
    }
}
