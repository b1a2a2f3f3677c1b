//! Social-force model after Helbing & Molnár.
//!
//! Each tick sums a driving force toward the goal, repulsion from every
//! perceived neighbour and repulsion from nearby obstacle boundaries. Bodies
//! that overlap additionally receive a compression force along the contact
//! normal and sliding friction along the tangent. The net force divided by
//! mass is added to the current velocity, which is then clamped.

use std::time::Duration;

use serde::Deserialize;
use terminal_crowd_core::{ConfigurationError, NeighborSnapshot, Polygon, Position, Vector};
use tracing::trace;

use crate::{bound_speed, MovementContext, MovementState, MovementStrategy};

/// Distances below this are treated as coincident and contribute no force.
const MIN_SEPARATION: f64 = 1e-9;

/// Upper bound on the repulsion exponent so deep penetration stays finite.
const MAX_CONTACT_EXPONENT: f64 = 50.0;

/// Physical constants of the social-force model.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HelbingParameters {
    /// Strength of the personal-space repulsion.
    pub a: f64,
    /// Range of the personal-space repulsion.
    pub b: f64,
    /// Body compression stiffness.
    pub k: f64,
    /// Sliding friction coefficient.
    pub kappa: f64,
    /// Relaxation time of the driving force, in seconds.
    pub tau: f64,
    /// Gain applied to the driving force on top of `1 / tau`.
    pub driving_gain: f64,
    /// Target speed while inside a queuing area.
    pub queue_speed: f64,
    /// Radius within which neighbours and obstacles are considered.
    pub perception_radius: f64,
    /// Only passengers repel each other when set.
    pub passengers_only: bool,
    /// Net forces weaker than this are discarded.
    pub force_floor: f64,
    /// Allowed deviation from a right angle when detecting a sideways flip, in degrees.
    pub rotation_tolerance_degrees: f64,
}

impl Default for HelbingParameters {
    fn default() -> Self {
        Self {
            a: 250.0,
            b: 0.1,
            k: 1.2e5,
            kappa: 2.4e5,
            tau: 0.5,
            driving_gain: 15.0,
            queue_speed: 1.0,
            perception_radius: 3.0,
            passengers_only: true,
            force_floor: 1e-4,
            rotation_tolerance_degrees: 2.0,
        }
    }
}

impl HelbingParameters {
    /// Rejects non-positive constants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let positive = [
            ("a", self.a),
            ("b", self.b),
            ("k", self.k),
            ("kappa", self.kappa),
            ("tau", self.tau),
            ("driving_gain", self.driving_gain),
            ("queue_speed", self.queue_speed),
            ("perception_radius", self.perception_radius),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::InvalidParameter { name, value });
            }
        }
        for (name, value) in [
            ("force_floor", self.force_floor),
            ("rotation_tolerance_degrees", self.rotation_tolerance_degrees),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Social-force movement strategy.
#[derive(Clone, Debug, Default)]
pub struct Helbing {
    parameters: HelbingParameters,
}

impl Helbing {
    /// Creates the strategy with the given constants.
    #[must_use]
    pub fn new(parameters: HelbingParameters) -> Self {
        Self { parameters }
    }

    /// Constants in use.
    #[must_use]
    pub fn parameters(&self) -> &HelbingParameters {
        &self.parameters
    }

    /// Velocity the agent would like to walk at.
    #[must_use]
    pub fn desired_velocity(&self, desired_speed: f64, context: &MovementContext<'_>) -> Vector {
        let Some(goal) = context.goal else {
            return Vector::ZERO;
        };
        let speed = if context.surroundings.queue_area_at(context.position).is_some() {
            self.parameters.queue_speed
        } else {
            desired_speed
        };
        context.position.vector_to(goal).with_length(speed)
    }

    /// Force exerted on an agent by one neighbour.
    ///
    /// The force is antisymmetric in the two bodies when their velocities are equal.
    #[must_use]
    pub fn neighbor_force(
        &self,
        position: Position,
        radius: f64,
        velocity: Vector,
        neighbor: &NeighborSnapshot,
    ) -> Vector {
        self.contact_force(
            position,
            velocity,
            neighbor.position,
            radius + neighbor.radius,
            neighbor.velocity,
            false,
        )
    }

    /// Force exerted on an agent by the nearest boundary point of `obstacle`.
    #[must_use]
    pub fn obstacle_force(
        &self,
        position: Position,
        radius: f64,
        velocity: Vector,
        obstacle: &Polygon,
    ) -> Vector {
        let boundary = obstacle.nearest_boundary_point(position);
        self.contact_force(
            position,
            velocity,
            boundary,
            radius,
            Vector::ZERO,
            obstacle.contains(position),
        )
    }

    fn contact_force(
        &self,
        position: Position,
        velocity: Vector,
        source: Position,
        reach: f64,
        source_velocity: Vector,
        inside: bool,
    ) -> Vector {
        let offset = source.vector_to(position);
        let distance = offset.length();
        if distance < MIN_SEPARATION || !distance.is_finite() {
            return Vector::ZERO;
        }

        // Inside an obstacle the nearest boundary point lies ahead, so the
        // normal flips and the penetration depth counts as negative distance.
        let (normal, distance) = if inside {
            (-offset.normalize(), -distance)
        } else {
            (offset.normalize(), distance)
        };

        let parameters = &self.parameters;
        let exponent = ((reach - distance) / parameters.b).min(MAX_CONTACT_EXPONENT);
        let mut force = normal * (parameters.a * exponent.exp());

        let overlap = reach - distance;
        if overlap > 0.0 {
            force = force + normal * (parameters.k * overlap);

            let mut tangent = normal.perpendicular();
            if velocity.dot(tangent) > 0.0 {
                tangent = -tangent;
            }
            let sliding = (source_velocity - velocity).dot(tangent).abs();
            force = force + tangent * (parameters.kappa * overlap * sliding);
        }

        force
    }
}

impl MovementStrategy for Helbing {
    fn name(&self) -> &'static str {
        "helbing"
    }

    fn next_velocity(
        &mut self,
        state: &MovementState,
        desired_speed: f64,
        _dt: Duration,
        context: &MovementContext<'_>,
    ) -> Vector {
        let parameters = &self.parameters;
        let velocity = state.velocity;
        let desired = self.desired_velocity(desired_speed, context);

        let mut force = (desired - velocity) * (parameters.driving_gain / parameters.tau);

        for neighbor in context
            .surroundings
            .neighbors(context.position, parameters.perception_radius)
        {
            if neighbor.in_screening || (parameters.passengers_only && !neighbor.role.is_passenger())
            {
                continue;
            }
            force = force + self.neighbor_force(context.position, context.radius, velocity, &neighbor);
        }

        for obstacle in context
            .surroundings
            .obstacles_near(context.position, parameters.perception_radius)
        {
            force = force + self.obstacle_force(context.position, context.radius, velocity, obstacle);
        }

        if force.length() < parameters.force_floor || !force.is_finite() {
            force = Vector::ZERO;
        }

        let mass = if context.mass > 0.0 { context.mass } else { 1.0 };
        let next = bound_speed(velocity + force * (1.0 / mass), desired_speed);

        if next.is_rotation_of(velocity, 90.0, parameters.rotation_tolerance_degrees) {
            if let Some(goal) = context.goal {
                trace!(?velocity, ?next, "sideways flip replaced by goal heading");
                return context.position.vector_to(goal).with_length(desired_speed);
            }
        }

        next
    }
}
