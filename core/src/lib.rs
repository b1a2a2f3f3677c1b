#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the terminal crowd engine.
//!
//! This crate defines the value types and collaborator seams that connect the
//! map, the pathfinding, navigation and movement systems, and the simulation
//! that drives them. Systems never reach into each other's state: they consume
//! immutable snapshots through [`SpatialQuery`] and [`ActivityHints`] and return
//! plain values for the simulation to commit.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod geometry;

pub use geometry::{
    closest_point_on_segment, distance_to_segment, segments_intersect, Polygon, Position, Vector,
};

/// Errors raised when a component is constructed with unusable parameters.
///
/// These are the only hard failures in the engine. Per-tick operations never
/// fail; they degrade to advisory results instead.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigurationError {
    /// Grid cell size must be strictly positive and finite.
    #[error("grid precision must be positive and finite, got {0}")]
    NonPositivePrecision(f64),
    /// Movement models cannot walk backwards.
    #[error("desired speed must be non-negative and finite, got {0}")]
    NegativeDesiredSpeed(f64),
    /// A named tuning value is outside its valid range.
    #[error("parameter `{name}` has invalid value {value}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Value that was rejected.
        value: f64,
    },
    /// Polygons need at least three vertices.
    #[error("polygon needs at least 3 vertices, got {vertices}")]
    DegeneratePolygon {
        /// Number of vertices supplied.
        vertices: usize,
    },
    /// A chair identifier does not exist on the map.
    #[error("chair {0} does not exist on the map")]
    UnknownChair(u32),
    /// An agent identifier does not exist in the simulation.
    #[error("agent {0} does not exist")]
    UnknownAgent(u32),
}

/// Unique identifier assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a chair on the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChairId(u32);

impl ChairId {
    /// Creates a new chair identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identity of a map layout, used to key derived data such as occupancy grids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(u32);

impl MapId {
    /// Creates a new map identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Kind of agent, exposed to neighbours so that models can filter who they react to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Travelling passenger moving through the terminal.
    Passenger,
    /// Staff member such as a desk or checkpoint operator.
    Operator,
}

impl AgentRole {
    /// Reports whether the agent is a passenger.
    #[must_use]
    pub const fn is_passenger(self) -> bool {
        matches!(self, Self::Passenger)
    }
}

/// Cooperative movement halt that never clears the agent's goal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopOrder {
    /// The agent may move.
    #[default]
    NotStopped,
    /// The agent stays put until the order is replaced.
    StoppedIndefinitely,
    /// The agent stays put for the remaining duration.
    StoppedFor(Duration),
}

impl StopOrder {
    /// Reports whether the order currently prevents movement.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::NotStopped)
    }

    /// Counts a timed order down by `dt`, releasing it once it expires.
    #[must_use]
    pub fn advanced(self, dt: Duration) -> Self {
        match self {
            Self::StoppedFor(remaining) => {
                let left = remaining.saturating_sub(dt);
                if left.is_zero() {
                    Self::NotStopped
                } else {
                    Self::StoppedFor(left)
                }
            }
            other => other,
        }
    }
}

/// Immutable view of another agent as perceived by a movement model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborSnapshot {
    /// Identifier of the perceived agent.
    pub id: AgentId,
    /// Kind of the perceived agent.
    pub role: AgentRole,
    /// Centre of the agent's body.
    pub position: Position,
    /// Radius of the agent's body.
    pub radius: f64,
    /// Velocity the agent committed during its most recent update.
    pub velocity: Vector,
    /// Whether the agent is currently being screened at a checkpoint.
    pub in_screening: bool,
}

/// Entrance and exit of a queuing area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueueAreaSnapshot {
    /// Point where the line starts.
    pub entrance: Position,
    /// Point where the line is left once served.
    pub exit: Position,
}

/// Read-only spatial queries answered by the map and the live agent population.
///
/// All reads during a tick observe a stable snapshot: the collections behind
/// this trait are only mutated between agent updates.
pub trait SpatialQuery {
    /// Agents (other than the caller) whose centres lie within `radius` of `position`.
    fn neighbors(&self, position: Position, radius: f64) -> Vec<NeighborSnapshot>;

    /// Obstacle polygons whose boundary lies within `radius` of `position`.
    fn obstacles_near(&self, position: Position, radius: f64) -> Vec<&Polygon>;

    /// Reports whether the straight segment `from-to` crosses an obstacle.
    fn is_line_blocked(&self, from: Position, to: Position) -> bool;

    /// Queuing area containing `position`, if any.
    fn queue_area_at(&self, position: Position) -> Option<QueueAreaSnapshot>;
}

/// Hints exposed by the external activity layer to navigation and movement.
pub trait ActivityHints {
    /// Reports whether an activity that must not be skipped past is running.
    fn has_blocking_activity(&self) -> bool;

    /// Reports whether the agent has nothing to do right now.
    fn is_idle(&self) -> bool;

    /// Position of the next planned activity, if one is known.
    fn next_activity_position(&self) -> Option<Position>;

    /// Reports whether the agent is being screened at a checkpoint.
    fn is_screening(&self) -> bool {
        false
    }
}

/// Activity layer for agents that never plan anything, such as fixed operators.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoActivities;

impl ActivityHints for NoActivities {
    fn has_blocking_activity(&self) -> bool {
        false
    }

    fn is_idle(&self) -> bool {
        true
    }

    fn next_activity_position(&self) -> Option<Position> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_stop_order_expires() {
        let order = StopOrder::StoppedFor(Duration::from_millis(150));
        let order = order.advanced(Duration::from_millis(100));
        assert_eq!(order, StopOrder::StoppedFor(Duration::from_millis(50)));
        assert!(order.is_active());
        let order = order.advanced(Duration::from_millis(100));
        assert_eq!(order, StopOrder::NotStopped);
        assert!(!order.is_active());
    }

    #[test]
    fn indefinite_stop_order_never_expires() {
        let order = StopOrder::StoppedIndefinitely.advanced(Duration::from_secs(3_600));
        assert_eq!(order, StopOrder::StoppedIndefinitely);
    }

    #[test]
    fn agent_role_deserializes_from_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            role: AgentRole,
        }
        let parsed: Wrapper = toml::from_str("role = \"operator\"").expect("parse role");
        assert_eq!(parsed.role, AgentRole::Operator);
        assert!(!parsed.role.is_passenger());
    }

    #[test]
    fn configuration_errors_render_readably() {
        let error = ConfigurationError::NonPositivePrecision(0.0);
        assert_eq!(
            error.to_string(),
            "grid precision must be positive and finite, got 0"
        );
    }
}
