use std::time::Duration;

use terminal_crowd_core::{
    ActivityHints, AgentId, AgentRole, ChairId, NeighborSnapshot, Position, StopOrder, Vector,
};
use terminal_crowd_system_movement::{MovementKind, MovementModel};
use terminal_crowd_system_navigation::NavigationModule;
use terminal_crowd_world::TerminalMap;

use crate::itinerary::Itinerary;

/// Everything needed to spawn an agent.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentSpec {
    /// Kind of agent.
    pub role: AgentRole,
    /// Starting position.
    pub position: Position,
    /// Preferred walking speed.
    pub desired_speed: f64,
    /// Body radius.
    pub radius: f64,
    /// Body mass.
    pub mass: f64,
    /// Movement strategy.
    pub movement: MovementKind,
    /// Planned activities.
    pub itinerary: Itinerary,
}

impl AgentSpec {
    /// Passenger with default body measurements walking the given itinerary.
    #[must_use]
    pub fn passenger(position: Position, itinerary: Itinerary) -> Self {
        Self {
            role: AgentRole::Passenger,
            position,
            desired_speed: 1.3,
            radius: 0.2,
            mass: 80.0,
            movement: MovementKind::Helbing,
            itinerary,
        }
    }
}

/// Live agent owned by the simulation.
#[derive(Debug)]
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) role: AgentRole,
    pub(crate) radius: f64,
    pub(crate) mass: f64,
    pub(crate) position: Position,
    pub(crate) navigation: NavigationModule,
    pub(crate) movement: MovementModel,
    pub(crate) plan: Itinerary,
}

impl Agent {
    /// Identifier of the agent.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Kind of agent.
    #[must_use]
    pub const fn role(&self) -> AgentRole {
        self.role
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Body radius.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Velocity committed during the last tick.
    #[must_use]
    pub const fn velocity(&self) -> Vector {
        self.movement.velocity()
    }

    /// Navigation state.
    #[must_use]
    pub fn navigation(&self) -> &NavigationModule {
        &self.navigation
    }

    /// Movement state.
    #[must_use]
    pub fn movement(&self) -> &MovementModel {
        &self.movement
    }

    /// Planned activities.
    #[must_use]
    pub fn itinerary(&self) -> &Itinerary {
        &self.plan
    }

    /// Reports whether the agent is being screened at a checkpoint.
    #[must_use]
    pub fn in_screening(&self, map: &TerminalMap) -> bool {
        self.plan.is_screening() && map.in_checkpoint(self.position)
    }

    pub(crate) fn neighbor_snapshot(&self, map: &TerminalMap) -> NeighborSnapshot {
        NeighborSnapshot {
            id: self.id,
            role: self.role,
            position: self.position,
            radius: self.radius,
            velocity: self.movement.velocity(),
            in_screening: self.in_screening(map),
        }
    }

    /// Comparable summary of the agent's observable state.
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            position: self.position,
            velocity: self.movement.velocity(),
            goal: self.navigation.goal_position(),
            remaining_waypoints: self.navigation.goal_positions().len(),
            stop_order: self.movement.stop_order(),
            seat: self.movement.seat(),
            stuck_for: self.navigation.stuck_detector().elapsed(),
        }
    }
}

/// Immutable copy of an agent's observable state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentSnapshot {
    /// Identifier of the agent.
    pub id: AgentId,
    /// Position after the last tick.
    pub position: Position,
    /// Velocity committed during the last tick.
    pub velocity: Vector,
    /// Next waypoint.
    pub goal: Option<Position>,
    /// Number of pending waypoints.
    pub remaining_waypoints: usize,
    /// Stop order in force.
    pub stop_order: StopOrder,
    /// Chair the agent sits on.
    pub seat: Option<ChairId>,
    /// Time spent without significant progress.
    pub stuck_for: Duration,
}
