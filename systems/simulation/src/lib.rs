#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tick-driven terminal crowd simulation.
//!
//! The simulation owns the agents and drives every one of them through the
//! same fixed phase order once per tick: plan, navigation, movement, then
//! position commit. Agents update strictly one after another so that each
//! observes the already committed state of the agents before it. Adapters talk
//! to it only through [`apply`] and read it back through [`query`].

mod agent;
mod config;
mod itinerary;
mod summary;
mod surroundings;

use std::{sync::Arc, time::Duration};

use terminal_crowd_core::{
    AgentId, ChairId, ConfigurationError, Position, SpatialQuery, StopOrder,
};
use terminal_crowd_system_movement::{HelbingParameters, MovementContext, MovementModel};
use terminal_crowd_system_navigation::{
    Escalation, NavigationConfig, NavigationContext, NavigationModule,
};
use terminal_crowd_system_pathfinding::PathFinder;
use terminal_crowd_world::{GridCache, TerminalMap};
use tracing::{debug, warn};

pub use agent::{Agent, AgentSnapshot, AgentSpec};
pub use config::{
    AgentConfig, ChairConfig, GridConfig, MapConfig, PolygonConfig, QueueAreaConfig,
    ScenarioConfig, ScenarioError, Settings, SimulationConfig, StopConfig,
};
pub use itinerary::{Itinerary, ItineraryStop, PlanOrder};
pub use summary::SimulationSummary;

use summary::Counters;
use surroundings::Surroundings;

/// Seconds without progress after which an agent counts as stuck in summaries.
pub const SUMMARY_STUCK_SECS: f64 = 20.0;

/// Commands accepted by [`apply`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances every agent by one tick.
    Tick {
        /// Simulated time covered by the tick.
        dt: Duration,
    },
    /// Adds an agent at the end of the update order.
    SpawnAgent {
        /// Body, movement and plan of the new agent.
        spec: AgentSpec,
    },
    /// Replaces an agent's goal queue with a freshly planned path.
    SetGoal {
        /// Agent to redirect.
        agent: AgentId,
        /// Final destination; [`Position::NONE`] clears the queue.
        goal: Position,
    },
    /// Routes an agent through waypoints before its current final goal.
    SetShortTermGoals {
        /// Agent to redirect.
        agent: AgentId,
        /// Waypoints in visiting order.
        waypoints: Vec<Position>,
    },
    /// Replaces an agent's stop order.
    IssueStopOrder {
        /// Agent to halt or release.
        agent: AgentId,
        /// Order to apply.
        order: StopOrder,
    },
    /// Seats an agent on a chair.
    Sit {
        /// Agent to seat.
        agent: AgentId,
        /// Chair to sit on.
        chair: ChairId,
    },
    /// Stands an agent up.
    Stand {
        /// Agent to stand up.
        agent: AgentId,
    },
    /// Removes an agent from the simulation.
    RemoveAgent {
        /// Agent to remove.
        agent: AgentId,
    },
}

/// Events emitted by [`apply`].
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A tick finished.
    TimeAdvanced {
        /// Simulated time covered by the tick.
        dt: Duration,
        /// Number of ticks processed so far.
        tick: u64,
    },
    /// An agent joined the simulation.
    AgentSpawned {
        /// New agent.
        agent: AgentId,
        /// Starting position.
        position: Position,
    },
    /// An agent left the simulation.
    AgentRemoved {
        /// Removed agent.
        agent: AgentId,
    },
    /// A goal was planned for an agent.
    GoalAssigned {
        /// Agent heading for the goal.
        agent: AgentId,
        /// Final destination.
        goal: Position,
        /// Waypoints now queued.
        waypoints: usize,
    },
    /// Waypoints were inserted ahead of an agent's final goal.
    ShortTermGoalsAssigned {
        /// Agent being redirected.
        agent: AgentId,
        /// Waypoints now queued.
        waypoints: usize,
    },
    /// An agent's goal queue was exhausted by arrival.
    GoalReached {
        /// Agent that arrived.
        agent: AgentId,
        /// Where it arrived.
        position: Position,
    },
    /// A stalled agent was given a recovery goal.
    StuckEscalated {
        /// Agent that stalled.
        agent: AgentId,
        /// Recovery taken.
        escalation: Escalation,
    },
    /// An agent's stop order changed.
    StopOrderIssued {
        /// Affected agent.
        agent: AgentId,
        /// New order.
        order: StopOrder,
    },
    /// An agent sat down.
    AgentSeated {
        /// Seated agent.
        agent: AgentId,
        /// Chair it sits on.
        chair: ChairId,
    },
    /// An agent stood up.
    AgentStood {
        /// Agent that stood up.
        agent: AgentId,
        /// Chair it left.
        chair: ChairId,
    },
    /// A command could not be applied.
    CommandRejected {
        /// Why the command was rejected.
        reason: ConfigurationError,
    },
}

/// Crowd of agents moving through one terminal map.
#[derive(Debug)]
pub struct Simulation {
    map: Arc<TerminalMap>,
    grids: GridCache,
    path_finder: Arc<PathFinder>,
    navigation: NavigationConfig,
    helbing: HelbingParameters,
    seed: u64,
    time_step: Duration,
    agents: Vec<Agent>,
    next_agent: u32,
    tick: u64,
    elapsed: Duration,
    counters: Counters,
}

impl Simulation {
    /// Creates an empty simulation, building the occupancy grid for `map`.
    pub fn new(map: Arc<TerminalMap>, settings: &Settings) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        let mut grids = GridCache::new();
        let path_finder = PathFinder::from_config(
            Arc::clone(&map),
            &mut grids,
            settings.grid.precision,
            &settings.pathfinding,
        )?;

        Ok(Self {
            map,
            grids,
            path_finder: Arc::new(path_finder),
            navigation: settings.navigation.clone(),
            helbing: settings.helbing.clone(),
            seed: settings.simulation.seed,
            time_step: settings.simulation.time_step(),
            agents: Vec::new(),
            next_agent: 0,
            tick: 0,
            elapsed: Duration::ZERO,
            counters: Counters::default(),
        })
    }

    /// Adds an agent and returns its identifier.
    pub fn spawn(&mut self, spec: AgentSpec) -> Result<AgentId, ConfigurationError> {
        if !spec.radius.is_finite() || spec.radius <= 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "radius",
                value: spec.radius,
            });
        }
        if !spec.mass.is_finite() || spec.mass <= 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "mass",
                value: spec.mass,
            });
        }

        let id = AgentId::new(self.next_agent);
        let seed = agent_seed(self.seed, id);
        let movement = MovementModel::new(
            spec.movement.strategy(&self.helbing, seed.rotate_left(32)),
            spec.desired_speed,
        )?;
        let navigation =
            NavigationModule::new(Arc::clone(&self.path_finder), self.navigation.clone(), seed);

        debug!(
            agent = id.get(),
            movement = movement.strategy_name(),
            "agent spawned"
        );
        self.next_agent = self.next_agent.saturating_add(1);
        self.agents.push(Agent {
            id,
            role: spec.role,
            radius: spec.radius,
            mass: spec.mass,
            position: spec.position,
            navigation,
            movement,
            plan: spec.itinerary,
        });
        Ok(id)
    }

    /// Map the agents move on.
    #[must_use]
    pub fn map(&self) -> &TerminalMap {
        &self.map
    }

    /// Path finder shared by every agent.
    #[must_use]
    pub fn path_finder(&self) -> &PathFinder {
        &self.path_finder
    }

    /// Occupancy grids built for this simulation.
    #[must_use]
    pub fn grid_cache(&self) -> &GridCache {
        &self.grids
    }

    /// Configured tick length.
    #[must_use]
    pub const fn time_step(&self) -> Duration {
        self.time_step
    }

    /// Live agents in update order.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Looks up an agent.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|agent| agent.id == id)
    }

    fn advance(&mut self, dt: Duration, out_events: &mut Vec<Event>) {
        self.tick = self.tick.saturating_add(1);
        self.elapsed = self.elapsed.saturating_add(dt);
        out_events.push(Event::TimeAdvanced {
            dt,
            tick: self.tick,
        });

        let map = &*self.map;
        for index in 0..self.agents.len() {
            let (before, rest) = self.agents.split_at_mut(index);
            let Some((agent, after)) = rest.split_first_mut() else {
                break;
            };
            let surroundings = Surroundings::new(map, before, after);
            update_agent(agent, dt, map, &surroundings, &mut self.counters, out_events);
        }
    }
}

/// Mixes the simulation seed with an agent id so every agent draws its own stream.
#[must_use]
pub const fn agent_seed(seed: u64, agent: AgentId) -> u64 {
    seed ^ (agent.get() as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Applies the provided command to the simulation, mutating state deterministically.
pub fn apply(simulation: &mut Simulation, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => simulation.advance(dt, out_events),
        Command::SpawnAgent { spec } => {
            let position = spec.position;
            match simulation.spawn(spec) {
                Ok(agent) => out_events.push(Event::AgentSpawned { agent, position }),
                Err(reason) => out_events.push(Event::CommandRejected { reason }),
            }
        }
        Command::SetGoal { agent: id, goal } => {
            let Some(agent) = simulation.agent_mut(id) else {
                return reject_unknown(id, out_events);
            };
            agent.navigation.set_goal(agent.position, goal);
            out_events.push(Event::GoalAssigned {
                agent: id,
                goal,
                waypoints: agent.navigation.goal_positions().len(),
            });
        }
        Command::SetShortTermGoals { agent: id, waypoints } => {
            let Some(agent) = simulation.agent_mut(id) else {
                return reject_unknown(id, out_events);
            };
            agent
                .navigation
                .set_short_term_goals(agent.position, &waypoints);
            out_events.push(Event::ShortTermGoalsAssigned {
                agent: id,
                waypoints: agent.navigation.goal_positions().len(),
            });
        }
        Command::IssueStopOrder { agent: id, order } => {
            let Some(agent) = simulation.agent_mut(id) else {
                return reject_unknown(id, out_events);
            };
            agent.movement.issue_stop_order(order);
            out_events.push(Event::StopOrderIssued { agent: id, order });
        }
        Command::Sit { agent: id, chair } => {
            let Some(center) = simulation.map.chair(chair).map(|seat| seat.center()) else {
                out_events.push(Event::CommandRejected {
                    reason: ConfigurationError::UnknownChair(chair.get()),
                });
                return;
            };
            let Some(agent) = simulation.agent_mut(id) else {
                return reject_unknown(id, out_events);
            };
            agent.movement.sit(chair);
            agent.position = center;
            out_events.push(Event::AgentSeated { agent: id, chair });
        }
        Command::Stand { agent: id } => {
            let Some(agent) = simulation.agent_mut(id) else {
                return reject_unknown(id, out_events);
            };
            if let Some(chair) = agent.movement.stand() {
                out_events.push(Event::AgentStood { agent: id, chair });
            }
        }
        Command::RemoveAgent { agent: id } => {
            let Some(index) = simulation.agents.iter().position(|agent| agent.id == id) else {
                return reject_unknown(id, out_events);
            };
            let _ = simulation.agents.remove(index);
            out_events.push(Event::AgentRemoved { agent: id });
        }
    }
}

fn reject_unknown(agent: AgentId, out_events: &mut Vec<Event>) {
    out_events.push(Event::CommandRejected {
        reason: ConfigurationError::UnknownAgent(agent.get()),
    });
}

fn update_agent(
    agent: &mut Agent,
    dt: Duration,
    map: &TerminalMap,
    surroundings: &dyn SpatialQuery,
    counters: &mut Counters,
    out_events: &mut Vec<Event>,
) {
    let id = agent.id;

    if let Some(PlanOrder::Walk(target)) = agent.plan.strategic_update() {
        agent.navigation.set_goal(agent.position, target);
        out_events.push(Event::GoalAssigned {
            agent: id,
            goal: target,
            waypoints: agent.navigation.goal_positions().len(),
        });
    }

    let had_goal = !agent.navigation.reached_goal();
    let escalation = agent.navigation.update(
        dt,
        NavigationContext {
            position: agent.position,
            seated: agent.movement.is_seated(),
            stop_order: agent.movement.stop_order(),
            surroundings,
            activities: &agent.plan,
        },
    );
    if let Some(escalation) = escalation {
        counters.record(&escalation);
        out_events.push(Event::StuckEscalated {
            agent: id,
            escalation,
        });
    }

    let arrived = had_goal && agent.navigation.reached_goal();
    if arrived {
        counters.goals_reached = counters.goals_reached.saturating_add(1);
        out_events.push(Event::GoalReached {
            agent: id,
            position: agent.position,
        });
    }

    // A queue cleared from outside is not an arrival.
    match agent.plan.tactical_update(dt, arrived) {
        Some(PlanOrder::Dwell(duration)) => {
            let order = StopOrder::StoppedFor(duration);
            agent.movement.issue_stop_order(order);
            out_events.push(Event::StopOrderIssued { agent: id, order });
        }
        Some(PlanOrder::Sit(chair)) => match map.chair(chair) {
            Some(seat) => {
                agent.movement.sit(chair);
                agent.position = seat.center();
                out_events.push(Event::AgentSeated { agent: id, chair });
            }
            None => warn!(
                agent = id.get(),
                chair = chair.get(),
                "itinerary names a missing chair"
            ),
        },
        Some(PlanOrder::Stand) => {
            if let Some(chair) = agent.movement.stand() {
                out_events.push(Event::AgentStood { agent: id, chair });
            }
        }
        Some(PlanOrder::Walk(_)) | None => {}
    }

    if let Some(chair) = agent.movement.seat() {
        if let Some(seat) = map.chair(chair) {
            agent.position = seat.center();
        }
        return;
    }

    agent.movement.update(dt);
    let step = agent.movement.get_move(
        dt,
        &MovementContext {
            position: agent.position,
            radius: agent.radius,
            mass: agent.mass,
            goal: agent.navigation.goal_position(),
            surroundings,
        },
    );
    agent.position = agent.position + step;
}

/// Query functions that provide read-only access to the simulation state.
pub mod query {
    use super::{AgentSnapshot, Simulation, SimulationSummary, SUMMARY_STUCK_SECS};

    /// Captures every agent's observable state in update order.
    #[must_use]
    pub fn agent_snapshots(simulation: &Simulation) -> Vec<AgentSnapshot> {
        simulation.agents.iter().map(|agent| agent.snapshot()).collect()
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick(simulation: &Simulation) -> u64 {
        simulation.tick
    }

    /// Aggregates the run so far.
    #[must_use]
    pub fn summary(simulation: &Simulation) -> SimulationSummary {
        let agents = &simulation.agents;
        let total_speed: f64 = agents
            .iter()
            .map(|agent| agent.movement.current_speed())
            .sum();
        let mean_speed = if agents.is_empty() {
            0.0
        } else {
            total_speed / agents.len() as f64
        };

        SimulationSummary {
            ticks: simulation.tick,
            elapsed: simulation.elapsed,
            agents: agents.len(),
            goals_reached: simulation.counters.goals_reached,
            queue_exits: simulation.counters.queue_exits,
            next_activity: simulation.counters.next_activity,
            replans: simulation.counters.replans,
            stuck_agents: agents
                .iter()
                .filter(|agent| {
                    !agent.navigation.reached_goal()
                        && agent.navigation.is_stuck(SUMMARY_STUCK_SECS)
                })
                .count(),
            seated_agents: agents
                .iter()
                .filter(|agent| agent.movement.is_seated())
                .count(),
            mean_speed,
        }
    }
}
