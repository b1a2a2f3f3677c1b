//! Scenario files: engine settings, the terminal layout and the initial agents.

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use terminal_crowd_core::{AgentRole, ChairId, ConfigurationError, MapId, Polygon, Position};
use terminal_crowd_system_movement::{HelbingParameters, MovementKind};
use terminal_crowd_system_navigation::NavigationConfig;
use terminal_crowd_system_pathfinding::PathfindingConfig;
use terminal_crowd_world::{Chair, QueueArea, TerminalMap};
use thiserror::Error;
use tracing::info;

use crate::{
    agent::AgentSpec,
    itinerary::{Itinerary, ItineraryStop},
    Simulation,
};

/// Errors raised while loading a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value in the file is out of range.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Clock and randomness.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Length of one tick in milliseconds.
    pub time_step_ms: u64,
    /// Seed mixed into every agent's random streams.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step_ms: 100,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Length of one tick.
    #[must_use]
    pub const fn time_step(&self) -> Duration {
        Duration::from_millis(self.time_step_ms)
    }
}

/// Occupancy grid resolution.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Cell edge length in world units.
    pub precision: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { precision: 0.4 }
    }
}

/// Engine settings shared by every agent of a simulation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Settings {
    /// Clock and randomness.
    pub simulation: SimulationConfig,
    /// Occupancy grid resolution.
    pub grid: GridConfig,
    /// Search strategy and smoothing.
    pub pathfinding: PathfindingConfig,
    /// Goal pruning and stuck recovery.
    pub navigation: NavigationConfig,
    /// Social-force constants.
    pub helbing: HelbingParameters,
}

impl Settings {
    /// Rejects out-of-range values in any section.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.simulation.time_step_ms == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "time_step_ms",
                value: 0.0,
            });
        }
        if !self.grid.precision.is_finite() || self.grid.precision <= 0.0 {
            return Err(ConfigurationError::NonPositivePrecision(self.grid.precision));
        }
        self.pathfinding.validate()?;
        self.navigation.validate()?;
        self.helbing.validate()
    }
}

/// Polygon given as a list of `[x, y]` vertices.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PolygonConfig {
    /// Vertices in order.
    pub vertices: Vec<[f64; 2]>,
}

impl PolygonConfig {
    fn build(&self) -> Result<Polygon, ConfigurationError> {
        Polygon::new(self.vertices.iter().copied().map(position).collect())
    }
}

/// Queuing area with its entrance and exit.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct QueueAreaConfig {
    /// Floor region of the line.
    pub vertices: Vec<[f64; 2]>,
    /// Where the line starts.
    pub entrance: [f64; 2],
    /// Where the line is left.
    pub exit: [f64; 2],
}

/// Chair footprint.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChairConfig {
    /// Identifier referenced by itinerary stops.
    pub id: u32,
    /// Footprint vertices.
    pub vertices: Vec<[f64; 2]>,
}

/// Terminal layout.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MapConfig {
    /// Identity of the layout.
    #[serde(default = "default_map_id")]
    pub id: u32,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
    /// Obstacle polygons.
    #[serde(default)]
    pub obstacles: Vec<PolygonConfig>,
    /// Queuing areas.
    #[serde(default)]
    pub queue_areas: Vec<QueueAreaConfig>,
    /// Checkpoint screening regions.
    #[serde(default)]
    pub checkpoints: Vec<PolygonConfig>,
    /// Chairs.
    #[serde(default)]
    pub chairs: Vec<ChairConfig>,
}

fn default_map_id() -> u32 {
    1
}

impl MapConfig {
    /// Builds the runtime map.
    pub fn build(&self) -> Result<TerminalMap, ConfigurationError> {
        let mut map = TerminalMap::new(MapId::new(self.id), self.width, self.height)?;
        for obstacle in &self.obstacles {
            map = map.with_obstacle(obstacle.build()?);
        }
        for queue in &self.queue_areas {
            let area = Polygon::new(queue.vertices.iter().copied().map(position).collect())?;
            map = map.with_queue_area(QueueArea::new(
                area,
                position(queue.entrance),
                position(queue.exit),
            ));
        }
        for checkpoint in &self.checkpoints {
            map = map.with_checkpoint(checkpoint.build()?);
        }
        for chair in &self.chairs {
            let footprint = Polygon::new(chair.vertices.iter().copied().map(position).collect())?;
            map = map.with_chair(Chair::new(ChairId::new(chair.id), footprint));
        }
        Ok(map)
    }
}

/// One planned activity of an agent.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StopConfig {
    /// Where the activity takes place.
    pub position: [f64; 2],
    /// Seconds spent there.
    #[serde(default)]
    pub dwell_secs: f64,
    /// Chair to sit on while dwelling.
    #[serde(default)]
    pub chair: Option<u32>,
    /// Whether the activity is a checkpoint screening.
    #[serde(default)]
    pub screening: bool,
}

/// Initial agent.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AgentConfig {
    /// Kind of agent.
    #[serde(default = "default_role")]
    pub role: AgentRole,
    /// Starting position.
    pub position: [f64; 2],
    /// Preferred walking speed.
    #[serde(default = "default_desired_speed")]
    pub desired_speed: f64,
    /// Body radius.
    #[serde(default = "default_radius")]
    pub radius: f64,
    /// Body mass.
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Movement strategy.
    #[serde(default)]
    pub movement: MovementKind,
    /// Planned activities.
    #[serde(default)]
    pub itinerary: Vec<StopConfig>,
}

fn default_role() -> AgentRole {
    AgentRole::Passenger
}

fn default_desired_speed() -> f64 {
    1.3
}

fn default_radius() -> f64 {
    0.2
}

fn default_mass() -> f64 {
    80.0
}

impl AgentConfig {
    /// Builds a spawn request, checking chair references against `map`.
    pub fn build(&self, map: &TerminalMap) -> Result<AgentSpec, ConfigurationError> {
        let mut stops = Vec::with_capacity(self.itinerary.len());
        for stop in &self.itinerary {
            let dwell = Duration::try_from_secs_f64(stop.dwell_secs).map_err(|_| {
                ConfigurationError::InvalidParameter {
                    name: "dwell_secs",
                    value: stop.dwell_secs,
                }
            })?;
            let mut built = ItineraryStop::new(position(stop.position), dwell);
            if let Some(chair) = stop.chair {
                let chair = ChairId::new(chair);
                if map.chair(chair).is_none() {
                    return Err(ConfigurationError::UnknownChair(chair.get()));
                }
                built = built.seated_on(chair);
            }
            if stop.screening {
                built = built.screening();
            }
            stops.push(built);
        }

        Ok(AgentSpec {
            role: self.role,
            position: position(self.position),
            desired_speed: self.desired_speed,
            radius: self.radius,
            mass: self.mass,
            movement: self.movement,
            itinerary: Itinerary::new(stops),
        })
    }
}

/// Complete scenario file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScenarioConfig {
    /// Clock and randomness.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Occupancy grid resolution.
    #[serde(default)]
    pub grid: GridConfig,
    /// Search strategy and smoothing.
    #[serde(default)]
    pub pathfinding: PathfindingConfig,
    /// Goal pruning and stuck recovery.
    #[serde(default)]
    pub navigation: NavigationConfig,
    /// Social-force constants.
    #[serde(default)]
    pub helbing: HelbingParameters,
    /// Terminal layout.
    pub map: MapConfig,
    /// Initial agents.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl ScenarioConfig {
    /// Parses a scenario from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(text)?)
    }

    /// Engine settings of the scenario.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            simulation: self.simulation.clone(),
            grid: self.grid.clone(),
            pathfinding: self.pathfinding.clone(),
            navigation: self.navigation.clone(),
            helbing: self.helbing.clone(),
        }
    }

    /// Validates the scenario and builds a simulation with every agent spawned.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        let map = Arc::new(self.map.build()?);
        let specs = self
            .agents
            .iter()
            .map(|agent| agent.build(&map))
            .collect::<Result<Vec<_>, _>>()?;

        let mut simulation = Simulation::new(map, &self.settings())?;
        for spec in specs {
            let _ = simulation.spawn(spec)?;
        }
        info!(
            agents = simulation.agents().len(),
            strategy = simulation.path_finder().strategy_name(),
            "scenario loaded"
        );
        Ok(simulation)
    }
}

fn position([x, y]: [f64; 2]) -> Position {
    Position::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [map]
        width = 10.0
        height = 10.0

        [[agents]]
        position = [1.0, 1.0]
    "#;

    #[test]
    fn missing_sections_take_defaults() {
        let scenario = ScenarioConfig::from_toml(MINIMAL).expect("parse");
        let settings = scenario.settings();

        assert_eq!(settings.simulation.time_step(), Duration::from_millis(100));
        assert_eq!(settings.grid.precision, 0.4);
        assert_eq!(settings.helbing, HelbingParameters::default());
        assert_eq!(scenario.agents[0].movement, MovementKind::Helbing);
        assert_eq!(scenario.agents[0].desired_speed, 1.3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn unknown_chair_is_rejected() {
        let text = format!(
            "{MINIMAL}\n        [[agents.itinerary]]\n        position = [2.0, 2.0]\n        chair = 9\n"
        );
        let scenario = ScenarioConfig::from_toml(&text).expect("parse");
        let error = scenario.build().err().expect("unknown chair");
        assert!(matches!(
            error,
            ScenarioError::Configuration(ConfigurationError::UnknownChair(9))
        ));
    }

    #[test]
    fn unrepresentable_dwell_is_rejected() {
        for dwell in ["1e300", "-1.0", "nan"] {
            let text = format!(
                "{MINIMAL}\n        [[agents.itinerary]]\n        position = [2.0, 2.0]\n        dwell_secs = {dwell}\n"
            );
            let scenario = ScenarioConfig::from_toml(&text).expect("parse");
            let error = scenario.build().err().expect("invalid dwell");
            assert!(matches!(
                error,
                ScenarioError::Configuration(ConfigurationError::InvalidParameter {
                    name: "dwell_secs",
                    ..
                })
            ));
        }
    }

    #[test]
    fn non_positive_precision_is_rejected() {
        let text = format!("[grid]\nprecision = 0.0\n{MINIMAL}");
        let scenario = ScenarioConfig::from_toml(&text).expect("parse");
        assert!(matches!(
            scenario.build().err(),
            Some(ScenarioError::Configuration(
                ConfigurationError::NonPositivePrecision(_)
            ))
        ));
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        assert!(matches!(
            ScenarioConfig::from_toml("[map]\nwidth = \"wide\""),
            Err(ScenarioError::Parse(_))
        ));
    }
}
