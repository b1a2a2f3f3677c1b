#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Grid path planning for pedestrians.
//!
//! Three interchangeable [`PathSearchStrategy`] implementations share one cost
//! model: 8-connected moves costing 1 (straight) or √2 (diagonal), with
//! diagonals forbidden when either adjacent straight cell is blocked. Every
//! query allocates its own node arena, so a single [`PathFinder`] can be
//! shared by all agents. Searches never fail; an unreachable goal yields the
//! degenerate single-waypoint path and is left to the stuck detector.

mod arena;
mod astar;
mod jps;
mod path;
mod smoothing;

use std::{f64::consts::SQRT_2, fmt};

use serde::Deserialize;
use terminal_crowd_core::ConfigurationError;
use terminal_crowd_world::{GridCell, OccupancyGrid};

pub use astar::{AStar, Dijkstra};
pub use jps::JumpPointSearch;
pub use path::{Path, PathFinder};
pub use smoothing::smooth_corners;

/// Node expansions after which A* and JPS return their best partial path.
pub const DEFAULT_MAX_EXPANSIONS: usize = 200_000;

/// Default tolerance of the collinearity test used by [`smooth_corners`].
pub const DEFAULT_SMOOTHING_EPSILON: f64 = 1e-5;

/// Capability shared by the grid search algorithms.
pub trait PathSearchStrategy: fmt::Debug + Send + Sync {
    /// Stable identifier used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Searches from `start` to `goal`, returning the visited cell chain.
    fn search(&self, grid: &OccupancyGrid, start: GridCell, goal: GridCell) -> SearchOutcome;
}

/// How a search terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    /// The goal cell was reached.
    Complete,
    /// The expansion budget ran out; the cells lead to the closest node found.
    Truncated,
    /// The open set emptied without reaching the goal.
    Unreachable,
}

/// Result of a single grid search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Cells from start to the reached node, inclusive. Empty when unreachable.
    pub cells: Vec<GridCell>,
    /// Termination reason.
    pub status: SearchStatus,
    /// Number of nodes taken off the open list.
    pub expanded: usize,
}

impl SearchOutcome {
    /// Outcome for a search that found nothing.
    #[must_use]
    pub fn unreachable(expanded: usize) -> Self {
        Self {
            cells: Vec::new(),
            status: SearchStatus::Unreachable,
            expanded,
        }
    }

    /// Summed step cost along `cells`.
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.cells
            .windows(2)
            .map(|pair| {
                let diagonal = pair[0].column() != pair[1].column() && pair[0].row() != pair[1].row();
                if diagonal {
                    SQRT_2
                } else {
                    1.0
                }
            })
            .sum()
    }
}

/// Search algorithm selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    /// A* with octile heuristic.
    #[default]
    AStar,
    /// Uniform-cost search.
    Dijkstra,
    /// Jump Point Search.
    JumpPoint,
}

impl SearchAlgorithm {
    /// Instantiates the strategy. Dijkstra ignores the expansion budget.
    #[must_use]
    pub fn strategy(self, max_expansions: usize) -> Box<dyn PathSearchStrategy> {
        match self {
            Self::AStar => Box::new(AStar::new(max_expansions)),
            Self::Dijkstra => Box::new(Dijkstra),
            Self::JumpPoint => Box::new(JumpPointSearch::new(max_expansions)),
        }
    }
}

/// Pathfinding tunables.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Strategy used by every agent.
    pub algorithm: SearchAlgorithm,
    /// Soft expansion budget for A* and JPS.
    pub max_expansions: usize,
    /// Collinearity tolerance for corner extraction.
    pub smoothing_epsilon: f64,
    /// Whether paths are reduced to their corner points.
    pub smooth: bool,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            algorithm: SearchAlgorithm::default(),
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            smoothing_epsilon: DEFAULT_SMOOTHING_EPSILON,
            smooth: true,
        }
    }
}

impl PathfindingConfig {
    /// Rejects a zero budget or a negative / non-finite smoothing tolerance.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_expansions == 0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "max_expansions",
                value: 0.0,
            });
        }
        if !self.smoothing_epsilon.is_finite() || self.smoothing_epsilon < 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "smoothing_epsilon",
                value: self.smoothing_epsilon,
            });
        }
        Ok(())
    }
}
