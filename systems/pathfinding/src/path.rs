use std::sync::Arc;

use terminal_crowd_core::{ConfigurationError, Position};
use terminal_crowd_world::{GridCache, GridCell, OccupancyGrid, TerminalMap};
use tracing::{debug, trace};

use crate::{smoothing::smooth_corners, PathSearchStrategy, PathfindingConfig, SearchStatus};

/// Ordered waypoints from the agent's position (exclusive) to its goal, nearest first.
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    waypoints: Vec<Position>,
}

impl Path {
    /// Degenerate single-waypoint path heading straight for `goal`.
    #[must_use]
    pub fn direct(goal: Position) -> Self {
        Self {
            waypoints: vec![goal],
        }
    }

    /// Builds a path from explicit waypoints.
    #[must_use]
    pub fn from_waypoints(waypoints: Vec<Position>) -> Self {
        Self { waypoints }
    }

    /// Waypoints, nearest first.
    #[must_use]
    pub fn waypoints(&self) -> &[Position] {
        &self.waypoints
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Reports whether the path holds no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Reports whether the path is the single-waypoint degenerate form.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.waypoints.len() == 1
    }

    /// Polyline length when walked from `start`.
    #[must_use]
    pub fn length_from(&self, start: Position) -> f64 {
        let mut previous = start;
        let mut total = 0.0;
        for waypoint in &self.waypoints {
            total += previous.distance(*waypoint);
            previous = *waypoint;
        }
        total
    }
}

impl IntoIterator for Path {
    type Item = Position;
    type IntoIter = std::vec::IntoIter<Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.waypoints.into_iter()
    }
}

/// Plans waypoint paths on a shared, read-only occupancy grid.
///
/// The grid comes from a [`GridCache`] owned by the caller. The finder itself
/// holds no per-query state and can be shared between agents behind an `Arc`.
#[derive(Debug)]
pub struct PathFinder {
    map: Arc<TerminalMap>,
    grid: Arc<OccupancyGrid>,
    strategy: Box<dyn PathSearchStrategy>,
    smoothing_epsilon: f64,
    smooth: bool,
}

impl PathFinder {
    /// Creates a finder over an already built grid.
    #[must_use]
    pub fn new(
        map: Arc<TerminalMap>,
        grid: Arc<OccupancyGrid>,
        strategy: Box<dyn PathSearchStrategy>,
        smoothing_epsilon: f64,
    ) -> Self {
        Self {
            map,
            grid,
            strategy,
            smoothing_epsilon,
            smooth: true,
        }
    }

    /// Sets whether callers that defer to [`PathFinder::smooths`] get corner-only paths.
    #[must_use]
    pub fn with_smoothing(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }

    /// Creates a finder from configuration, building or reusing the grid in `cache`.
    pub fn from_config(
        map: Arc<TerminalMap>,
        cache: &mut GridCache,
        precision: f64,
        config: &PathfindingConfig,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let grid = cache.get_or_build(&map, precision)?;
        Ok(Self::new(
            map,
            grid,
            config.algorithm.strategy(config.max_expansions),
            config.smoothing_epsilon,
        )
        .with_smoothing(config.smooth))
    }

    /// Grid the searches run on.
    #[must_use]
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Map used for line-of-sight checks.
    #[must_use]
    pub fn map(&self) -> &TerminalMap {
        &self.map
    }

    /// Configured smoothing preference.
    #[must_use]
    pub const fn smooths(&self) -> bool {
        self.smooth
    }

    /// Name of the configured search strategy.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Plans a path from `start` to `goal`.
    ///
    /// Never fails: when the goal is directly visible, unreachable, or either
    /// endpoint is [`Position::NONE`], the result is the single waypoint `goal`.
    /// The returned waypoints exclude `start`.
    #[must_use]
    pub fn find_path(&self, start: Position, goal: Position, smooth: bool) -> Path {
        if start.is_none() || goal.is_none() || !self.map.is_line_blocked(start, goal) {
            return Path::direct(goal);
        }

        let (Some(from), Some(to)) = (self.endpoint_cell(start), self.endpoint_cell(goal)) else {
            debug!(?start, ?goal, "no traversable cell near path endpoints");
            return Path::direct(goal);
        };

        let outcome = self.strategy.search(&self.grid, from, to);
        trace!(
            strategy = self.strategy.name(),
            expanded = outcome.expanded,
            cells = outcome.cells.len(),
            "path search finished"
        );
        if outcome.status == SearchStatus::Unreachable || outcome.cells.is_empty() {
            debug!(?start, ?goal, strategy = self.strategy.name(), "goal unreachable");
            return Path::direct(goal);
        }

        // A start cell other than the agent's own is entered through its centre.
        let own_start_cell = self.grid.cell_at(start) == Some(from);
        let mut points = Vec::with_capacity(outcome.cells.len() + 2);
        points.push(start);
        points.extend(
            outcome
                .cells
                .iter()
                .skip(usize::from(own_start_cell))
                .map(|cell| self.grid.center_of(*cell)),
        );
        let ends_in_goal_cell =
            outcome.status == SearchStatus::Complete && self.grid.cell_at(goal) == Some(to);
        let last = points.len() - 1;
        if ends_in_goal_cell && last > 0 && !self.map.is_line_blocked(points[last - 1], goal) {
            points[last] = goal;
        } else {
            points.push(goal);
        }

        let points = if smooth {
            smooth_corners(&points, self.smoothing_epsilon)
        } else {
            points
        };
        Path::from_waypoints(points.into_iter().skip(1).collect())
    }

    /// Walkable cell whose centre can be seen from `point`, or the nearest
    /// walkable cell when none is visible.
    fn endpoint_cell(&self, point: Position) -> Option<GridCell> {
        self.grid.nearest_traversable_where(point, |cell| {
            !self.map.is_line_blocked(point, self.grid.center_of(cell))
        })
    }
}
