#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Goal-queue navigation with stuck recovery.
//!
//! A [`NavigationModule`] turns goals handed down by the decision layers into
//! a queue of waypoints, prunes the queue as the agent walks, and escalates
//! when the agent stops making progress. It never moves the agent itself; the
//! movement model reads [`NavigationModule::goal_position`] after navigation has
//! finished its update for the tick.

mod stuck;

use std::{collections::VecDeque, f64::consts::TAU, sync::Arc, time::Duration};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use terminal_crowd_core::{
    ActivityHints, ConfigurationError, Position, SpatialQuery, StopOrder, Vector,
};
use terminal_crowd_system_pathfinding::PathFinder;
use tracing::debug;

pub use stuck::{StuckDetector, DEFAULT_STUCK_DISTANCE};

/// Navigation tunables.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Distance at which a waypoint counts as reached.
    pub reach_tolerance: f64,
    /// Seconds between opportunistic waypoint shortcuts.
    pub shortcut_interval_secs: f64,
    /// Seconds at rest inside a queuing area before heading for its exit.
    pub queue_stuck_after_secs: f64,
    /// Seconds at rest elsewhere before re-planning.
    pub general_stuck_after_secs: f64,
    /// Displacement that resets the stuck timer.
    pub stuck_distance: f64,
    /// Maximum distance of the random detour added when re-planning.
    pub nudge_radius: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            reach_tolerance: 0.3,
            shortcut_interval_secs: 5.0,
            queue_stuck_after_secs: 60.0,
            general_stuck_after_secs: 20.0,
            stuck_distance: DEFAULT_STUCK_DISTANCE,
            nudge_radius: 1.0,
        }
    }
}

impl NavigationConfig {
    /// Rejects negative or non-finite values.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let fields = [
            ("reach_tolerance", self.reach_tolerance),
            ("shortcut_interval_secs", self.shortcut_interval_secs),
            ("queue_stuck_after_secs", self.queue_stuck_after_secs),
            ("general_stuck_after_secs", self.general_stuck_after_secs),
            ("stuck_distance", self.stuck_distance),
            ("nudge_radius", self.nudge_radius),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Recovery action taken for an agent that stopped making progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Escalation {
    /// The agent was stuck in a queuing area and now heads for its exit first.
    QueueExit {
        /// Exit of the queuing area.
        exit: Position,
    },
    /// The agent was idle and now heads for its next planned activity.
    NextActivity {
        /// Position of the activity.
        target: Position,
    },
    /// The path to the final goal was recomputed.
    Replanned {
        /// Final goal the agent is heading for.
        goal: Position,
        /// Random detour inserted ahead of the new path, when one was clear.
        nudge: Option<Position>,
    },
}

/// Per-tick inputs of [`NavigationModule::update`].
#[derive(Clone, Copy)]
pub struct NavigationContext<'a> {
    /// Agent position at the start of the tick.
    pub position: Position,
    /// Whether the agent is seated.
    pub seated: bool,
    /// Stop order currently applied to the agent.
    pub stop_order: StopOrder,
    /// Map and neighbour queries.
    pub surroundings: &'a dyn SpatialQuery,
    /// Activity layer of the agent.
    pub activities: &'a dyn ActivityHints,
}

/// Goal queue, pruning and stuck escalation for one agent.
///
/// The queue is empty exactly when the agent has reached its goal. Index 0 is
/// always the next waypoint to walk to.
#[derive(Debug)]
pub struct NavigationModule {
    goals: VecDeque<Position>,
    stuck: StuckDetector,
    path_finder: Arc<PathFinder>,
    config: NavigationConfig,
    since_shortcut: Duration,
    rng: ChaCha8Rng,
}

impl NavigationModule {
    /// Creates a module with an empty goal queue.
    #[must_use]
    pub fn new(path_finder: Arc<PathFinder>, config: NavigationConfig, seed: u64) -> Self {
        Self {
            goals: VecDeque::new(),
            stuck: StuckDetector::new(config.stuck_distance),
            path_finder,
            config,
            since_shortcut: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Next waypoint to walk to.
    #[must_use]
    pub fn goal_position(&self) -> Option<Position> {
        self.goals.front().copied()
    }

    /// Last waypoint in the queue.
    #[must_use]
    pub fn final_goal(&self) -> Option<Position> {
        self.goals.back().copied()
    }

    /// Pending waypoints, nearest first.
    pub fn goal_positions(&self) -> impl ExactSizeIterator<Item = Position> + '_ {
        self.goals.iter().copied()
    }

    /// Reports whether the goal queue has been exhausted.
    #[must_use]
    pub fn reached_goal(&self) -> bool {
        self.goals.is_empty()
    }

    /// Reports whether the agent has been at rest for longer than `seconds`.
    #[must_use]
    pub fn is_stuck(&self, seconds: f64) -> bool {
        self.stuck.is_stuck(seconds)
    }

    /// Stuck detector owned by this module.
    #[must_use]
    pub fn stuck_detector(&self) -> &StuckDetector {
        &self.stuck
    }

    /// Replaces the goal queue with a path from `from` to `goal`.
    ///
    /// [`Position::NONE`] clears the queue without planning.
    pub fn set_goal(&mut self, from: Position, goal: Position) {
        self.goals.clear();
        self.stuck.reset();
        if goal.is_none() {
            return;
        }
        let path = self.path_finder.find_path(from, goal, self.path_finder.smooths());
        self.goals.extend(path);
    }

    /// Routes through `waypoint` before continuing to the current final goal.
    pub fn set_short_term_goal(&mut self, from: Position, waypoint: Position) {
        self.set_short_term_goals(from, &[waypoint]);
    }

    /// Routes through `waypoints` in order before continuing to the current final goal.
    ///
    /// Intermediate waypoints of the previous queue are replaced by a fresh path
    /// from the last inserted point to the previous final goal.
    pub fn set_short_term_goals(&mut self, from: Position, waypoints: &[Position]) {
        let resume = self.final_goal();
        let smooth = self.path_finder.smooths();
        let mut queue = VecDeque::new();
        let mut cursor = from;

        for waypoint in waypoints.iter().copied().filter(|point| !point.is_none()) {
            queue.extend(self.path_finder.find_path(cursor, waypoint, smooth));
            cursor = waypoint;
        }
        if let Some(resume) = resume {
            if resume != cursor {
                queue.extend(self.path_finder.find_path(cursor, resume, smooth));
            }
        }

        self.goals = queue;
        self.stuck.reset();
    }

    /// Prunes reached waypoints and escalates a stuck agent.
    ///
    /// Seated agents are skipped entirely.
    pub fn update(&mut self, dt: Duration, context: NavigationContext<'_>) -> Option<Escalation> {
        if context.seated {
            return None;
        }
        self.prune(dt, context);
        self.stuck.update(dt, context.position, false);
        let escalation = self.escalate(context);
        if let Some(escalation) = escalation {
            debug!(?escalation, position = ?context.position, "navigation escalated");
            self.stuck.reset();
        }
        escalation
    }

    fn prune(&mut self, dt: Duration, context: NavigationContext<'_>) {
        self.since_shortcut = self.since_shortcut.saturating_add(dt);
        let position = context.position;
        let tolerance = self.config.reach_tolerance;

        if self
            .goals
            .front()
            .is_some_and(|goal| goal.distance(position) <= tolerance)
        {
            let _ = self.goals.pop_front();
            return;
        }

        if !context.activities.has_blocking_activity()
            && self
                .goals
                .get(1)
                .is_some_and(|goal| goal.distance(position) <= tolerance)
        {
            let _ = self.goals.pop_front();
            let _ = self.goals.pop_front();
            return;
        }

        if self.since_shortcut.as_secs_f64() < self.config.shortcut_interval_secs {
            return;
        }
        self.since_shortcut = Duration::ZERO;

        // When neither lookahead is clear nothing changes until the next interval.
        let clear = |goal: Option<&Position>| {
            goal.is_some_and(|goal| !context.surroundings.is_line_blocked(position, *goal))
        };
        if self.goals.len() >= 3 && clear(self.goals.get(2)) {
            let _ = self.goals.drain(..2);
        } else if self.goals.len() >= 2 && clear(self.goals.get(1)) {
            let _ = self.goals.pop_front();
        }
    }

    fn escalate(&mut self, context: NavigationContext<'_>) -> Option<Escalation> {
        let position = context.position;

        if let Some(queue) = context.surroundings.queue_area_at(position) {
            if !self
                .stuck
                .is_stuck_with_stop_order(context.stop_order, self.config.queue_stuck_after_secs)
            {
                return None;
            }
            self.set_short_term_goal(position, queue.exit);
            return Some(Escalation::QueueExit { exit: queue.exit });
        }

        if !self
            .stuck
            .is_stuck_with_stop_order(context.stop_order, self.config.general_stuck_after_secs)
        {
            return None;
        }

        if self.goals.is_empty() {
            if !context.activities.is_idle() {
                return None;
            }
            let target = context.activities.next_activity_position()?;
            self.set_goal(position, target);
            return Some(Escalation::NextActivity { target });
        }

        let goal = self.final_goal()?;
        self.set_goal(position, goal);
        let nudge = self.random_nudge(position, context.surroundings);
        if let Some(nudge) = nudge {
            self.set_short_term_goal(position, nudge);
        }
        Some(Escalation::Replanned { goal, nudge })
    }

    fn random_nudge(&mut self, position: Position, surroundings: &dyn SpatialQuery) -> Option<Position> {
        if self.config.nudge_radius <= 0.0 {
            return None;
        }
        let angle = self.rng.gen_range(0.0..TAU);
        let distance = self.rng.gen_range(0.0..self.config.nudge_radius);
        let nudge = position + Vector::new(angle.cos(), angle.sin()) * distance;
        (!surroundings.is_line_blocked(position, nudge)).then_some(nudge)
    }
}
