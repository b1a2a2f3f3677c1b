use std::{fmt, time::Duration};

use terminal_crowd_system_navigation::Escalation;

/// Run-wide tallies updated as events are emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Counters {
    pub(crate) goals_reached: u64,
    pub(crate) queue_exits: u64,
    pub(crate) next_activity: u64,
    pub(crate) replans: u64,
}

impl Counters {
    pub(crate) fn record(&mut self, escalation: &Escalation) {
        let counter = match escalation {
            Escalation::QueueExit { .. } => &mut self.queue_exits,
            Escalation::NextActivity { .. } => &mut self.next_activity,
            Escalation::Replanned { .. } => &mut self.replans,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Aggregate view of a simulation run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationSummary {
    /// Ticks processed.
    pub ticks: u64,
    /// Simulated time.
    pub elapsed: Duration,
    /// Live agents.
    pub agents: usize,
    /// Goal queues emptied by arrival.
    pub goals_reached: u64,
    /// Agents sent to a queue exit after stalling in line.
    pub queue_exits: u64,
    /// Idle agents sent on to their next activity.
    pub next_activity: u64,
    /// Paths recomputed for stalled agents.
    pub replans: u64,
    /// Agents with pending waypoints and no progress for longer than the general stuck threshold.
    pub stuck_agents: usize,
    /// Agents currently seated.
    pub seated_agents: usize,
    /// Mean speed over the agents, in units per second.
    pub mean_speed: f64,
}

impl SimulationSummary {
    /// Total number of stuck escalations of any kind.
    #[must_use]
    pub const fn escalations(&self) -> u64 {
        self.queue_exits + self.next_activity + self.replans
    }
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ticks: {} ({:.1} s simulated)",
            self.ticks,
            self.elapsed.as_secs_f64()
        )?;
        writeln!(
            f,
            "agents: {} ({} seated, {} stuck)",
            self.agents, self.seated_agents, self.stuck_agents
        )?;
        writeln!(f, "goals reached: {}", self.goals_reached)?;
        writeln!(
            f,
            "escalations: {} queue exit, {} next activity, {} replanned",
            self.queue_exits, self.next_activity, self.replans
        )?;
        write!(f, "mean speed: {:.3} units/s", self.mean_speed)
    }
}
