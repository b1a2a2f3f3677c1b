use terminal_crowd_core::{NeighborSnapshot, Polygon, Position, QueueAreaSnapshot, SpatialQuery};
use terminal_crowd_world::{QueueArea, TerminalMap};

use crate::agent::Agent;

/// Spatial view seen by one agent while it updates.
///
/// Agents are split around the updating one so that the others can be read
/// while it is mutated. Agents earlier in the slice have already committed
/// this tick's state; later ones still show the previous tick.
pub(crate) struct Surroundings<'a> {
    map: &'a TerminalMap,
    before: &'a [Agent],
    after: &'a [Agent],
}

impl<'a> Surroundings<'a> {
    pub(crate) fn new(map: &'a TerminalMap, before: &'a [Agent], after: &'a [Agent]) -> Self {
        Self { map, before, after }
    }
}

impl SpatialQuery for Surroundings<'_> {
    fn neighbors(&self, position: Position, radius: f64) -> Vec<NeighborSnapshot> {
        self.before
            .iter()
            .chain(self.after)
            .filter(|agent| agent.position.distance(position) <= radius)
            .map(|agent| agent.neighbor_snapshot(self.map))
            .collect()
    }

    fn obstacles_near(&self, position: Position, radius: f64) -> Vec<&Polygon> {
        self.map.obstacles_near(position, radius)
    }

    fn is_line_blocked(&self, from: Position, to: Position) -> bool {
        self.map.is_line_blocked(from, to)
    }

    fn queue_area_at(&self, position: Position) -> Option<QueueAreaSnapshot> {
        self.map.queue_area_at(position).map(QueueArea::snapshot)
    }
}
