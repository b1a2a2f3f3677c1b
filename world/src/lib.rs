#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Static terminal layout: obstacles, queuing areas, checkpoints and chairs.
//!
//! The map is constructed once per scenario and is read-only afterwards. It
//! answers the obstacle half of the spatial queries consumed by navigation and
//! movement, and is the input to the occupancy grid builder.

mod grid;

pub use grid::{GridCache, GridCell, OccupancyGrid, NEIGHBOR_OFFSETS};

use terminal_crowd_core::{
    ChairId, ConfigurationError, MapId, Polygon, Position, QueueAreaSnapshot,
};

/// Physical line with an entrance and an exit point.
#[derive(Clone, Debug, PartialEq)]
pub struct QueueArea {
    area: Polygon,
    entrance: Position,
    exit: Position,
}

impl QueueArea {
    /// Creates a queuing area covering `area`.
    #[must_use]
    pub fn new(area: Polygon, entrance: Position, exit: Position) -> Self {
        Self {
            area,
            entrance,
            exit,
        }
    }

    /// Floor region covered by the line.
    #[must_use]
    pub fn area(&self) -> &Polygon {
        &self.area
    }

    /// Point where the line starts.
    #[must_use]
    pub const fn entrance(&self) -> Position {
        self.entrance
    }

    /// Point where the line is left once served.
    #[must_use]
    pub const fn exit(&self) -> Position {
        self.exit
    }

    /// Entrance/exit pair exposed to navigation and movement.
    #[must_use]
    pub const fn snapshot(&self) -> QueueAreaSnapshot {
        QueueAreaSnapshot {
            entrance: self.entrance,
            exit: self.exit,
        }
    }
}

/// Seat that agents may occupy while waiting.
#[derive(Clone, Debug, PartialEq)]
pub struct Chair {
    id: ChairId,
    footprint: Polygon,
}

impl Chair {
    /// Creates a chair occupying `footprint`.
    #[must_use]
    pub fn new(id: ChairId, footprint: Polygon) -> Self {
        Self { id, footprint }
    }

    /// Identifier of the chair.
    #[must_use]
    pub const fn id(&self) -> ChairId {
        self.id
    }

    /// Floor region covered by the chair.
    #[must_use]
    pub fn footprint(&self) -> &Polygon {
        &self.footprint
    }

    /// Geometric centre that seated agents are pinned to.
    #[must_use]
    pub fn center(&self) -> Position {
        self.footprint.centroid()
    }
}

/// Authoritative static layout of a terminal.
#[derive(Clone, Debug, PartialEq)]
pub struct TerminalMap {
    id: MapId,
    width: f64,
    height: f64,
    obstacles: Vec<Polygon>,
    queue_areas: Vec<QueueArea>,
    checkpoints: Vec<Polygon>,
    chairs: Vec<Chair>,
}

impl TerminalMap {
    /// Creates an empty map spanning `0..width` by `0..height`.
    pub fn new(id: MapId, width: f64, height: f64) -> Result<Self, ConfigurationError> {
        if !width.is_finite() || width <= 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "map width",
                value: width,
            });
        }
        if !height.is_finite() || height <= 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "map height",
                value: height,
            });
        }
        Ok(Self {
            id,
            width,
            height,
            obstacles: Vec::new(),
            queue_areas: Vec::new(),
            checkpoints: Vec::new(),
            chairs: Vec::new(),
        })
    }

    /// Adds an obstacle polygon.
    #[must_use]
    pub fn with_obstacle(mut self, obstacle: Polygon) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    /// Adds a queuing area.
    #[must_use]
    pub fn with_queue_area(mut self, queue: QueueArea) -> Self {
        self.queue_areas.push(queue);
        self
    }

    /// Adds a checkpoint screening region.
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Polygon) -> Self {
        self.checkpoints.push(checkpoint);
        self
    }

    /// Adds a chair.
    #[must_use]
    pub fn with_chair(mut self, chair: Chair) -> Self {
        self.chairs.push(chair);
        self
    }

    /// Identity used to key derived data.
    #[must_use]
    pub const fn id(&self) -> MapId {
        self.id
    }

    /// Horizontal extent in world units.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Vertical extent in world units.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Obstacle polygons.
    #[must_use]
    pub fn obstacles(&self) -> &[Polygon] {
        &self.obstacles
    }

    /// Queuing areas.
    #[must_use]
    pub fn queue_areas(&self) -> &[QueueArea] {
        &self.queue_areas
    }

    /// Checkpoint screening regions.
    #[must_use]
    pub fn checkpoints(&self) -> &[Polygon] {
        &self.checkpoints
    }

    /// Chairs.
    #[must_use]
    pub fn chairs(&self) -> &[Chair] {
        &self.chairs
    }

    /// Looks up a chair by identifier.
    #[must_use]
    pub fn chair(&self, id: ChairId) -> Option<&Chair> {
        self.chairs.iter().find(|chair| chair.id == id)
    }

    /// Reports whether the segment `from-to` crosses any obstacle.
    #[must_use]
    pub fn is_line_blocked(&self, from: Position, to: Position) -> bool {
        self.obstacles
            .iter()
            .any(|obstacle| obstacle.intersects_segment(from, to))
    }

    /// Obstacles whose boundary lies within `radius` of `position`, or that contain it.
    #[must_use]
    pub fn obstacles_near(&self, position: Position, radius: f64) -> Vec<&Polygon> {
        self.obstacles
            .iter()
            .filter(|obstacle| {
                obstacle.distance_to(position) <= radius || obstacle.contains(position)
            })
            .collect()
    }

    /// Queuing area whose floor region contains `position`.
    #[must_use]
    pub fn queue_area_at(&self, position: Position) -> Option<&QueueArea> {
        self.queue_areas
            .iter()
            .find(|queue| queue.area.contains(position))
    }

    /// Reports whether `position` lies inside a checkpoint screening region.
    #[must_use]
    pub fn in_checkpoint(&self, position: Position) -> bool {
        self.checkpoints
            .iter()
            .any(|checkpoint| checkpoint.contains(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_wall() -> TerminalMap {
        TerminalMap::new(MapId::new(7), 10.0, 10.0)
            .expect("valid map")
            .with_obstacle(Polygon::rectangle(
                Position::new(4.8, 0.0),
                Position::new(5.2, 8.0),
            ))
            .with_queue_area(QueueArea::new(
                Polygon::rectangle(Position::new(0.0, 8.5), Position::new(4.0, 9.5)),
                Position::new(0.5, 9.0),
                Position::new(3.5, 9.0),
            ))
            .with_chair(Chair::new(
                ChairId::new(3),
                Polygon::rectangle(Position::new(8.0, 8.0), Position::new(9.0, 9.0)),
            ))
    }

    #[test]
    fn line_of_sight_respects_obstacles() {
        let map = map_with_wall();
        assert!(map.is_line_blocked(Position::new(1.0, 5.0), Position::new(9.0, 5.0)));
        assert!(!map.is_line_blocked(Position::new(1.0, 9.0), Position::new(9.0, 9.0)));
    }

    #[test]
    fn nearby_obstacles_are_filtered_by_distance() {
        let map = map_with_wall();
        assert_eq!(map.obstacles_near(Position::new(4.0, 4.0), 1.0).len(), 1);
        assert!(map.obstacles_near(Position::new(1.0, 4.0), 1.0).is_empty());
    }

    #[test]
    fn queue_and_chair_lookups() {
        let map = map_with_wall();
        let queue = map
            .queue_area_at(Position::new(2.0, 9.0))
            .expect("inside queue");
        assert_eq!(queue.exit(), Position::new(3.5, 9.0));
        assert!(map.queue_area_at(Position::new(2.0, 5.0)).is_none());
        assert_eq!(
            map.chair(ChairId::new(3)).map(Chair::center),
            Some(Position::new(8.5, 8.5))
        );
        assert!(map.chair(ChairId::new(4)).is_none());
    }

    #[test]
    fn new_rejects_empty_extent() {
        assert!(TerminalMap::new(MapId::new(1), 0.0, 10.0).is_err());
        assert!(TerminalMap::new(MapId::new(1), 10.0, f64::NAN).is_err());
    }
}
