//! Occupancy grid rasterised from the map's obstacle polygons.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use terminal_crowd_core::{ConfigurationError, MapId, Position};
use tracing::debug;

use crate::TerminalMap;

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    column: u32,
    row: u32,
}

impl GridCell {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Cell displaced by the signed offset, or `None` if it would underflow.
    #[must_use]
    pub fn offset(self, dx: i64, dy: i64) -> Option<GridCell> {
        let column = u32::try_from(i64::from(self.column) + dx).ok()?;
        let row = u32::try_from(i64::from(self.row) + dy).ok()?;
        Some(GridCell::new(column, row))
    }

    /// Octile distance: diagonal steps cost √2, straight steps cost 1.
    #[must_use]
    pub fn octile_distance(self, other: GridCell) -> f64 {
        let dx = f64::from(self.column.abs_diff(other.column));
        let dy = f64::from(self.row.abs_diff(other.row));
        let (low, high) = if dx < dy { (dx, dy) } else { (dy, dx) };
        low * std::f64::consts::SQRT_2 + (high - low)
    }
}

/// Dense boolean traversability grid. Read-only after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyGrid {
    columns: u32,
    rows: u32,
    precision: f64,
    blocked: Vec<bool>,
}

impl OccupancyGrid {
    /// Rasterises the map's obstacles at the given cell size.
    ///
    /// A cell is blocked iff the `precision`-sized square anchored at its
    /// grid coordinate intersects any obstacle polygon. The result only
    /// depends on the map's obstacles and `precision`.
    pub fn build(map: &TerminalMap, precision: f64) -> Result<Self, ConfigurationError> {
        if !precision.is_finite() || precision <= 0.0 {
            return Err(ConfigurationError::NonPositivePrecision(precision));
        }

        let columns = cells_along(map.width(), precision);
        let rows = cells_along(map.height(), precision);
        let mut grid = Self {
            columns,
            rows,
            precision,
            blocked: vec![false; cell_total(columns, rows)],
        };

        for obstacle in map.obstacles() {
            let (min, max) = obstacle.bounding_box();
            let Some((first_column, last_column)) = grid.span(min.x(), max.x(), columns) else {
                continue;
            };
            let Some((first_row, last_row)) = grid.span(min.y(), max.y(), rows) else {
                continue;
            };

            for row in first_row..=last_row {
                for column in first_column..=last_column {
                    let cell = GridCell::new(column, row);
                    let Some(index) = grid.index_of(cell) else {
                        continue;
                    };
                    if grid.blocked[index] {
                        continue;
                    }
                    let (low, high) = grid.bounds_of(cell);
                    if obstacle.intersects_rect(low, high) {
                        grid.blocked[index] = true;
                    }
                }
            }
        }

        debug!(
            map = map.id().get(),
            precision,
            columns,
            rows,
            blocked = grid.blocked.iter().filter(|cell| **cell).count(),
            "built occupancy grid"
        );
        Ok(grid)
    }

    /// Builds a grid directly from a predicate, bypassing rasterisation.
    pub fn from_fn<F>(
        columns: u32,
        rows: u32,
        precision: f64,
        mut is_blocked: F,
    ) -> Result<Self, ConfigurationError>
    where
        F: FnMut(GridCell) -> bool,
    {
        if !precision.is_finite() || precision <= 0.0 {
            return Err(ConfigurationError::NonPositivePrecision(precision));
        }
        let mut blocked = Vec::with_capacity(cell_total(columns, rows));
        for row in 0..rows {
            for column in 0..columns {
                blocked.push(is_blocked(GridCell::new(column, row)));
            }
        }
        Ok(Self {
            columns,
            rows,
            precision,
            blocked,
        })
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Side length of a cell in world units.
    #[must_use]
    pub const fn precision(&self) -> f64 {
        self.precision
    }

    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.blocked.len()
    }

    /// Reports whether the cell lies within the grid.
    #[must_use]
    pub const fn contains(&self, cell: GridCell) -> bool {
        cell.column < self.columns && cell.row < self.rows
    }

    /// Reports whether the cell can be walked through. Off-grid cells are not traversable.
    #[must_use]
    pub fn is_traversable(&self, cell: GridCell) -> bool {
        self.index_of(cell)
            .is_some_and(|index| !self.blocked[index])
    }

    /// Signed-coordinate variant of [`OccupancyGrid::is_traversable`] used by ray walks.
    #[must_use]
    pub fn is_traversable_at(&self, column: i64, row: i64) -> bool {
        match (u32::try_from(column), u32::try_from(row)) {
            (Ok(column), Ok(row)) => self.is_traversable(GridCell::new(column, row)),
            _ => false,
        }
    }

    /// Dense row-major index of the cell, if it lies within the grid.
    #[must_use]
    pub fn index_of(&self, cell: GridCell) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let width = usize::try_from(self.columns).ok()?;
        let row = usize::try_from(cell.row).ok()?;
        let column = usize::try_from(cell.column).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    /// Cell stored at the dense index.
    #[must_use]
    pub fn cell_at_index(&self, index: usize) -> Option<GridCell> {
        if index >= self.blocked.len() {
            return None;
        }
        let width = usize::try_from(self.columns).ok()?;
        let column = u32::try_from(index % width).ok()?;
        let row = u32::try_from(index / width).ok()?;
        Some(GridCell::new(column, row))
    }

    /// Cell containing the position, found by integer division by the precision.
    #[must_use]
    pub fn cell_at(&self, position: Position) -> Option<GridCell> {
        if position.is_none() || !position.x().is_finite() || !position.y().is_finite() {
            return None;
        }
        let column = (position.x() / self.precision).floor();
        let row = (position.y() / self.precision).floor();
        if column < 0.0 || row < 0.0 {
            return None;
        }
        let cell = GridCell::new(column as u32, row as u32);
        self.contains(cell).then_some(cell)
    }

    /// Centre of the cell in world coordinates.
    #[must_use]
    pub fn center_of(&self, cell: GridCell) -> Position {
        Position::new(
            (f64::from(cell.column) + 0.5) * self.precision,
            (f64::from(cell.row) + 0.5) * self.precision,
        )
    }

    /// Traversable cell for the position: its own cell when walkable, otherwise
    /// the closest walkable cell found by a breadth-first ring search.
    #[must_use]
    pub fn nearest_traversable(&self, position: Position) -> Option<GridCell> {
        self.search_traversable(position, |_| true)
    }

    /// Closest walkable cell for which `accept` holds, searched outwards from
    /// the position's cell. Falls back to [`Self::nearest_traversable`] when no
    /// walkable cell is accepted.
    #[must_use]
    pub fn nearest_traversable_where<F>(&self, position: Position, accept: F) -> Option<GridCell>
    where
        F: Fn(GridCell) -> bool,
    {
        self.search_traversable(position, accept)
            .or_else(|| self.nearest_traversable(position))
    }

    fn search_traversable<F>(&self, position: Position, accept: F) -> Option<GridCell>
    where
        F: Fn(GridCell) -> bool,
    {
        if self.blocked.is_empty() || position.is_none() {
            return None;
        }

        let origin = self.cell_at(position).unwrap_or_else(|| self.clamp(position));
        if self.is_traversable(origin) && accept(origin) {
            return Some(origin);
        }

        let mut visited = vec![false; self.blocked.len()];
        let mut queue = VecDeque::new();
        if let Some(index) = self.index_of(origin) {
            visited[index] = true;
            queue.push_back(origin);
        }

        while let Some(cell) = queue.pop_front() {
            for (dx, dy) in NEIGHBOR_OFFSETS {
                let Some(neighbor) = cell.offset(dx, dy) else {
                    continue;
                };
                let Some(index) = self.index_of(neighbor) else {
                    continue;
                };
                if visited[index] {
                    continue;
                }
                if !self.blocked[index] && accept(neighbor) {
                    return Some(neighbor);
                }
                visited[index] = true;
                queue.push_back(neighbor);
            }
        }

        None
    }

    fn clamp(&self, position: Position) -> GridCell {
        let clamp_axis = |value: f64, cells: u32| -> u32 {
            let index = (value / self.precision).floor();
            if index <= 0.0 || !index.is_finite() {
                0
            } else {
                (index as u32).min(cells.saturating_sub(1))
            }
        };
        GridCell::new(
            clamp_axis(position.x(), self.columns),
            clamp_axis(position.y(), self.rows),
        )
    }

    fn bounds_of(&self, cell: GridCell) -> (Position, Position) {
        let low = Position::new(
            f64::from(cell.column) * self.precision,
            f64::from(cell.row) * self.precision,
        );
        let high = Position::new(low.x() + self.precision, low.y() + self.precision);
        (low, high)
    }

    fn span(&self, low: f64, high: f64, cells: u32) -> Option<(u32, u32)> {
        if cells == 0 || high < 0.0 {
            return None;
        }
        let first = (low / self.precision).floor().max(0.0);
        let last = (high / self.precision).floor();
        let limit = f64::from(cells - 1);
        if first > limit {
            return None;
        }
        Some((first as u32, last.min(limit) as u32))
    }
}

/// Eight-connected neighbourhood: four straight offsets followed by four diagonals.
pub const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Explicit cache of occupancy grids keyed by map identity and precision.
///
/// Owned by whichever component constructs path finders and passed by
/// reference, so separate maps and separate tests never share a grid.
#[derive(Debug, Default)]
pub struct GridCache {
    grids: HashMap<(MapId, u64), Arc<OccupancyGrid>>,
}

impl GridCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached grid for `(map, precision)`, building it on first use.
    pub fn get_or_build(
        &mut self,
        map: &TerminalMap,
        precision: f64,
    ) -> Result<Arc<OccupancyGrid>, ConfigurationError> {
        let key = (map.id(), precision.to_bits());
        if let Some(grid) = self.grids.get(&key) {
            return Ok(Arc::clone(grid));
        }
        let grid = Arc::new(OccupancyGrid::build(map, precision)?);
        let _ = self.grids.insert(key, Arc::clone(&grid));
        Ok(grid)
    }

    /// Drops every grid derived from the given map.
    pub fn evict(&mut self, map: MapId) {
        self.grids.retain(|(id, _), _| *id != map);
    }

    /// Number of cached grids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// Reports whether the cache holds no grids.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

fn cells_along(extent: f64, precision: f64) -> u32 {
    let cells = (extent / precision).ceil();
    if cells < 1.0 || !cells.is_finite() {
        1
    } else if cells > f64::from(u32::MAX) {
        u32::MAX
    } else {
        cells as u32
    }
}

fn cell_total(columns: u32, rows: u32) -> usize {
    let total = u64::from(columns) * u64::from(rows);
    usize::try_from(total).unwrap_or(0)
}
