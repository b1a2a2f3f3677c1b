//! Jump Point Search over the same 8-connected, no-corner-cutting cost model as A*.
//!
//! Successors are pruned relative to the direction the search arrived from,
//! then extended by "jumping" along each remaining direction until the goal or
//! a cell with a forced neighbour appears. Only those jump points enter the
//! open list; the straight runs between them are re-expanded into individual
//! cells when the path is reconstructed.

use terminal_crowd_world::{GridCell, OccupancyGrid};
use tracing::{debug, trace};

use crate::{
    arena::{OpenList, SearchArena},
    PathSearchStrategy, SearchOutcome, SearchStatus, DEFAULT_MAX_EXPANSIONS,
};

/// Jump Point Search with a soft expansion budget.
#[derive(Clone, Copy, Debug)]
pub struct JumpPointSearch {
    max_expansions: usize,
}

impl JumpPointSearch {
    /// Creates a JPS strategy that gives up after `max_expansions` jump-point expansions.
    #[must_use]
    pub const fn new(max_expansions: usize) -> Self {
        Self { max_expansions }
    }
}

impl Default for JumpPointSearch {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXPANSIONS)
    }
}

impl PathSearchStrategy for JumpPointSearch {
    fn name(&self) -> &'static str {
        "jump_point"
    }

    fn search(&self, grid: &OccupancyGrid, start: GridCell, goal: GridCell) -> SearchOutcome {
        // Nodes live only for this query so concurrent agents never see each other's state.
        let mut arena = SearchArena::sparse(grid);
        let Some(start_index) = arena.index_for(start) else {
            return SearchOutcome::unreachable(0);
        };

        let mut open = OpenList::default();
        {
            let node = arena.node_mut(start_index);
            node.cost = 0.0;
            node.estimate = start.octile_distance(goal);
            node.opened = true;
            open.push(start_index, node.estimate, 0.0);
        }

        let mut expanded = 0;
        let mut closest = start_index;

        while let Some((index, queued_cost)) = open.pop() {
            let (cell, cost, estimate, parent) = {
                let node = arena.node(index);
                if node.closed || queued_cost > node.cost {
                    continue;
                }
                (
                    node.cell,
                    node.cost,
                    node.estimate,
                    node.parent.map(|parent| arena.node(parent).cell),
                )
            };
            arena.node_mut(index).closed = true;
            expanded += 1;

            if cell == goal {
                trace!(expanded, "jump point search reached goal");
                return SearchOutcome {
                    cells: expand_jumps(&arena.path_to(index)),
                    status: SearchStatus::Complete,
                    expanded,
                };
            }

            if estimate < arena.node(closest).estimate {
                closest = index;
            }

            if expanded >= self.max_expansions {
                debug!(expanded, "jump point search hit its expansion budget");
                return SearchOutcome {
                    cells: expand_jumps(&arena.path_to(closest)),
                    status: SearchStatus::Truncated,
                    expanded,
                };
            }

            for direction in pruned_directions(grid, cell, parent) {
                let Some(jump_point) = jump(grid, cell, direction, goal) else {
                    continue;
                };
                let Some(jump_index) = arena.index_for(jump_point) else {
                    continue;
                };
                let node = arena.node_mut(jump_index);
                if node.closed {
                    continue;
                }
                let tentative = cost + cell.octile_distance(jump_point);
                if tentative < node.cost {
                    if !node.opened {
                        node.estimate = jump_point.octile_distance(goal);
                        node.opened = true;
                    }
                    node.cost = tentative;
                    node.parent = Some(index);
                    open.push(jump_index, tentative + node.estimate, tentative);
                }
            }
        }

        debug!(expanded, "jump point search exhausted without reaching goal");
        SearchOutcome::unreachable(expanded)
    }
}

/// Fixed-capacity buffer of step directions.
#[derive(Clone, Debug, Default)]
struct Directions {
    buffer: [(i64, i64); 8],
    len: usize,
    cursor: usize,
}

impl Directions {
    fn push(&mut self, direction: (i64, i64)) {
        if self.len < self.buffer.len() {
            self.buffer[self.len] = direction;
            self.len += 1;
        }
    }
}

impl Iterator for Directions {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        Some(value)
    }
}

/// Directions worth exploring from `cell` given the cell it was reached from.
fn pruned_directions(grid: &OccupancyGrid, cell: GridCell, parent: Option<GridCell>) -> Directions {
    let x = i64::from(cell.column());
    let y = i64::from(cell.row());
    let walkable = |dx: i64, dy: i64| grid.is_traversable_at(x + dx, y + dy);
    let mut directions = Directions::default();

    let Some(parent) = parent else {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) == (0, 0) || !walkable(dx, dy) {
                    continue;
                }
                if dx != 0 && dy != 0 && !(walkable(dx, 0) && walkable(0, dy)) {
                    continue;
                }
                directions.push((dx, dy));
            }
        }
        return directions;
    };

    let dx = (x - i64::from(parent.column())).signum();
    let dy = (y - i64::from(parent.row())).signum();

    if dx != 0 && dy != 0 {
        let vertical = walkable(0, dy);
        let horizontal = walkable(dx, 0);
        if vertical {
            directions.push((0, dy));
        }
        if horizontal {
            directions.push((dx, 0));
        }
        if vertical && horizontal && walkable(dx, dy) {
            directions.push((dx, dy));
        }
    } else if dx != 0 {
        let ahead = walkable(dx, 0);
        let up = walkable(0, 1);
        let down = walkable(0, -1);
        if ahead {
            directions.push((dx, 0));
            if up && walkable(dx, 1) {
                directions.push((dx, 1));
            }
            if down && walkable(dx, -1) {
                directions.push((dx, -1));
            }
        }
        if up {
            directions.push((0, 1));
        }
        if down {
            directions.push((0, -1));
        }
    } else if dy != 0 {
        let ahead = walkable(0, dy);
        let right = walkable(1, 0);
        let left = walkable(-1, 0);
        if ahead {
            directions.push((0, dy));
            if right && walkable(1, dy) {
                directions.push((1, dy));
            }
            if left && walkable(-1, dy) {
                directions.push((-1, dy));
            }
        }
        if right {
            directions.push((1, 0));
        }
        if left {
            directions.push((-1, 0));
        }
    }

    directions
}

/// Walks from `from` along `direction` until the goal, a forced neighbour, or a wall.
fn jump(
    grid: &OccupancyGrid,
    from: GridCell,
    direction: (i64, i64),
    goal: GridCell,
) -> Option<GridCell> {
    let (dx, dy) = direction;
    let walkable = |x: i64, y: i64| grid.is_traversable_at(x, y);
    let goal_x = i64::from(goal.column());
    let goal_y = i64::from(goal.row());
    let mut x = i64::from(from.column()) + dx;
    let mut y = i64::from(from.row()) + dy;

    loop {
        if !walkable(x, y) {
            return None;
        }
        if x == goal_x && y == goal_y {
            return to_cell(x, y);
        }

        if dx != 0 && dy != 0 {
            let here = to_cell(x, y)?;
            if jump(grid, here, (dx, 0), goal).is_some()
                || jump(grid, here, (0, dy), goal).is_some()
            {
                return Some(here);
            }
        } else if dx != 0 {
            if (walkable(x, y - 1) && !walkable(x - dx, y - 1))
                || (walkable(x, y + 1) && !walkable(x - dx, y + 1))
            {
                return to_cell(x, y);
            }
        } else if (walkable(x - 1, y) && !walkable(x - 1, y - dy))
            || (walkable(x + 1, y) && !walkable(x + 1, y - dy))
        {
            return to_cell(x, y);
        }

        if walkable(x + dx, y) && walkable(x, y + dy) {
            x += dx;
            y += dy;
        } else {
            return None;
        }
    }
}

fn to_cell(x: i64, y: i64) -> Option<GridCell> {
    Some(GridCell::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?))
}

/// Fills in the straight or diagonal runs between consecutive jump points.
fn expand_jumps(jump_points: &[GridCell]) -> Vec<GridCell> {
    let mut cells = Vec::with_capacity(jump_points.len());
    let Some(&first) = jump_points.first() else {
        return cells;
    };
    cells.push(first);

    for pair in jump_points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let dx = (i64::from(to.column()) - i64::from(from.column())).signum();
        let dy = (i64::from(to.row()) - i64::from(from.row())).signum();
        let mut cursor = from;
        while cursor != to {
            let Some(next) = cursor.offset(dx, dy) else {
                break;
            };
            cells.push(next);
            cursor = next;
        }
    }

    cells
}
