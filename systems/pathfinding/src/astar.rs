//! Best-first grid search: A* with an octile heuristic, and its zero-heuristic
//! Dijkstra sibling.

use terminal_crowd_world::{GridCell, OccupancyGrid};
use tracing::{debug, trace};

use crate::{
    arena::{successors, OpenList, SearchArena},
    PathSearchStrategy, SearchOutcome, SearchStatus, DEFAULT_MAX_EXPANSIONS,
};

/// 8-connected A* with octile-distance heuristic and a soft expansion budget.
#[derive(Clone, Copy, Debug)]
pub struct AStar {
    max_expansions: usize,
}

impl AStar {
    /// Creates an A* strategy that gives up after `max_expansions` node expansions.
    #[must_use]
    pub const fn new(max_expansions: usize) -> Self {
        Self { max_expansions }
    }

    /// Node-expansion budget after which the best partial path is returned.
    #[must_use]
    pub const fn max_expansions(&self) -> usize {
        self.max_expansions
    }
}

impl Default for AStar {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXPANSIONS)
    }
}

impl PathSearchStrategy for AStar {
    fn name(&self) -> &'static str {
        "a_star"
    }

    fn search(&self, grid: &OccupancyGrid, start: GridCell, goal: GridCell) -> SearchOutcome {
        let mut arena = SearchArena::sparse(grid);
        best_first(
            &mut arena,
            start,
            goal,
            |cell| cell.octile_distance(goal),
            Some(self.max_expansions),
        )
    }
}

/// Uniform-cost search over the full grid. Correctness reference for the other strategies.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dijkstra;

impl PathSearchStrategy for Dijkstra {
    fn name(&self) -> &'static str {
        "dijkstra"
    }

    fn search(&self, grid: &OccupancyGrid, start: GridCell, goal: GridCell) -> SearchOutcome {
        let mut arena = SearchArena::dense(grid);
        best_first(&mut arena, start, goal, |_| 0.0, None)
    }
}

fn best_first<H>(
    arena: &mut SearchArena<'_>,
    start: GridCell,
    goal: GridCell,
    heuristic: H,
    max_expansions: Option<usize>,
) -> SearchOutcome
where
    H: Fn(GridCell) -> f64,
{
    let Some(start_index) = arena.index_for(start) else {
        return SearchOutcome::unreachable(0);
    };
    let grid = arena.grid();

    let mut open = OpenList::default();
    {
        let node = arena.node_mut(start_index);
        node.cost = 0.0;
        node.estimate = heuristic(start);
        node.opened = true;
        open.push(start_index, node.estimate, 0.0);
    }

    let mut expanded = 0;
    let mut closest = start_index;

    while let Some((index, queued_cost)) = open.pop() {
        let (cell, cost, estimate) = {
            let node = arena.node(index);
            if node.closed || queued_cost > node.cost {
                continue;
            }
            (node.cell, node.cost, node.estimate)
        };
        arena.node_mut(index).closed = true;
        expanded += 1;

        if cell == goal {
            trace!(expanded, "grid search reached goal");
            return SearchOutcome {
                cells: arena.path_to(index),
                status: SearchStatus::Complete,
                expanded,
            };
        }

        let best = arena.node(closest);
        if estimate < best.estimate || (estimate == best.estimate && cost < best.cost) {
            closest = index;
        }

        if max_expansions.is_some_and(|limit| expanded >= limit) {
            debug!(expanded, "grid search hit its expansion budget");
            return SearchOutcome {
                cells: arena.path_to(closest),
                status: SearchStatus::Truncated,
                expanded,
            };
        }

        for (neighbor, step) in successors(grid, cell) {
            let Some(neighbor_index) = arena.index_for(neighbor) else {
                continue;
            };
            let node = arena.node_mut(neighbor_index);
            if node.closed {
                continue;
            }
            let tentative = cost + step;
            if tentative < node.cost {
                if !node.opened {
                    node.estimate = heuristic(neighbor);
                    node.opened = true;
                }
                node.cost = tentative;
                node.parent = Some(index);
                open.push(neighbor_index, tentative + node.estimate, tentative);
            }
        }
    }

    debug!(expanded, "grid search exhausted without reaching goal");
    SearchOutcome::unreachable(expanded)
}
