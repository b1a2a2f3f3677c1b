//! Per-query node storage and the open list shared by every search strategy.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
    f64::consts::SQRT_2,
};

use terminal_crowd_world::{GridCell, OccupancyGrid, NEIGHBOR_OFFSETS};

/// Scores closer than this are treated as ties and resolved by discovery order.
const SCORE_RESOLUTION: f64 = 1e-7;

/// Bookkeeping for a single grid cell during one query.
#[derive(Clone, Debug)]
pub(crate) struct SearchNode {
    pub(crate) cell: GridCell,
    pub(crate) cost: f64,
    pub(crate) estimate: f64,
    pub(crate) parent: Option<usize>,
    pub(crate) opened: bool,
    pub(crate) closed: bool,
}

impl SearchNode {
    fn unvisited(cell: GridCell) -> Self {
        Self {
            cell,
            cost: f64::INFINITY,
            estimate: 0.0,
            parent: None,
            opened: false,
            closed: false,
        }
    }
}

#[derive(Debug)]
enum Lookup {
    Sparse(HashMap<GridCell, usize>),
    Dense,
}

/// Node arena created for a single query and dropped with it.
///
/// Sparse arenas allocate nodes lazily as cells are discovered; dense arenas
/// allocate one node per grid cell up front and index them by coordinate.
#[derive(Debug)]
pub(crate) struct SearchArena<'g> {
    grid: &'g OccupancyGrid,
    nodes: Vec<SearchNode>,
    lookup: Lookup,
}

impl<'g> SearchArena<'g> {
    pub(crate) fn sparse(grid: &'g OccupancyGrid) -> Self {
        Self {
            grid,
            nodes: Vec::new(),
            lookup: Lookup::Sparse(HashMap::new()),
        }
    }

    pub(crate) fn dense(grid: &'g OccupancyGrid) -> Self {
        let nodes = (0..grid.cell_count())
            .filter_map(|index| grid.cell_at_index(index))
            .map(SearchNode::unvisited)
            .collect();
        Self {
            grid,
            nodes,
            lookup: Lookup::Dense,
        }
    }

    /// Index of the node for `cell`, allocating it on first sight.
    pub(crate) fn index_for(&mut self, cell: GridCell) -> Option<usize> {
        match &mut self.lookup {
            Lookup::Dense => self.grid.index_of(cell),
            Lookup::Sparse(indices) => {
                if !self.grid.contains(cell) {
                    return None;
                }
                let next = self.nodes.len();
                let index = *indices.entry(cell).or_insert(next);
                if index == next {
                    self.nodes.push(SearchNode::unvisited(cell));
                }
                Some(index)
            }
        }
    }

    pub(crate) fn grid(&self) -> &'g OccupancyGrid {
        self.grid
    }

    pub(crate) fn node(&self, index: usize) -> &SearchNode {
        &self.nodes[index]
    }

    pub(crate) fn node_mut(&mut self, index: usize) -> &mut SearchNode {
        &mut self.nodes[index]
    }

    /// Cells from the query's start to `index`, following parent links.
    pub(crate) fn path_to(&self, index: usize) -> Vec<GridCell> {
        let mut cells = Vec::new();
        let mut cursor = Some(index);
        while let Some(current) = cursor {
            let node = &self.nodes[current];
            cells.push(node.cell);
            cursor = node.parent;
        }
        cells.reverse();
        cells
    }
}

#[derive(Debug)]
struct OpenEntry {
    score: i64,
    order: u64,
    node: usize,
    cost: f64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.order == other.order
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the lowest score, then the
        // earliest discovery, is popped first.
        (other.score, other.order).cmp(&(self.score, self.order))
    }
}

/// Open set ordered by total score with discovery-order tie breaking.
#[derive(Debug, Default)]
pub(crate) struct OpenList {
    heap: BinaryHeap<OpenEntry>,
    discovered: u64,
}

impl OpenList {
    pub(crate) fn push(&mut self, node: usize, score: f64, cost: f64) {
        let order = self.discovered;
        self.discovered += 1;
        self.heap.push(OpenEntry {
            score: quantize(score),
            order,
            node,
            cost,
        });
    }

    /// Pops the best entry, returning the node and the cost it was queued with.
    pub(crate) fn pop(&mut self) -> Option<(usize, f64)> {
        self.heap.pop().map(|entry| (entry.node, entry.cost))
    }
}

fn quantize(score: f64) -> i64 {
    (score / SCORE_RESOLUTION).round() as i64
}

/// Walkable 8-connected successors of `cell` with their step costs.
///
/// Diagonal steps are only allowed when both adjacent straight cells are
/// walkable, so paths never clip an obstacle's corner.
pub(crate) fn successors(
    grid: &OccupancyGrid,
    cell: GridCell,
) -> impl Iterator<Item = (GridCell, f64)> + '_ {
    let column = i64::from(cell.column());
    let row = i64::from(cell.row());
    NEIGHBOR_OFFSETS.into_iter().filter_map(move |(dx, dy)| {
        if !grid.is_traversable_at(column + dx, row + dy) {
            return None;
        }
        let diagonal = dx != 0 && dy != 0;
        if diagonal
            && !(grid.is_traversable_at(column + dx, row)
                && grid.is_traversable_at(column, row + dy))
        {
            return None;
        }
        let step = if diagonal { SQRT_2 } else { 1.0 };
        cell.offset(dx, dy).map(|neighbor| (neighbor, step))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_list_breaks_ties_by_discovery_order() {
        let mut open = OpenList::default();
        open.push(7, 4.0, 0.0);
        open.push(3, 4.0 + 1e-9, 0.0);
        open.push(9, 2.0, 0.0);

        assert_eq!(open.pop().map(|(node, _)| node), Some(9));
        assert_eq!(open.pop().map(|(node, _)| node), Some(7));
        assert_eq!(open.pop().map(|(node, _)| node), Some(3));
        assert!(open.pop().is_none());
    }

    #[test]
    fn successors_never_cut_corners() {
        let blocked = GridCell::new(1, 0);
        let grid = OccupancyGrid::from_fn(3, 3, 1.0, |cell| cell == blocked).expect("grid");

        let cells: Vec<_> = successors(&grid, GridCell::new(0, 0))
            .map(|(cell, _)| cell)
            .collect();

        assert_eq!(cells, vec![GridCell::new(0, 1)]);
    }

    #[test]
    fn sparse_arena_reuses_nodes_per_cell() {
        let grid = OccupancyGrid::from_fn(4, 4, 1.0, |_| false).expect("grid");
        let mut arena = SearchArena::sparse(&grid);

        let first = arena.index_for(GridCell::new(2, 2));
        let again = arena.index_for(GridCell::new(2, 2));
        let other = arena.index_for(GridCell::new(3, 2));

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert!(arena.index_for(GridCell::new(9, 9)).is_none());
    }

    #[test]
    fn path_to_follows_parents_from_start() {
        let grid = OccupancyGrid::from_fn(3, 1, 1.0, |_| false).expect("grid");
        let mut arena = SearchArena::dense(&grid);
        let a = arena.index_for(GridCell::new(0, 0)).expect("a");
        let b = arena.index_for(GridCell::new(1, 0)).expect("b");
        let c = arena.index_for(GridCell::new(2, 0)).expect("c");
        arena.node_mut(b).parent = Some(a);
        arena.node_mut(c).parent = Some(b);

        assert_eq!(
            arena.path_to(c),
            vec![GridCell::new(0, 0), GridCell::new(1, 0), GridCell::new(2, 0)]
        );
    }
}
