use crate::grid::{Cell, GridMap, GridMetrics, NEIGHBOR_STEPS};
use crate::obstacle::has_line_of_sight;
use glam::DVec2;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::SQRT_2;

/// A world-space waypoint; Y is height and stays at ground level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PathNode {
    pub fn new(x: f64, z: f64) -> Self {
        PathNode { x, y: 0.0, z }
    }

    pub fn ground(&self) -> DVec2 {
        DVec2::new(self.x, self.z)
    }
}

impl From<DVec2> for PathNode {
    fn from(p: DVec2) -> Self {
        PathNode::new(p.x, p.y)
    }
}

/// A node in the open set of one search
#[derive(Debug, Clone, Copy)]
struct AStarNode {
    cell: Cell,
    index: usize,
    g: f64,
    h: f64,
    f: f64,
}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AStarNode {}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .f
            .total_cmp(&self.f)
            // Prefer nodes closer to the goal, then lower cell index, for deterministic ordering
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Octile distance in cell units: exact cost on an empty 8-connected grid
fn heuristic(a: Cell, b: Cell) -> f64 {
    let dx = (a.col - b.col).abs() as f64;
    let dz = (a.row - b.row).abs() as f64;
    dx.max(dz) + (SQRT_2 - 1.0) * dx.min(dz)
}

/// Cost of one neighbour step, or `None` if the step is not allowed.
/// Diagonal steps may not cut the corner of a blocked cell.
pub(crate) fn step_cost(
    walkable: &[bool],
    metrics: &GridMetrics,
    from: Cell,
    d_col: i32,
    d_row: i32,
) -> Option<f64> {
    let to = from.offset(d_col, d_row);
    let to_index = metrics.index(to)?;
    if !walkable[to_index] {
        return None;
    }
    if d_col != 0 && d_row != 0 {
        let side_a = metrics.index(from.offset(d_col, 0))?;
        let side_b = metrics.index(from.offset(0, d_row))?;
        if !walkable[side_a] || !walkable[side_b] {
            return None;
        }
        Some(SQRT_2)
    } else {
        Some(1.0)
    }
}

/// Sample walkability of every cell centre once
pub(crate) fn walkable_cells(map: &dyn GridMap, metrics: &GridMetrics) -> Vec<bool> {
    (0..metrics.cell_count())
        .map(|i| map.is_cell_walkable(metrics.cell_at(i)))
        .collect()
}

/// Find a path of cell centres from a world position to a world target using A*.
///
/// Returns `None` if either end lies outside the map, the goal cell is blocked,
/// or no route exists. Returns an empty path when start and goal share a cell.
pub fn find_path(map: &dyn GridMap, from: DVec2, target: DVec2) -> Option<Vec<PathNode>> {
    let metrics = map.metrics();
    if metrics.cols <= 0 || metrics.rows <= 0 {
        warn!("find_path: invalid grid {}x{}", metrics.cols, metrics.rows);
        return None;
    }

    let start = metrics.world_to_cell(from.x, from.y);
    let goal = metrics.world_to_cell(target.x, target.y);
    let (Some(start_index), Some(goal_index)) = (metrics.index(start), metrics.index(goal)) else {
        debug!(
            "find_path: start {:?} or goal {:?} outside {}x{} grid",
            start, goal, metrics.cols, metrics.rows
        );
        return None;
    };

    if start == goal {
        return Some(Vec::new());
    }

    let walkable = walkable_cells(map, &metrics);
    if !walkable[goal_index] {
        debug!("find_path: goal {:?} is not walkable", goal);
        return None;
    }

    let cell_count = metrics.cell_count();
    let mut best_g = vec![f64::INFINITY; cell_count];
    let mut parent: Vec<Option<usize>> = vec![None; cell_count];
    let mut closed = vec![false; cell_count];
    let mut open: BinaryHeap<AStarNode> = BinaryHeap::new();

    let h = heuristic(start, goal);
    best_g[start_index] = 0.0;
    open.push(AStarNode {
        cell: start,
        index: start_index,
        g: 0.0,
        h,
        f: h,
    });

    let mut expanded = 0usize;
    while let Some(current) = open.pop() {
        if closed[current.index] || current.g > best_g[current.index] {
            continue;
        }
        expanded += 1;

        if current.index == goal_index {
            trace!(
                "find_path: {:?} -> {:?} cost {:.3} after {} expansions",
                start,
                goal,
                current.g,
                expanded
            );
            return Some(reconstruct_path(&parent, goal_index, &metrics));
        }
        closed[current.index] = true;

        for &(d_col, d_row) in NEIGHBOR_STEPS.iter() {
            let Some(cost) = step_cost(&walkable, &metrics, current.cell, d_col, d_row) else {
                continue;
            };
            let next = current.cell.offset(d_col, d_row);
            let Some(next_index) = metrics.index(next) else {
                continue;
            };
            if closed[next_index] {
                continue;
            }

            let g = current.g + cost;
            if g < best_g[next_index] {
                best_g[next_index] = g;
                parent[next_index] = Some(current.index);
                let h = heuristic(next, goal);
                open.push(AStarNode {
                    cell: next,
                    index: next_index,
                    g,
                    h,
                    f: g + h,
                });
            }
        }
    }

    debug!(
        "find_path: no route {:?} -> {:?} after {} expansions",
        start, goal, expanded
    );
    None
}

/// Walk parent links back from the goal, emitting cell centres oldest first
fn reconstruct_path(parent: &[Option<usize>], goal_index: usize, metrics: &GridMetrics) -> Vec<PathNode> {
    let mut path = Vec::new();
    let mut cursor = Some(goal_index);
    while let Some(index) = cursor {
        path.push(PathNode::from(metrics.cell_center(metrics.cell_at(index))));
        cursor = parent[index];
    }
    path.reverse();
    path
}

/// Remove waypoints that can be skipped in a straight line ("string pulling").
///
/// Keeps the first node, then repeatedly jumps to the farthest node that is
/// directly reachable from the current anchor.
pub fn smooth_path(path: &[PathNode], map: Option<&dyn GridMap>) -> Vec<PathNode> {
    if path.len() <= 2 || map.is_none() {
        return path.to_vec();
    }

    let mut smoothed = vec![path[0]];
    let mut current = 0;
    while current < path.len() - 1 {
        let mut farthest = current + 1;
        for i in (current + 2)..path.len() {
            if has_line_of_sight(path[current].ground(), path[i].ground(), map) {
                farthest = i;
            }
        }
        smoothed.push(path[farthest]);
        current = farthest;
    }
    smoothed
}

/// Total length of a path in world units
pub fn path_cost(path: &[PathNode]) -> f64 {
    path.windows(2)
        .map(|pair| pair[0].ground().distance(pair[1].ground()))
        .sum()
}

/// Format path for display
pub fn format_path(path: &[PathNode]) -> String {
    if path.is_empty() {
        return "No path".to_string();
    }

    path.iter()
        .map(|p| format!("({:.2},{:.2})", p.x, p.z))
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn test_heuristic_is_octile() {
        assert_eq!(heuristic(Cell::new(0, 0), Cell::new(3, 0)), 3.0);
        let diag = heuristic(Cell::new(0, 0), Cell::new(2, 2));
        assert!((diag - 2.0 * SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_same_cell_is_empty_path() {
        let grid = Grid::new(5, 5, 1.0, 1.0);
        let path = find_path(&grid, DVec2::new(2.2, 2.2), DVec2::new(2.8, 2.9));
        assert_eq!(path, Some(Vec::new()));
    }

    #[test]
    fn test_out_of_bounds_is_none() {
        let grid = Grid::new(5, 5, 1.0, 1.0);
        assert!(find_path(&grid, DVec2::new(2.5, 2.5), DVec2::new(7.5, 2.5)).is_none());
        assert!(find_path(&grid, DVec2::new(-0.5, 2.5), DVec2::new(1.5, 2.5)).is_none());
    }

    #[test]
    fn test_path_ends_at_cell_centres() {
        let grid = Grid::new(5, 5, 1.0, 1.0);
        let path = find_path(&grid, DVec2::new(0.1, 0.1), DVec2::new(3.9, 0.2)).unwrap_or_default();
        assert_eq!(path.first().map(|p| p.ground()), Some(DVec2::new(0.5, 0.5)));
        assert_eq!(path.last().map(|p| p.ground()), Some(DVec2::new(3.5, 0.5)));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn test_diagonal_does_not_cut_corners() {
        let grid = Grid::from_layout(&[".#", ".."], 1.0);
        let path = find_path(&grid, DVec2::new(0.5, 0.5), DVec2::new(1.5, 1.5)).unwrap_or_default();
        // Has to go around through (0,1)
        assert_eq!(path.len(), 3);
        assert_eq!(path[1].ground(), DVec2::new(0.5, 1.5));
    }

    #[test]
    fn test_smooth_keeps_endpoints() {
        let path: Vec<PathNode> = (0..6).map(|i| PathNode::new(i as f64 + 0.5, 0.5)).collect();
        let grid = Grid::new(2, 6, 1.0, 1.0);
        let smoothed = smooth_path(&path, Some(&grid));
        assert_eq!(smoothed.len(), 2);
        assert_eq!(smoothed[0], path[0]);
        assert_eq!(smoothed[1], path[5]);

        // Without a map the path is left alone
        assert_eq!(smooth_path(&path, None).len(), 6);
    }

    #[test]
    fn test_format_path() {
        assert_eq!(format_path(&[]), "No path");
        let text = format_path(&[PathNode::new(0.5, 1.0), PathNode::new(2.0, 3.25)]);
        assert_eq!(text, "(0.50,1.00) -> (2.00,3.25)");
    }
}
