use crate::grid::{Cell, GridMap, GridMetrics};
use glam::DVec2;
use std::collections::HashSet;

/// One step of a digital line walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStep {
    /// Cell entered by this step
    pub cell: Cell,
    /// Set when the step moved diagonally; holds the two cells whose shared corner was crossed
    pub corner: Option<(Cell, Cell)>,
}

/// Integer DDA walk between two cells.
/// Tracks the Bresenham error term so that both axes advance in lockstep
/// with the ideal line, and yields every cell from start to end inclusive.
#[derive(Debug, Clone, Copy)]
pub struct LineWalk {
    current: Cell,
    end: Cell,
    /// Absolute column delta (always >= 0)
    diff_x: i64,
    /// Absolute row delta (always >= 0)
    diff_y: i64,
    step_x: i32,
    step_y: i32,
    /// Accumulated error, starts at diff_x - diff_y. Wide so saturated cells cannot overflow it
    error: i64,
    started: bool,
    finished: bool,
}

impl LineWalk {
    pub fn new(start: Cell, end: Cell) -> Self {
        let diff_x = (i64::from(end.col) - i64::from(start.col)).abs();
        let diff_y = (i64::from(end.row) - i64::from(start.row)).abs();
        LineWalk {
            current: start,
            end,
            diff_x,
            diff_y,
            step_x: if start.col < end.col { 1 } else { -1 },
            step_y: if start.row < end.row { 1 } else { -1 },
            error: diff_x - diff_y,
            started: false,
            finished: false,
        }
    }
}

impl Iterator for LineWalk {
    type Item = LineStep;

    fn next(&mut self) -> Option<LineStep> {
        if self.finished {
            return None;
        }
        if !self.started {
            self.started = true;
            if self.current == self.end {
                self.finished = true;
            }
            return Some(LineStep {
                cell: self.current,
                corner: None,
            });
        }

        let from = self.current;
        let e2 = 2 * self.error;
        let mut moved_x = false;
        let mut moved_y = false;
        if e2 > -self.diff_y {
            self.error -= self.diff_y;
            self.current.col += self.step_x;
            moved_x = true;
        }
        if e2 < self.diff_x {
            self.error += self.diff_x;
            self.current.row += self.step_y;
            moved_y = true;
        }
        if self.current == self.end {
            self.finished = true;
        }

        let corner = if moved_x && moved_y {
            Some((
                Cell::new(self.current.col, from.row),
                Cell::new(from.col, self.current.row),
            ))
        } else {
            None
        };
        Some(LineStep {
            cell: self.current,
            corner,
        })
    }
}

/// Pull a cell into the ring one cell outside the map.
/// Every cell out there is unwalkable, so walks that leave the map still end on a wall.
fn clip_to_margin(cell: Cell, metrics: &GridMetrics) -> Cell {
    Cell::new(cell.col.clamp(-1, metrics.cols), cell.row.clamp(-1, metrics.rows))
}

/// Cells crossed by the segment between two world points, in walk order.
/// Endpoints far outside the map are clipped to one cell past its edge.
pub fn line_cells(from: DVec2, to: DVec2, metrics: &GridMetrics) -> Vec<Cell> {
    let start = clip_to_margin(metrics.world_to_cell(from.x, from.y), metrics);
    let end = clip_to_margin(metrics.world_to_cell(to.x, to.y), metrics);
    LineWalk::new(start, end).map(|step| step.cell).collect()
}

/// Check that a straight segment between two ground points crosses only walkable cells.
///
/// Every cell on the digital line is sampled once at its centre. A diagonal step
/// is denied when either of the two cells sharing the crossed corner is blocked,
/// so lines never squeeze between diagonally touching walls.
/// Without a map everything is considered clear.
pub fn has_line_of_sight(from: DVec2, to: DVec2, map: Option<&dyn GridMap>) -> bool {
    let Some(map) = map else {
        return true;
    };
    let metrics = map.metrics();
    let start = clip_to_margin(metrics.world_to_cell(from.x, from.y), &metrics);
    let end = clip_to_margin(metrics.world_to_cell(to.x, to.y), &metrics);

    let mut visited: HashSet<Cell> = HashSet::new();
    let mut walkable = |cell: Cell| -> bool {
        if !visited.insert(cell) {
            return true; // already checked and found clear
        }
        map.is_cell_walkable(cell)
    };

    for step in LineWalk::new(start, end) {
        if let Some((a, b)) = step.corner {
            if !walkable(a) || !walkable(b) {
                return false;
            }
        }
        if !walkable(step.cell) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn test_walk_horizontal() {
        let cells: Vec<Cell> = LineWalk::new(Cell::new(0, 2), Cell::new(3, 2))
            .map(|s| s.cell)
            .collect();
        assert_eq!(
            cells,
            vec![Cell::new(0, 2), Cell::new(1, 2), Cell::new(2, 2), Cell::new(3, 2)]
        );
    }

    #[test]
    fn test_walk_single_cell() {
        let steps: Vec<LineStep> = LineWalk::new(Cell::new(4, 4), Cell::new(4, 4)).collect();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].corner, None);
    }

    #[test]
    fn test_walk_diagonal_reports_corners() {
        let steps: Vec<LineStep> = LineWalk::new(Cell::new(0, 0), Cell::new(2, 2)).collect();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].cell, Cell::new(2, 2));
        assert_eq!(steps[1].corner, Some((Cell::new(1, 0), Cell::new(0, 1))));
    }

    #[test]
    fn test_walk_reverse_direction() {
        let cells: Vec<Cell> = LineWalk::new(Cell::new(5, 1), Cell::new(1, 3))
            .map(|s| s.cell)
            .collect();
        assert_eq!(cells.first(), Some(&Cell::new(5, 1)));
        assert_eq!(cells.last(), Some(&Cell::new(1, 3)));
        // Every step moves to a touching cell
        for pair in cells.windows(2) {
            assert!((pair[0].col - pair[1].col).abs() <= 1);
            assert!((pair[0].row - pair[1].row).abs() <= 1);
        }
    }

    #[test]
    fn test_no_map_is_clear() {
        assert!(has_line_of_sight(DVec2::ZERO, DVec2::new(100.0, -50.0), None));
    }

    #[test]
    fn test_blocked_cell_on_line() {
        let grid = Grid::from_layout(&["....", "..#.", "...."], 1.0);
        let map: &dyn GridMap = &grid;
        assert!(!has_line_of_sight(DVec2::new(0.5, 1.5), DVec2::new(3.5, 1.5), Some(map)));
        assert!(has_line_of_sight(DVec2::new(0.5, 0.5), DVec2::new(3.5, 0.5), Some(map)));
        // Same cell is always clear when that cell is walkable
        assert!(has_line_of_sight(DVec2::new(0.2, 0.2), DVec2::new(0.8, 0.7), Some(map)));
    }

    #[test]
    fn test_corner_squeeze_is_denied() {
        let grid = Grid::from_layout(&[".#", "#."], 1.0);
        let map: &dyn GridMap = &grid;
        assert!(!has_line_of_sight(DVec2::new(0.5, 0.5), DVec2::new(1.5, 1.5), Some(map)));

        // A single blocked corner cell also denies the diagonal
        let grid = Grid::from_layout(&[".#", ".."], 1.0);
        let map: &dyn GridMap = &grid;
        assert!(!has_line_of_sight(DVec2::new(0.5, 0.5), DVec2::new(1.5, 1.5), Some(map)));
    }

    #[test]
    fn test_leaving_the_map_is_blocked() {
        let grid = Grid::new(3, 3, 1.0, 1.0);
        let map: &dyn GridMap = &grid;
        assert!(!has_line_of_sight(DVec2::new(1.5, 1.5), DVec2::new(4.5, 1.5), Some(map)));
    }

    #[test]
    fn test_far_off_endpoints() {
        let grid = Grid::new(4, 4, 1.0, 1.0);
        let map: &dyn GridMap = &grid;
        let inside = DVec2::new(0.5, 0.5);
        for far in [
            DVec2::new(2e9, 0.5),
            DVec2::new(-3e9, 0.5),
            DVec2::new(0.5, 1e12),
            DVec2::new(-1e15, -1e15),
        ] {
            assert!(!has_line_of_sight(inside, far, Some(map)), "{:?}", far);
            assert!(!has_line_of_sight(far, inside, Some(map)), "{:?}", far);
        }

        let cells = line_cells(inside, DVec2::new(2e9, 0.5), &grid.metrics());
        assert_eq!(cells.last(), Some(&Cell::new(4, 0)));
        assert_eq!(cells.len(), 5);

        // Saturated cells do not overflow the walk itself
        let steps: Vec<Cell> = LineWalk::new(Cell::new(i32::MIN, 0), Cell::new(i32::MAX, 1))
            .take(3)
            .map(|s| s.cell)
            .collect();
        assert_eq!(steps[0], Cell::new(i32::MIN, 0));
        assert_eq!(steps.len(), 3);
    }
}
