use glam::DVec2;

/// Integer grid cell coordinate (column along X, row along Z)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub col: i32,
    pub row: i32,
}

impl Cell {
    pub fn new(col: i32, row: i32) -> Self {
        Cell { col, row }
    }

    /// Offset by a neighbour step
    pub fn offset(&self, d_col: i32, d_row: i32) -> Self {
        Cell::new(self.col + d_col, self.row + d_row)
    }
}

/// The eight neighbour steps, orthogonal first.
/// Pathfinding and flow fields both enumerate neighbours in this order,
/// which keeps tie-breaking identical between them.
pub const NEIGHBOR_STEPS: [(i32, i32); 8] = [
    (0, 1),
    (1, 0),
    (0, -1),
    (-1, 0),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Grid metrics used to convert between world and cell coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMetrics {
    pub cell_width: f64,
    pub cell_height: f64,
    pub cols: i32,
    pub rows: i32,
    /// World position of the lower corner of cell (0, 0)
    pub origin: DVec2,
}

impl GridMetrics {
    pub fn new(cols: i32, rows: i32, cell_width: f64, cell_height: f64) -> Self {
        GridMetrics {
            cell_width,
            cell_height,
            cols,
            rows,
            origin: DVec2::ZERO,
        }
    }

    pub fn with_origin(mut self, origin: DVec2) -> Self {
        self.origin = origin;
        self
    }

    /// World width covered by the grid
    pub fn width(&self) -> f64 {
        self.cols as f64 * self.cell_width
    }

    /// World depth covered by the grid
    pub fn height(&self) -> f64 {
        self.rows as f64 * self.cell_height
    }

    pub fn min_bound(&self) -> DVec2 {
        self.origin
    }

    pub fn max_bound(&self) -> DVec2 {
        self.origin + DVec2::new(self.width(), self.height())
    }

    /// Cell containing a world point. May lie outside the grid.
    pub fn world_to_cell(&self, x: f64, z: f64) -> Cell {
        Cell::new(
            ((x - self.origin.x) / self.cell_width).floor() as i32,
            ((z - self.origin.y) / self.cell_height).floor() as i32,
        )
    }

    /// World position of a cell's centre
    pub fn cell_center(&self, cell: Cell) -> DVec2 {
        DVec2::new(
            self.origin.x + (cell.col as f64 + 0.5) * self.cell_width,
            self.origin.y + (cell.row as f64 + 0.5) * self.cell_height,
        )
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.col >= 0 && cell.col < self.cols && cell.row >= 0 && cell.row < self.rows
    }

    /// Row-major index, `None` for cells outside the grid
    pub fn index(&self, cell: Cell) -> Option<usize> {
        if self.contains(cell) {
            Some((cell.col + cell.row * self.cols) as usize)
        } else {
            None
        }
    }

    pub fn cell_at(&self, index: usize) -> Cell {
        let index = index as i32;
        Cell::new(index % self.cols, index / self.cols)
    }

    pub fn cell_count(&self) -> usize {
        (self.cols.max(0) * self.rows.max(0)) as usize
    }

    /// World-space vector for a neighbour step, accounting for non-square cells
    pub fn step_vector(&self, d_col: i32, d_row: i32) -> DVec2 {
        DVec2::new(d_col as f64 * self.cell_width, d_row as f64 * self.cell_height)
    }
}

/// Walkability source consumed by the locomotion core.
///
/// Implemented by the game's map. Metrics must stay fixed for as long as any
/// agent is moving on the map.
pub trait GridMap {
    /// Whether the world point (x, z) can be stood on. Points outside the map are not walkable.
    fn is_walkable(&self, x: f64, z: f64) -> bool;

    fn metrics(&self) -> GridMetrics;

    /// Incremented whenever walkability changes; cached flow fields are dropped when it moves.
    fn revision(&self) -> u64 {
        0
    }

    fn width(&self) -> f64 {
        self.metrics().width()
    }

    fn height(&self) -> f64 {
        self.metrics().height()
    }

    /// Walkability of a whole cell, sampled at its centre
    fn is_cell_walkable(&self, cell: Cell) -> bool {
        let metrics = self.metrics();
        if !metrics.contains(cell) {
            return false;
        }
        let center = metrics.cell_center(cell);
        self.is_walkable(center.x, center.y)
    }
}

/// Grid structure for storing cell states
/// Cell values: 0=free/walkable, 1=blocked/wall
#[derive(Clone, Debug)]
pub struct Grid {
    pub rows: i32,
    pub cols: i32,
    pub cells: Vec<i32>,
    pub cell_width: f64,
    pub cell_height: f64,
    pub origin: DVec2,
    /// Revision number - incremented whenever grid cells change
    pub revision: u64,
}

impl Grid {
    /// Create a new grid with all cells set to free (0)
    pub fn new(rows: i32, cols: i32, cell_width: f64, cell_height: f64) -> Self {
        Grid {
            rows,
            cols,
            cells: vec![0; (rows.max(0) * cols.max(0)) as usize],
            cell_width,
            cell_height,
            origin: DVec2::ZERO,
            revision: 0,
        }
    }

    /// Create a grid with specific blocked cells
    pub fn with_blocked(rows: i32, cols: i32, cell_size: f64, blocked: &[i32]) -> Self {
        let mut grid = Self::new(rows, cols, cell_size, cell_size);
        for &cell_id in blocked {
            if cell_id >= 0 && cell_id < (rows * cols) {
                grid.cells[cell_id as usize] = 1;
            }
        }
        grid
    }

    /// Parse an ASCII layout, first line is row 0.
    /// `#` or `■` is a wall, anything else is free.
    pub fn from_layout(lines: &[&str], cell_size: f64) -> Self {
        let rows = lines.len() as i32;
        let cols = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as i32;
        let mut grid = Self::new(rows, cols, cell_size, cell_size);
        for (row, line) in lines.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                if ch == '#' || ch == '■' {
                    grid.set_cell(col as i32, row as i32, 1);
                }
            }
        }
        grid.revision = 0;
        grid
    }

    pub fn with_origin(mut self, origin: DVec2) -> Self {
        self.origin = origin;
        self
    }

    /// Check if a cell at (x, y) is blocked
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= self.cols || y < 0 || y >= self.rows {
            return true; // Out of bounds is considered blocked
        }
        self.cells[self.get_id(x, y) as usize] == 1
    }

    /// Convert (x, y) coordinates to cell ID
    pub fn get_id(&self, x: i32, y: i32) -> i32 {
        x + y * self.cols
    }

    /// Set cell value at (x, y)
    pub fn set_cell(&mut self, x: i32, y: i32, value: i32) {
        if x >= 0 && x < self.cols && y >= 0 && y < self.rows {
            let id = self.get_id(x, y);
            let old_value = self.cells[id as usize];
            if old_value != value {
                self.cells[id as usize] = value;
                self.revision += 1;
            }
        }
    }

    /// Flip a cell between free and blocked
    pub fn toggle_cell(&mut self, x: i32, y: i32) {
        let value = if self.is_blocked(x, y) { 0 } else { 1 };
        self.set_cell(x, y, value);
    }

    /// IDs of every blocked cell, ascending
    pub fn blocked_ids(&self) -> Vec<i32> {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != 0)
            .map(|(id, _)| id as i32)
            .collect()
    }

    /// Render as `#`/`.` rows, the inverse of [`Grid::from_layout`]
    pub fn to_layout(&self) -> String {
        let mut result = String::new();
        for y in 0..self.rows {
            for x in 0..self.cols {
                result.push(if self.is_blocked(x, y) { '#' } else { '.' });
            }
            result.push('\n');
        }
        result
    }
}

impl GridMap for Grid {
    fn is_walkable(&self, x: f64, z: f64) -> bool {
        let cell = self.metrics().world_to_cell(x, z);
        !self.is_blocked(cell.col, cell.row)
    }

    fn metrics(&self) -> GridMetrics {
        GridMetrics::new(self.cols, self.rows, self.cell_width, self.cell_height)
            .with_origin(self.origin)
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_cell_conversion() {
        let grid = Grid::new(4, 6, 0.5, 0.5).with_origin(DVec2::new(-1.0, -1.0));
        let metrics = grid.metrics();

        assert_eq!(metrics.world_to_cell(-1.0, -1.0), Cell::new(0, 0));
        assert_eq!(metrics.world_to_cell(0.2, 0.7), Cell::new(2, 3));
        assert_eq!(metrics.world_to_cell(-1.1, 0.0), Cell::new(-1, 2));
        assert_eq!(metrics.cell_center(Cell::new(2, 3)), DVec2::new(0.25, 0.75));
        assert_eq!(metrics.width(), 3.0);
        assert_eq!(metrics.height(), 2.0);
    }

    #[test]
    fn test_walkability_and_revision() {
        let mut grid = Grid::new(3, 3, 1.0, 1.0);
        assert!(grid.is_walkable(1.5, 1.5));
        assert!(!grid.is_walkable(-0.1, 1.5));
        assert!(!grid.is_walkable(1.5, 3.0));

        grid.set_cell(1, 1, 1);
        assert!(!grid.is_walkable(1.5, 1.5));
        assert_eq!(grid.revision(), 1);

        // Writing the same value again is not a change
        grid.set_cell(1, 1, 1);
        assert_eq!(grid.revision(), 1);

        grid.toggle_cell(1, 1);
        assert!(grid.is_walkable(1.5, 1.5));
        assert_eq!(grid.revision(), 2);
    }

    #[test]
    fn test_layout_round_trip() {
        let layout = ["..#.", "....", "#..."];
        let grid = Grid::from_layout(&layout, 1.0);
        assert_eq!(grid.cols, 4);
        assert_eq!(grid.rows, 3);
        assert_eq!(grid.blocked_ids(), vec![2, 8]);
        assert_eq!(grid.to_layout(), "..#.\n....\n#...\n");
        assert_eq!(grid.revision(), 0);
    }
}
