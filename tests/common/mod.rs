#![allow(dead_code)]

use rtsmove::grid::{Cell, Grid, GridMap};
use rtsmove::pathfinding::{format_path, path_cost, PathNode};
use rtsmove::trace::TrajectoryLog;
use rtsmove::{Actor, ActorId, MoveCommand, MovementSystem, SimWorld, Unit, World};

/// Fixed tick used by every movement test
pub const DT: f64 = 1.0 / 30.0;

/// A parsed ASCII map
/// Format:
/// - #: blocked cell
/// - S: start cell
/// - D: destination cell
/// - anything else: free cell
pub struct AsciiMap {
    pub grid: Grid,
    pub start: Option<Cell>,
    pub dest: Option<Cell>,
}

pub fn parse_map(layout: &str, cell_size: f64) -> AsciiMap {
    let lines: Vec<&str> = layout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let grid = Grid::from_layout(&lines, cell_size);

    let mut start = None;
    let mut dest = None;
    for (row, line) in lines.iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            match ch {
                'S' => start = Some(Cell::new(col as i32, row as i32)),
                'D' => dest = Some(Cell::new(col as i32, row as i32)),
                _ => {}
            }
        }
    }
    AsciiMap { grid, start, dest }
}

impl AsciiMap {
    pub fn start_point(&self) -> glam::DVec2 {
        let cell = self.start.unwrap_or_else(|| panic!("map has no S"));
        self.grid.metrics().cell_center(cell)
    }

    pub fn dest_point(&self) -> glam::DVec2 {
        let cell = self.dest.unwrap_or_else(|| panic!("map has no D"));
        self.grid.metrics().cell_center(cell)
    }
}

/// Mirror a layout left-right
pub fn flip_horizontal(layout: &str) -> String {
    layout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().rev().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mirror a layout top-bottom
pub fn flip_vertical(layout: &str) -> String {
    let mut lines: Vec<&str> = layout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.reverse();
    lines.join("\n")
}

/// The layout and its three mirror images, named
pub fn variants(layout: &str) -> Vec<(&'static str, String)> {
    vec![
        ("original", layout.to_string()),
        ("h_flip", flip_horizontal(layout)),
        ("v_flip", flip_vertical(layout)),
        ("hv_flip", flip_vertical(&flip_horizontal(layout))),
    ]
}

/// Visualize a path on a grid
pub fn visualize_path(grid: &Grid, path: &[PathNode], start: Cell, dest: Cell) -> String {
    let metrics = grid.metrics();
    let on_path: Vec<Cell> = path
        .iter()
        .map(|node| metrics.world_to_cell(node.x, node.z))
        .collect();

    let mut result = String::new();
    result.push_str(&format!("\nPath: {}\n", format_path(path)));
    result.push_str(&format!(
        "Length: {} nodes, Distance: {:.2}\n\n",
        path.len(),
        path_cost(path)
    ));

    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let cell = Cell::new(col, row);
            let symbol = if cell == start {
                'S'
            } else if cell == dest {
                'D'
            } else if on_path.contains(&cell) {
                '*'
            } else if grid.is_blocked(col, row) {
                '█'
            } else {
                '.'
            };
            result.push(symbol);
        }
        result.push('\n');
    }
    result
}

/// Draw recorded unit positions onto the map, one letter per unit
pub fn visualize_trace(grid: &Grid, log: &TrajectoryLog) -> String {
    let metrics = grid.metrics();
    let mut canvas: Vec<Vec<char>> = (0..grid.rows)
        .map(|row| {
            (0..grid.cols)
                .map(|col| if grid.is_blocked(col, row) { '█' } else { '.' })
                .collect()
        })
        .collect();

    for record in &log.ticks {
        for (i, sample) in record.units.iter().enumerate() {
            let cell = metrics.world_to_cell(sample.x, sample.z);
            if metrics.contains(cell) {
                canvas[cell.row as usize][cell.col as usize] = (b'a' + (i % 26) as u8) as char;
            }
        }
    }
    canvas
        .into_iter()
        .map(|row| row.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn world_with(grid: Option<Grid>, units: Vec<Unit>) -> SimWorld {
    let mut world = match grid {
        Some(grid) => SimWorld::new(grid),
        None => SimWorld::without_map(),
    };
    for unit in units {
        assert!(world.spawn(unit), "duplicate unit id in test setup");
    }
    world
}

/// Issue a plain move order, panicking if it is rejected
pub fn order(system: &mut MovementSystem, world: &SimWorld, id: u32, x: f64, z: f64, speed: f64) {
    let command = MoveCommand::new(ActorId(id), x, z, speed)
        .unwrap_or_else(|e| panic!("bad test command: {}", e));
    system
        .move_to(&command, world)
        .unwrap_or_else(|e| panic!("move_to rejected: {}", e));
}

/// Run `ticks` fixed updates, recording every tick
pub fn run(system: &mut MovementSystem, world: &mut SimWorld, ticks: usize) -> TrajectoryLog {
    let mut log = TrajectoryLog::new(DT);
    for _ in 0..ticks {
        system.fixed_update(DT, world);
        log.record(&*world, system);
    }
    log
}

/// Run until no unit has an order left, or `max_ticks` is reached
pub fn run_until_idle(system: &mut MovementSystem, world: &mut SimWorld, max_ticks: usize) -> TrajectoryLog {
    let mut log = TrajectoryLog::new(DT);
    for _ in 0..max_ticks {
        system.fixed_update(DT, world);
        log.record(&*world, system);
        if system.active_count() == 0 {
            break;
        }
    }
    log
}

/// Every recorded position must sit on a walkable cell
pub fn assert_never_in_walls(grid: &Grid, log: &TrajectoryLog) {
    for record in &log.ticks {
        for sample in &record.units {
            assert!(
                grid.is_walkable(sample.x, sample.z),
                "unit {} inside a wall at ({:.3}, {:.3}) on tick {}\n{}",
                sample.agent,
                sample.x,
                sample.z,
                record.tick,
                visualize_trace(grid, log)
            );
        }
    }
}

pub fn position(world: &SimWorld, id: u32) -> glam::DVec2 {
    world
        .actor(ActorId(id))
        .map(|a| a.ground_position())
        .unwrap_or_else(|| panic!("unit {} missing", id))
}
