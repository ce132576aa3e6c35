mod common;

use common::{parse_map, variants, visualize_path};
use glam::DVec2;
use rtsmove::flow_field::generate_flow_field;
use rtsmove::grid::{Cell, Grid, GridMap};
use rtsmove::has_line_of_sight;
use rtsmove::pathfinding::{find_path, path_cost, smooth_path, PathNode};
use std::f64::consts::SQRT_2;

const DETOUR: &str = "
    ..........
    ....#.....
    .S..#...D.
    ....#.....
    ..........
";

const ENCLOSED: &str = "
    S.....
    ...###
    ...#D#
    ...###
";

fn octile(a: Cell, b: Cell) -> f64 {
    let dx = (a.col - b.col).abs() as f64;
    let dz = (a.row - b.row).abs() as f64;
    dx.max(dz) + (SQRT_2 - 1.0) * dx.min(dz)
}

/// Every step moves to a touching walkable cell and never cuts a wall corner
fn assert_valid_steps(grid: &Grid, path: &[PathNode]) {
    let metrics = grid.metrics();
    let cells: Vec<Cell> = path.iter().map(|n| metrics.world_to_cell(n.x, n.z)).collect();
    for cell in &cells {
        assert!(grid.is_cell_walkable(*cell), "path enters wall at {:?}", cell);
    }
    for pair in cells.windows(2) {
        let (d_col, d_row) = (pair[1].col - pair[0].col, pair[1].row - pair[0].row);
        assert!(d_col.abs() <= 1 && d_row.abs() <= 1, "jump {:?} -> {:?}", pair[0], pair[1]);
        if d_col != 0 && d_row != 0 {
            assert!(grid.is_cell_walkable(pair[0].offset(d_col, 0)));
            assert!(grid.is_cell_walkable(pair[0].offset(0, d_row)));
        }
    }
}

#[test]
fn test_open_grid_paths_are_optimal() {
    let grid = Grid::new(9, 12, 1.0, 1.0);
    let metrics = grid.metrics();
    let pairs = [
        (Cell::new(0, 0), Cell::new(11, 8)),
        (Cell::new(2, 7), Cell::new(9, 1)),
        (Cell::new(5, 5), Cell::new(5, 0)),
        (Cell::new(11, 0), Cell::new(0, 3)),
    ];
    for (start, goal) in pairs {
        let path = find_path(&grid, metrics.cell_center(start), metrics.cell_center(goal))
            .unwrap_or_else(|| panic!("no path {:?} -> {:?}", start, goal));
        assert_valid_steps(&grid, &path);
        assert!(
            (path_cost(&path) - octile(start, goal)).abs() < 1e-9,
            "{:?} -> {:?}{}",
            start,
            goal,
            visualize_path(&grid, &path, start, goal)
        );
    }
}

#[test]
fn test_detour_around_wall() {
    let expected = 3.0 + 4.0 * SQRT_2;
    for (variant, layout) in variants(DETOUR) {
        let map = parse_map(&layout, 1.0);
        let (start, dest) = (map.start.unwrap_or_else(|| panic!("no S")), map.dest.unwrap_or_else(|| panic!("no D")));
        let path = find_path(&map.grid, map.start_point(), map.dest_point())
            .unwrap_or_else(|| panic!("[{}] path should exist around the wall", variant));

        let picture = visualize_path(&map.grid, &path, start, dest);
        assert_valid_steps(&map.grid, &path);
        assert!((path_cost(&path) - expected).abs() < 1e-9, "[{}]{}", variant, picture);
        assert_eq!(path.first().map(|n| n.ground()), Some(map.start_point()));
        assert_eq!(path.last().map(|n| n.ground()), Some(map.dest_point()));
    }
}

#[test]
fn test_astar_cost_matches_flow_distance() {
    let map = parse_map(
        "
        S...#.....
        .##.#.###.
        ..#...#...
        ..#####.#.
        ........#D
        ",
        1.0,
    );
    let field = generate_flow_field(map.dest_point(), &map.grid).unwrap_or_else(|| panic!("no field"));
    let metrics = map.grid.metrics();

    for row in 0..map.grid.rows {
        for col in 0..map.grid.cols {
            if map.grid.is_blocked(col, row) {
                continue;
            }
            let from = metrics.cell_center(Cell::new(col, row));
            let path = find_path(&map.grid, from, map.dest_point());
            match (path, field.distance_at(from.x, from.y)) {
                (Some(path), Some(distance)) => {
                    assert!((path_cost(&path) - distance).abs() < 1e-9, "cell ({}, {})", col, row)
                }
                (None, None) => {}
                (path, distance) => panic!(
                    "cell ({}, {}): A* {:?} but flow distance {:?}",
                    col,
                    row,
                    path.map(|p| path_cost(&p)),
                    distance
                ),
            }
        }
    }
}

#[test]
fn test_enclosed_target_is_unreachable() {
    for (variant, layout) in variants(ENCLOSED) {
        let map = parse_map(&layout, 1.0);
        assert!(
            find_path(&map.grid, map.start_point(), map.dest_point()).is_none(),
            "[{}] target is walled in",
            variant
        );

        // The field exists but does not cover the start
        let field = generate_flow_field(map.dest_point(), &map.grid).unwrap_or_else(|| panic!("no field"));
        let start = map.start_point();
        assert!(!field.is_reachable(start.x, start.y));
    }
}

#[test]
fn test_blocked_target_has_no_path() {
    let map = parse_map(
        "
        S...
        ..#.
        ",
        1.0,
    );
    assert!(find_path(&map.grid, map.start_point(), DVec2::new(2.5, 1.5)).is_none());
}

#[test]
fn test_smoothed_path_keeps_line_of_sight() {
    let map = parse_map(DETOUR, 1.0);
    let grid: &dyn GridMap = &map.grid;
    let path = find_path(&map.grid, map.start_point(), map.dest_point()).unwrap_or_default();
    let smoothed = smooth_path(&path, Some(grid));

    assert!(smoothed.len() < path.len());
    assert_eq!(smoothed.first(), path.first());
    assert_eq!(smoothed.last(), path.last());
    assert!(path_cost(&smoothed) <= path_cost(&path) + 1e-9);
    for pair in smoothed.windows(2) {
        assert!(has_line_of_sight(pair[0].ground(), pair[1].ground(), Some(grid)));
    }
}

#[test]
fn test_origin_and_cell_size_are_respected() {
    let grid = Grid::new(4, 8, 0.5, 0.5).with_origin(DVec2::new(-2.0, -1.0));
    let path = find_path(&grid, DVec2::new(-1.9, -0.9), DVec2::new(1.9, 0.9)).unwrap_or_default();
    assert_eq!(path.first().map(|n| n.ground()), Some(DVec2::new(-1.75, -0.75)));
    assert_eq!(path.last().map(|n| n.ground()), Some(DVec2::new(1.75, 0.75)));
    // 7 columns and 3 rows apart: 3 diagonal steps plus 4 straight ones, half a unit each
    assert!((path_cost(&path) - 0.5 * (4.0 + 3.0 * SQRT_2)).abs() < 1e-9);
}
