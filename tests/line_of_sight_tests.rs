mod common;

use common::{parse_map, variants};
use rtsmove::grid::GridMap;
use rtsmove::has_line_of_sight;
use rtsmove::obstacle::line_cells;

fn check(layout: &str, expected: bool) {
    for (variant, text) in variants(layout) {
        let map = parse_map(&text, 1.0);
        let grid: &dyn GridMap = &map.grid;
        let from = map.start_point();
        let to = map.dest_point();
        assert_eq!(
            has_line_of_sight(from, to, Some(grid)),
            expected,
            "[{}] S -> D\n{}",
            variant,
            text
        );
        assert_eq!(
            has_line_of_sight(to, from, Some(grid)),
            expected,
            "[{}] D -> S\n{}",
            variant,
            text
        );
    }
}

#[test]
fn test_open_row_is_clear() {
    check(
        "
        S.....D
        ...#...
        ",
        true,
    );
}

#[test]
fn test_wall_on_row_blocks() {
    check(
        "
        S..#..D
        .......
        ",
        false,
    );
}

#[test]
fn test_open_diagonal_is_clear() {
    check(
        "
        S...
        ....
        ....
        ...D
        ",
        true,
    );
}

#[test]
fn test_diagonal_squeeze_blocks() {
    check(
        "
        S#
        #D
        ",
        false,
    );
}

#[test]
fn test_single_corner_blocks_diagonal() {
    check(
        "
        S#
        .D
        ",
        false,
    );
}

#[test]
fn test_wall_beside_line_does_not_block() {
    check(
        "
        ######
        S....D
        ######
        ",
        true,
    );
}

#[test]
fn test_line_cells_cover_both_ends() {
    let map = parse_map(
        "
        S.....
        ......
        .....D
        ",
        1.0,
    );
    let metrics = map.grid.metrics();
    let cells = line_cells(map.start_point(), map.dest_point(), &metrics);
    assert_eq!(cells.first().copied(), map.start);
    assert_eq!(cells.last().copied(), map.dest);
    for pair in cells.windows(2) {
        assert!((pair[0].col - pair[1].col).abs() <= 1);
        assert!((pair[0].row - pair[1].row).abs() <= 1);
    }
}
