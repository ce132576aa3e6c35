use crate::grid::{GridMap, GridMetrics};
use crate::obstacle::has_line_of_sight;
use glam::DVec2;

/// Number of times a rejected step is halved before giving up on the direct direction
const BISECT_ATTEMPTS: usize = 3;

/// Result of validating one movement step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeMove {
    /// Displacement to apply, zero if nothing valid was found
    pub delta: DVec2,
    /// Set when the step had to slide sideways; the direction that worked
    pub tangent: Option<DVec2>,
}

impl SafeMove {
    pub const STILL: SafeMove = SafeMove {
        delta: DVec2::ZERO,
        tangent: None,
    };

    pub fn is_still(&self) -> bool {
        self.delta == DVec2::ZERO
    }
}

/// Clamp a point into the map, keeping `radius` of clearance from every edge.
///
/// If the map is narrower than the agent, the point is pinned to the lower edge instead of panicking.
pub fn clamp_to_bounds(point: DVec2, radius: f64, metrics: &GridMetrics) -> DVec2 {
    let lo = metrics.min_bound() + DVec2::splat(radius);
    let hi = metrics.max_bound() - DVec2::splat(radius);
    DVec2::new(point.x.min(hi.x).max(lo.x), point.y.min(hi.y).max(lo.y))
}

/// Validate and, if needed, shorten or deflect a step from `pos` along `dir`.
///
/// Every candidate end point is clamped into the map first, then accepted only if
/// it is walkable and visible from `pos`. The direct step is tried at full length
/// and then halved up to three times. Unless `only_direct` is set, sideways steps of
/// a third of the length follow, starting with `last_tangent` when there is one.
/// Without a map every step is accepted unchanged.
pub fn safe_move(
    pos: DVec2,
    radius: f64,
    dir: DVec2,
    dist: f64,
    map: Option<&dyn GridMap>,
    last_tangent: Option<DVec2>,
    only_direct: bool,
) -> SafeMove {
    if dist <= 0.0 || dir == DVec2::ZERO || !dir.is_finite() {
        return SafeMove::STILL;
    }
    let Some(map) = map else {
        return SafeMove {
            delta: dir * dist,
            tangent: None,
        };
    };
    let metrics = map.metrics();

    let attempt = |direction: DVec2, length: f64| -> Option<DVec2> {
        let target = clamp_to_bounds(pos + direction * length, radius, &metrics);
        let valid = map.is_walkable(target.x, target.y) && has_line_of_sight(pos, target, Some(map));
        valid.then(|| target - pos)
    };

    let mut step = dist;
    for i in 0..=BISECT_ATTEMPTS {
        if i > 0 {
            step *= 0.5;
        }
        if let Some(delta) = attempt(dir, step) {
            return SafeMove {
                delta,
                tangent: None,
            };
        }
    }

    if only_direct {
        return SafeMove::STILL;
    }

    let side_step = dist / 3.0;
    let left = DVec2::new(-dir.y, dir.x);
    let right = DVec2::new(dir.y, -dir.x);
    let candidates: Vec<DVec2> = match last_tangent {
        Some(t) => vec![t, -t, left, right],
        None => vec![left, right],
    };
    for tangent in candidates {
        if let Some(delta) = attempt(tangent, side_step) {
            // A clamped side step can collapse to nothing against a map edge
            if delta == DVec2::ZERO {
                continue;
            }
            return SafeMove {
                delta,
                tangent: Some(tangent),
            };
        }
    }
    SafeMove::STILL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn test_clamp_inset_by_radius() {
        let metrics = GridMetrics::new(10, 5, 1.0, 1.0);
        assert_eq!(
            clamp_to_bounds(DVec2::new(-3.0, 7.0), 0.5, &metrics),
            DVec2::new(0.5, 4.5)
        );
        // Agent wider than the map
        let tiny = GridMetrics::new(1, 1, 1.0, 1.0);
        assert_eq!(clamp_to_bounds(DVec2::new(0.9, 0.1), 2.0, &tiny), DVec2::new(2.0, 2.0));
    }

    #[test]
    fn test_no_map_passes_through() {
        let result = safe_move(DVec2::ZERO, 0.5, DVec2::X, 2.0, None, None, true);
        assert_eq!(result.delta, DVec2::new(2.0, 0.0));
        assert_eq!(safe_move(DVec2::ZERO, 0.5, DVec2::ZERO, 2.0, None, None, true), SafeMove::STILL);
    }

    #[test]
    fn test_step_is_halved_before_wall() {
        // Wall occupies column 3
        let grid = Grid::from_layout(&["...#.", "...#.", "...#."], 1.0);
        let result = safe_move(DVec2::new(1.5, 1.5), 0.2, DVec2::X, 2.0, Some(&grid), None, true);
        assert_eq!(result.delta, DVec2::new(1.0, 0.0));
        assert_eq!(result.tangent, None);
    }

    #[test]
    fn test_sideways_when_facing_wall() {
        let grid = Grid::from_layout(&["....", ".#..", "...."], 1.0);
        let pos = DVec2::new(0.9, 1.5);
        // Every direct step lands in the wall cell
        let result = safe_move(pos, 0.2, DVec2::X, 0.9, Some(&grid), None, false);
        let Some(tangent) = result.tangent else {
            panic!("expected a sideways step");
        };
        assert_eq!(tangent, DVec2::new(0.0, 1.0));
        assert!((result.delta - DVec2::new(0.0, 0.3)).length() < 1e-12);

        // The remembered tangent is tried first
        let result = safe_move(pos, 0.2, DVec2::X, 0.9, Some(&grid), Some(DVec2::new(0.0, -1.0)), false);
        assert_eq!(result.tangent, Some(DVec2::new(0.0, -1.0)));

        // Direct only gives up
        let result = safe_move(pos, 0.2, DVec2::X, 0.9, Some(&grid), None, true);
        assert!(result.is_still());
    }
}
