use crate::actor::Actor;
use crate::world::World;
use glam::DVec2;
use std::f64::consts::{FRAC_PI_3, PI, TAU};

/// Tuning for contact sliding and crowd detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvoidanceParams {
    /// Extra clearance added to the sum of both radii
    pub margin: f64,
    /// Fraction of the desired distance kept when sliding
    pub slide_factor: f64,
    /// Neighbours closer than own radius plus this count as crowding
    pub crowd_radius: f64,
}

impl Default for AvoidanceParams {
    fn default() -> Self {
        AvoidanceParams {
            margin: 0.05,
            slide_factor: 0.6,
            crowd_radius: 1.5,
        }
    }
}

/// Adjusted movement returned by [`try_slide_on_contact`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slide {
    pub dir: DVec2,
    pub dist: f64,
}

/// Other actors that can push `agent` around: active, alive, same movable kind
fn neighbors<'a>(agent: &'a dyn Actor, world: &'a dyn World) -> impl Iterator<Item = &'a dyn Actor> + 'a {
    let id = agent.id();
    let kind = agent.kind();
    world.actors().filter(move |other| {
        other.id() != id
            && other.is_active()
            && !other.is_dead()
            && other.kind() == kind
            && kind.is_movable()
    })
}

/// Check the agent's predicted position against its neighbours and slide along the worst contact.
///
/// Only the neighbour with the largest overlap is considered; on equal overlap the
/// first one in world order wins. The slide tangent is perpendicular to the line
/// from that neighbour to the agent's current position, on whichever side deviates
/// least from `desired_dir`.
pub fn try_slide_on_contact(
    agent: &dyn Actor,
    desired_dir: DVec2,
    desired_dist: f64,
    world: &dyn World,
    params: &AvoidanceParams,
) -> Slide {
    let pos = agent.ground_position();
    let predicted = pos + desired_dir * desired_dist;
    let radius = agent.radius();

    let mut worst: Option<(DVec2, f64)> = None;
    for other in neighbors(agent, world) {
        let other_pos = other.ground_position();
        let min_dist = radius + other.radius() + params.margin;
        let overlap = min_dist - predicted.distance(other_pos);
        if overlap > 0.0 && worst.map_or(true, |(_, w)| overlap > w) {
            worst = Some((other_pos, overlap));
        }
    }

    let Some((other_pos, _)) = worst else {
        return Slide {
            dir: desired_dir,
            dist: desired_dist,
        };
    };

    // Outward normal; when standing on top of the neighbour push straight back
    let away = pos - other_pos;
    let normal = if away.length_squared() > 1e-12 {
        away.normalize()
    } else {
        let back = -desired_dir;
        if back.length_squared() > 1e-12 {
            back.normalize()
        } else {
            DVec2::X
        }
    };

    let t1 = DVec2::new(-normal.y, normal.x);
    let t2 = DVec2::new(normal.y, -normal.x);
    let dir = if t2.dot(desired_dir) > t1.dot(desired_dir) {
        t2
    } else {
        t1
    };

    Slide {
        dir,
        dist: desired_dist * params.slide_factor,
    }
}

/// Bearings (radians) of nearby neighbours, sorted ascending
fn neighbor_angles(agent: &dyn Actor, world: &dyn World, params: &AvoidanceParams) -> Vec<f64> {
    let pos = agent.ground_position();
    let check = agent.radius() + params.crowd_radius;
    let mut angles: Vec<f64> = neighbors(agent, world)
        .filter_map(|other| {
            let offset = other.ground_position() - pos;
            (offset.length() < check).then(|| offset.y.atan2(offset.x))
        })
        .collect();
    angles.sort_by(f64::total_cmp);
    angles
}

/// Largest angular gap between consecutive bearings, as (start angle, width)
fn largest_gap(angles: &[f64]) -> (f64, f64) {
    let mut best = (0.0, 0.0);
    for (i, &angle) in angles.iter().enumerate() {
        let next = angles[(i + 1) % angles.len()];
        let mut gap = next - angle;
        if gap <= 0.0 {
            gap += TAU;
        }
        if gap > best.1 {
            best = (angle, gap);
        }
    }
    best
}

/// True when at least three neighbours are close and no free arc of 180° or more remains
pub fn is_surrounded(agent: &dyn Actor, world: &dyn World, params: &AvoidanceParams) -> bool {
    let angles = neighbor_angles(agent, world, params);
    if angles.len() < 3 {
        return false;
    }
    largest_gap(&angles).1 < PI
}

/// Direction out of a crowd: the middle of the widest free arc between neighbours.
///
/// Keeps `preferred` if it already lies within 60° of that arc's centre.
/// `None` with fewer than two close neighbours.
pub fn escape_direction(
    agent: &dyn Actor,
    world: &dyn World,
    preferred: DVec2,
    params: &AvoidanceParams,
) -> Option<DVec2> {
    let angles = neighbor_angles(agent, world, params);
    if angles.len() < 2 {
        return None;
    }
    let (start, width) = largest_gap(&angles);
    let escape = start + width / 2.0;
    let preferred_angle = preferred.y.atan2(preferred.x);

    let mut diff = (escape - preferred_angle).rem_euclid(TAU);
    if diff > PI {
        diff = TAU - diff;
    }
    let angle = if diff < FRAC_PI_3 { preferred_angle } else { escape };
    Some(DVec2::new(angle.cos(), angle.sin()))
}
