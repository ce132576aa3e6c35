//! Force-based steering behaviours.
//!
//! Every function is pure: it reads an [`AgentState`] snapshot and returns the
//! steering force to apply. Integrating force into velocity and velocity into
//! position is left to the caller.

use glam::DVec2;

/// Distances below this are treated as "already there"
const EPSILON: f64 = 1e-3;
/// Heading differences below this many degrees need no correction
const ALIGN_DEAD_ZONE: f64 = 1.0;
/// Heading differences at or above this many degrees turn at full angular speed
const ALIGN_FULL_SPEED_ANGLE: f64 = 90.0;

/// Snapshot of an agent for steering purposes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentState {
    pub position: DVec2,
    pub velocity: DVec2,
    /// Heading in degrees
    pub rotation: f64,
    pub max_speed: f64,
    pub max_force: f64,
    /// Degrees per second
    pub max_angular_speed: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SteeringOutput {
    /// Change of velocity per second, at most `max_force` long
    pub linear: DVec2,
    /// Degrees per second
    pub angular: f64,
}

/// Clamp a vector's length to `max_length`
pub fn limit(vector: DVec2, max_length: f64) -> DVec2 {
    let length = vector.length();
    if length > max_length && length > EPSILON {
        vector * (max_length / length)
    } else {
        vector
    }
}

/// Wrap an angle in degrees into [-180, 180]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && angle > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Heading in degrees of a ground-plane direction, 0 along +X and 90 along +Z
pub fn heading_degrees(dir: DVec2) -> f64 {
    dir.y.atan2(dir.x).to_degrees()
}

/// Shared tail of seek / arrive / follow: clamp the velocity change and face the desired velocity
fn steer_toward(agent: &AgentState, desired: DVec2) -> SteeringOutput {
    let linear = limit(desired - agent.velocity, agent.max_force);
    let angular = align(agent, heading_degrees(desired));
    SteeringOutput { linear, angular }
}

/// Head for `target` at full speed
pub fn seek(agent: &AgentState, target: DVec2) -> SteeringOutput {
    let offset = target - agent.position;
    let distance = offset.length();
    if distance < EPSILON {
        return SteeringOutput::default();
    }
    steer_toward(agent, offset / distance * agent.max_speed)
}

/// Head for `target`, slowing down linearly inside `slow_radius`.
///
/// Inside `arrival_radius` the output brakes to a stop by cancelling the current velocity.
pub fn arrive(agent: &AgentState, target: DVec2, slow_radius: f64, arrival_radius: f64) -> SteeringOutput {
    let offset = target - agent.position;
    let distance = offset.length();
    if distance < arrival_radius {
        return SteeringOutput {
            linear: -agent.velocity,
            angular: 0.0,
        };
    }

    let target_speed = if distance > slow_radius {
        agent.max_speed
    } else {
        agent.max_speed * (distance / slow_radius)
    };
    let desired = if distance > EPSILON {
        offset / distance * target_speed
    } else {
        DVec2::ZERO
    };
    steer_toward(agent, desired)
}

/// Angular speed (degrees per second) that turns the agent toward `target_degrees`
/// along the shorter way round.
pub fn align(agent: &AgentState, target_degrees: f64) -> f64 {
    let diff = normalize_degrees(normalize_degrees(target_degrees) - normalize_degrees(agent.rotation));
    let size = diff.abs();
    if size < ALIGN_DEAD_ZONE {
        return 0.0;
    }
    let speed = if size > ALIGN_FULL_SPEED_ANGLE {
        agent.max_angular_speed
    } else {
        agent.max_angular_speed * (size / ALIGN_FULL_SPEED_ANGLE)
    };
    (diff.signum() * speed).clamp(-agent.max_angular_speed, agent.max_angular_speed)
}

/// Travel along a flow direction at full speed
pub fn follow_flow_field(agent: &AgentState, flow_dir: DVec2) -> SteeringOutput {
    steer_toward(agent, flow_dir * agent.max_speed)
}
