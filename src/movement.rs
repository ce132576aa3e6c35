//! Per-agent movement state machine.
//!
//! Each fixed tick every agent with a move order is advanced once, in the order
//! the orders were first issued. An agent walks straight while the ground ahead
//! is clear, falls back to an A* path or a shared flow field when it is not,
//! and drops to `Blocked` when neither can be found. Every position change
//! goes through [`safe_move`].

use crate::actor::{Actor, ActorId};
use crate::avoidance::{escape_direction, is_surrounded, try_slide_on_contact};
use crate::command::{MoveCommand, UnitCommand};
use crate::config::{MovementConfig, PathfindingMode};
use crate::error::MoveError;
use crate::flow_field::FlowFieldCache;
use crate::grid::GridMap;
use crate::move_state::{AgentMoveState, Mode, MoveEvent, MoveHandle, MoveTable, PathCursor, Phase};
use crate::obstacle::has_line_of_sight;
use crate::pathfinding::{find_path, smooth_path, PathNode};
use crate::safe_move::{clamp_to_bounds, safe_move, SafeMove};
use crate::steering::{arrive, follow_flow_field, heading_degrees, limit, normalize_degrees, AgentState, SteeringOutput};
use crate::world::World;
use glam::{DVec2, DVec3};
use log::{debug, info, trace, warn};
use std::sync::Arc;

/// Arrival tolerance used when an order asks for a zero radius
const ARRIVAL_EPSILON: f64 = 1e-6;
/// Blocked agents ignore slides shorter than this
const MIN_BLOCKED_DELTA: f64 = 1e-4;
/// Heading error in degrees that counts as facing the target
const HEADING_SNAP: f64 = 1.0;
/// Flow-field agents switch to straight movement within this many check distances of the target
const FLOW_SHORTCUT_FACTOR: f64 = 1.5;
/// A tick that covers less than this fraction of the intended step counts as stalled.
/// Blocked agents measure it as a new closest approach to the target instead.
const STALL_FRACTION: f64 = 0.1;

/// The parts of an actor read once at the start of its update
#[derive(Debug, Clone, Copy)]
struct Body {
    pos: DVec2,
    radius: f64,
    rotation: f64,
}

impl Body {
    fn of(actor: &dyn Actor) -> Self {
        Body {
            pos: actor.ground_position(),
            radius: actor.radius(),
            rotation: actor.rotation(),
        }
    }
}

/// Coordinator owning the move state of every agent with a pending order
#[derive(Debug, Clone, Default)]
pub struct MovementSystem {
    config: MovementConfig,
    table: MoveTable,
    flow_cache: FlowFieldCache,
    events: Vec<MoveEvent>,
    tick: u64,
}

fn look_ahead_clear(map: Option<&dyn GridMap>, pos: DVec2, target: DVec2, check_distance: f64) -> bool {
    let offset = target - pos;
    let dist = offset.length();
    if dist <= ARRIVAL_EPSILON {
        return true;
    }
    let ahead = pos + offset * (check_distance.min(dist) / dist);
    has_line_of_sight(pos, ahead, map)
}

fn has_arrived(state: &AgentMoveState, pos: DVec2) -> bool {
    pos.distance(state.target) <= state.arrival_radius.max(ARRIVAL_EPSILON)
}

fn finish(state: &mut AgentMoveState) {
    state.phase = Phase::Arrived;
    state.velocity = DVec2::ZERO;
}

/// Rotate toward `target` degrees by at most `turn_speed * dt`, snapping when close
fn turn_toward(actor: &mut dyn Actor, target: f64, turn_speed: f64, dt: f64) -> bool {
    let diff = normalize_degrees(target - actor.rotation());
    if diff.abs() < HEADING_SNAP {
        actor.set_rotation(normalize_degrees(target));
        return true;
    }
    let amount = diff.abs().min(turn_speed * dt);
    actor.set_rotation(normalize_degrees(actor.rotation() + diff.signum() * amount));
    false
}

impl MovementSystem {
    pub fn new(config: MovementConfig) -> Self {
        let flow_cache = FlowFieldCache::new(config.flow_cache_capacity, config.flow_cache_max_age_ticks);
        MovementSystem {
            config,
            table: MoveTable::new(),
            flow_cache,
            events: Vec::new(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Number of fixed updates run so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Issue a move order. Re-issuing for an agent that is already moving keeps
    /// its place in the update order.
    pub fn move_to(&mut self, command: &MoveCommand, world: &dyn World) -> Result<(), MoveError> {
        let id = command.agent();
        let Some(actor) = world.actor(id).filter(|a| a.is_active() && !a.is_dead()) else {
            warn!("move_to: actor {} not found or not active", id);
            return Err(MoveError::UnknownAgent(id));
        };
        let body = Body::of(actor);

        let mut target = command.target();
        if let Some(map) = world.map() {
            // Targets inside the map are pulled in so the agent's body fits
            let metrics = map.metrics();
            if metrics.contains(metrics.world_to_cell(target.x, target.y)) {
                target = clamp_to_bounds(target, body.radius, &metrics);
            }
        }

        let check_distance = actor
            .unit_config()
            .and_then(|c| c.obstacle_check_distance)
            .filter(|d| *d > 0.0)
            .unwrap_or(self.config.obstacle_check_distance);

        let speed = command.speed();
        let mut state = AgentMoveState {
            agent: id,
            phase: Phase::Straight,
            target,
            speed,
            arrival_radius: command.arrival_radius().unwrap_or(self.config.arrival_radius),
            turn_speed: command.turn_speed().unwrap_or(self.config.turn_speed),
            check_distance,
            last_tangent: None,
            velocity: DVec2::ZERO,
            max_force: speed * self.config.max_force_factor,
            stalled_ticks: 0,
            best_distance: f64::INFINITY,
        };
        if let Some(target_angle) = self.turn_needed(body, target) {
            state.phase = Phase::Turning { target_angle };
        }

        let from = self.move_state(id).unwrap_or(Mode::Idle);
        let to = state.mode();
        debug!(
            "move_to: {} from ({:.2}, {:.2}) to ({:.2}, {:.2}) at {:.2}, {}",
            id, body.pos.x, body.pos.y, target.x, target.y, speed, to
        );
        self.table.upsert(state);
        self.record(id, from, to);
        Ok(())
    }

    /// Cancel an agent's order. Stopping an agent with no order is a no-op.
    pub fn stop_move(&mut self, id: ActorId) {
        let Some(state) = self.table.remove(id) else {
            trace!("stop_move: {} has no order", id);
            return;
        };
        debug!("stop_move: {} stopped while {}", id, state.mode());
        self.record(id, state.mode(), Mode::Idle);
    }

    pub fn apply(&mut self, command: &UnitCommand, world: &dyn World) -> Result<(), MoveError> {
        match command {
            UnitCommand::Move(order) => self.move_to(order, world),
            UnitCommand::Stop { agent } => {
                self.stop_move(*agent);
                Ok(())
            }
        }
    }

    /// True while an order is pending, i.e. in any mode but Arrived
    pub fn is_moving(&self, id: ActorId) -> bool {
        matches!(self.move_state(id), Some(mode) if mode != Mode::Arrived)
    }

    pub fn move_state(&self, id: ActorId) -> Option<Mode> {
        self.table.by_agent(id).map(AgentMoveState::mode)
    }

    /// Full state of one agent, for tooling and visualisation
    pub fn agent(&self, id: ActorId) -> Option<&AgentMoveState> {
        self.table.by_agent(id)
    }

    /// Agent states in update order
    pub fn agents(&self) -> impl Iterator<Item = &AgentMoveState> + '_ {
        self.table.iter()
    }

    pub fn active_count(&self) -> usize {
        self.table.len()
    }

    /// Take the mode changes recorded since the last call
    pub fn drain_events(&mut self) -> Vec<MoveEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_pathfinding_mode(&mut self, mode: PathfindingMode) {
        if self.config.pathfinding_mode == mode {
            return;
        }
        info!("Pathfinding mode set to {:?}", mode);
        self.config.pathfinding_mode = mode;

        // Routed agents drop their route and re-plan with the new mode when needed
        let handles: Vec<MoveHandle> = self.table.order().to_vec();
        for handle in handles {
            if let Some(state) = self.table.get_mut(handle) {
                if matches!(state.phase, Phase::FollowPath(_) | Phase::FollowField(_)) {
                    state.phase = Phase::Straight;
                }
            }
        }
    }

    pub fn set_steering_enabled(&mut self, enabled: bool) {
        if self.config.steering_enabled == enabled {
            return;
        }
        info!("Steering {}", if enabled { "enabled" } else { "disabled" });
        self.config.steering_enabled = enabled;
        let handles: Vec<MoveHandle> = self.table.order().to_vec();
        for handle in handles {
            if let Some(state) = self.table.get_mut(handle) {
                state.velocity = DVec2::ZERO;
            }
        }
    }

    pub fn clear_flow_field_cache(&mut self) {
        self.flow_cache.clear();
    }

    pub fn flow_cache(&self) -> &FlowFieldCache {
        &self.flow_cache
    }

    /// Drop every order, the flow field cache and pending events
    pub fn clear(&mut self) {
        self.table.clear();
        self.flow_cache.clear();
        self.events.clear();
    }

    /// Advance every agent by one fixed step of `dt` seconds
    pub fn fixed_update(&mut self, dt: f64, world: &mut dyn World) {
        self.tick += 1;
        let handles: Vec<MoveHandle> = self.table.order().to_vec();
        for handle in handles {
            let Some(mut state) = self.table.take(handle) else {
                continue;
            };
            let id = state.agent;

            if matches!(state.phase, Phase::Arrived) {
                self.table.remove(id);
                continue;
            }

            let body = world
                .actor(id)
                .filter(|a| a.is_active() && !a.is_dead())
                .map(Body::of);
            let Some(body) = body else {
                debug!("fixed_update: {} is gone, dropping its order", id);
                self.record(id, state.mode(), Mode::Idle);
                self.table.remove(id);
                continue;
            };

            let before = state.mode();
            self.step(&mut state, body, dt, world);
            self.record(id, before, state.mode());
            self.table.restore(handle, state);
        }
    }

    fn record(&mut self, agent: ActorId, from: Mode, to: Mode) {
        if from == to {
            return;
        }
        debug!("{}: {} -> {} at tick {}", agent, from, to, self.tick);
        self.events.push(MoveEvent {
            tick: self.tick,
            agent,
            from,
            to,
        });
    }

    /// Heading to turn to before moving, when turning in place applies
    fn turn_needed(&self, body: Body, target: DVec2) -> Option<f64> {
        if !self.config.turn_in_place || self.config.steering_enabled {
            return None;
        }
        let offset = target - body.pos;
        if offset.length() <= ARRIVAL_EPSILON {
            return None;
        }
        let desired = heading_degrees(offset);
        let error = normalize_degrees(desired - body.rotation).abs();
        (error > self.config.turn_threshold.max(HEADING_SNAP)).then_some(desired)
    }

    fn step(&mut self, state: &mut AgentMoveState, body: Body, dt: f64, world: &mut dyn World) {
        match state.phase {
            Phase::Straight => self.step_straight(state, body, dt, world),
            Phase::Turning { target_angle } => self.step_turning(state, target_angle, dt, world),
            Phase::FollowPath(_) => self.step_path(state, body, dt, world, true),
            Phase::FollowField(_) => self.step_field(state, body, dt, world, true),
            Phase::Blocked => self.step_blocked(state, body, dt, world),
            Phase::Arrived => {}
        }
    }

    fn steering_snapshot(state: &AgentMoveState, body: Body) -> AgentState {
        AgentState {
            position: body.pos,
            velocity: state.velocity,
            rotation: body.rotation,
            max_speed: state.speed,
            max_force: state.max_force,
            max_angular_speed: state.turn_speed,
            radius: body.radius,
        }
    }

    /// Integrate a steering force into the agent's velocity; returns the resulting direction and step length
    fn integrate(state: &mut AgentMoveState, output: SteeringOutput, dt: f64) -> (DVec2, f64) {
        state.velocity = limit(state.velocity + output.linear * dt, state.speed);
        let speed = state.velocity.length();
        if speed <= f64::EPSILON {
            return (DVec2::ZERO, 0.0);
        }
        (state.velocity / speed, speed * dt)
    }

    fn step_straight(&mut self, state: &mut AgentMoveState, body: Body, dt: f64, world: &mut dyn World) {
        let offset = state.target - body.pos;
        let dist = offset.length();
        if has_arrived(state, body.pos) {
            finish(state);
            return;
        }

        if !look_ahead_clear(world.map(), body.pos, state.target, state.check_distance) {
            trace!("{}: obstacle ahead at ({:.2}, {:.2})", state.agent, body.pos.x, body.pos.y);
            self.begin_route(state, body, world);
            match state.phase {
                Phase::FollowPath(_) => self.step_path(state, body, dt, world, false),
                Phase::FollowField(_) => self.step_field(state, body, dt, world, false),
                _ => {}
            }
            return;
        }

        if let Some(target_angle) = self.turn_needed(body, state.target) {
            state.phase = Phase::Turning { target_angle };
            return;
        }

        let (dir, step) = if self.config.steering_enabled {
            let agent = Self::steering_snapshot(state, body);
            let output = arrive(&agent, state.target, self.config.slow_radius, state.arrival_radius);
            Self::integrate(state, output, dt)
        } else {
            (offset / dist, state.speed * dt)
        };
        self.apply_step(state, body, dir, step.min(dist), dt, world, 0.0);
    }

    fn step_turning(&mut self, state: &mut AgentMoveState, target_angle: f64, dt: f64, world: &mut dyn World) {
        let Some(actor) = world.actor_mut(state.agent) else {
            return;
        };
        if turn_toward(actor, target_angle, state.turn_speed, dt) {
            state.phase = Phase::Straight;
        }
    }

    /// Leave straight movement: plan a path or fetch a flow field, or give up as Blocked
    fn begin_route(&mut self, state: &mut AgentMoveState, body: Body, world: &dyn World) {
        state.stalled_ticks = 0;
        state.best_distance = f64::INFINITY;
        let Some(map) = world.map() else {
            state.phase = Phase::Blocked;
            return;
        };

        state.phase = match self.config.pathfinding_mode {
            PathfindingMode::AStar => match plan_path(map, body, state.target) {
                Some(cursor) => {
                    trace!("{}: path {:?}", state.agent, cursor.nodes());
                    Phase::FollowPath(cursor)
                }
                None => Phase::Blocked,
            },
            PathfindingMode::FlowField => {
                let field = self.flow_cache.get_or_generate(
                    state.target,
                    map,
                    self.config.use_flow_cache,
                    self.tick,
                );
                match field {
                    Some(field) if field.is_reachable(body.pos.x, body.pos.y) => Phase::FollowField(field),
                    _ => Phase::Blocked,
                }
            }
        };
    }

    fn step_path(&mut self, state: &mut AgentMoveState, body: Body, dt: f64, world: &mut dyn World, allow_shortcut: bool) {
        if has_arrived(state, body.pos) {
            finish(state);
            return;
        }

        let map = world.map();
        if allow_shortcut
            && has_line_of_sight(body.pos, state.target, map)
            && look_ahead_clear(map, body.pos, state.target, state.check_distance)
        {
            state.phase = Phase::Straight;
            self.step_straight(state, body, dt, world);
            return;
        }

        let tolerance = state.arrival_radius.max(ARRIVAL_EPSILON);
        let Phase::FollowPath(cursor) = &mut state.phase else {
            return;
        };
        while cursor
            .current()
            .is_some_and(|node| node.ground().distance(body.pos) <= tolerance)
        {
            cursor.advance();
        }
        let Some(node) = cursor.current().map(PathNode::ground) else {
            finish(state);
            return;
        };

        let offset = node - body.pos;
        let dist = offset.length();
        let step = (state.speed * dt).min(dist);
        let moved = self.apply_step(state, body, offset / dist, step, dt, world, 0.0);
        self.track_stall(state, moved, step);
        if state.stalled_ticks >= self.config.stuck_repath_ticks {
            debug!("{}: no progress along path, re-planning", state.agent);
            self.begin_route(state, body, world);
        }
    }

    fn step_field(&mut self, state: &mut AgentMoveState, body: Body, dt: f64, world: &mut dyn World, allow_shortcut: bool) {
        if has_arrived(state, body.pos) {
            finish(state);
            return;
        }

        let dist = body.pos.distance(state.target);
        let Some(map) = world.map() else {
            state.phase = Phase::Straight;
            return;
        };
        if allow_shortcut
            && dist <= FLOW_SHORTCUT_FACTOR * state.check_distance
            && has_line_of_sight(body.pos, state.target, Some(map))
            && look_ahead_clear(Some(map), body.pos, state.target, state.check_distance)
        {
            state.phase = Phase::Straight;
            self.step_straight(state, body, dt, world);
            return;
        }

        let Phase::FollowField(field) = &state.phase else {
            return;
        };
        let mut field = Arc::clone(field);
        if field.revision != map.revision() {
            trace!("{}: map changed, refreshing flow field", state.agent);
            match self.flow_cache.get_or_generate(state.target, map, self.config.use_flow_cache, self.tick) {
                Some(fresh) => field = fresh,
                None => {
                    state.phase = Phase::Blocked;
                    return;
                }
            }
        }

        let mut sample = field.direction_interpolated(body.pos.x, body.pos.y);
        if sample.is_none() {
            // One rebuild, bypassing the cache
            if let Some(fresh) = self.flow_cache.get_or_generate(state.target, map, false, self.tick) {
                sample = fresh.direction_interpolated(body.pos.x, body.pos.y);
                field = fresh;
            }
        }
        let Some(flow_dir) = sample else {
            debug!("{}: off the flow field at ({:.2}, {:.2})", state.agent, body.pos.x, body.pos.y);
            state.phase = Phase::Blocked;
            return;
        };
        let cell_dir = field.direction_at(body.pos.x, body.pos.y);
        state.phase = Phase::FollowField(field);

        if flow_dir == DVec2::ZERO {
            // Inside the target cell
            state.phase = Phase::Straight;
            return;
        }

        let (dir, step) = if self.config.steering_enabled {
            let agent = Self::steering_snapshot(state, body);
            Self::integrate(state, follow_flow_field(&agent, flow_dir), dt)
        } else {
            (flow_dir, state.speed * dt)
        };
        let step = step.min(dist);
        let mut moved = self.apply_step(state, body, dir, step, dt, world, 0.0);
        if moved == DVec2::ZERO {
            // The blend can point into a wall corner; the cell's own direction never does
            if let Some(cell_dir) = cell_dir.filter(|d| *d != dir && *d != DVec2::ZERO) {
                moved = self.apply_step(state, body, cell_dir, step, dt, world, 0.0);
            }
        }
        self.track_stall(state, moved, step);
        if state.stalled_ticks >= self.config.stuck_repath_ticks {
            debug!("{}: no progress along flow field, re-planning", state.agent);
            self.begin_route(state, body, world);
        }
    }

    fn step_blocked(&mut self, state: &mut AgentMoveState, body: Body, dt: f64, world: &mut dyn World) {
        if has_arrived(state, body.pos) {
            finish(state);
            return;
        }
        if look_ahead_clear(world.map(), body.pos, state.target, state.check_distance) {
            state.phase = Phase::Straight;
            state.stalled_ticks = 0;
            state.best_distance = f64::INFINITY;
            self.step_straight(state, body, dt, world);
            return;
        }

        if state.stalled_ticks >= self.config.stuck_repath_ticks {
            self.begin_route(state, body, world);
            if !matches!(state.phase, Phase::Blocked) {
                debug!("{}: stuck, forced re-path succeeded", state.agent);
                return;
            }
        }

        let offset = state.target - body.pos;
        let dir = offset.normalize_or_zero();
        let step = state.speed * dt;
        let mut moved = self.apply_step(state, body, dir, step, dt, world, MIN_BLOCKED_DELTA);

        if moved == DVec2::ZERO {
            let escape = world.actor(state.agent).and_then(|actor| {
                let params = self.config.avoidance();
                if is_surrounded(actor, &*world, &params) {
                    escape_direction(actor, &*world, dir, &params)
                } else {
                    None
                }
            });
            if let Some(escape) = escape {
                trace!("{}: surrounded, escaping toward ({:.2}, {:.2})", state.agent, escape.x, escape.y);
                let result = safe_move(body.pos, body.radius, escape, step, world.map(), None, true);
                moved = self.commit(state, result, dt, world, MIN_BLOCKED_DELTA);
            }
        }
        self.track_approach(state, (body.pos + moved).distance(state.target), step);
    }

    /// Stall tracking for Blocked agents. Sliding along a wall moves the agent
    /// without bringing it closer, so only a new closest approach counts as progress.
    fn track_approach(&self, state: &mut AgentMoveState, distance: f64, step: f64) {
        if distance < state.best_distance - step * STALL_FRACTION {
            state.best_distance = distance;
            state.stalled_ticks = 0;
        } else {
            state.stalled_ticks += 1;
        }
    }

    fn track_stall(&self, state: &mut AgentMoveState, moved: DVec2, step: f64) {
        if moved.length() < step * STALL_FRACTION {
            state.stalled_ticks += 1;
        } else {
            state.stalled_ticks = 0;
        }
    }

    /// Run one step through avoidance and safe-move, then write it to the actor.
    /// Returns the displacement actually applied.
    #[allow(clippy::too_many_arguments)]
    fn apply_step(
        &mut self,
        state: &mut AgentMoveState,
        body: Body,
        dir: DVec2,
        step: f64,
        dt: f64,
        world: &mut dyn World,
        min_delta: f64,
    ) -> DVec2 {
        if step <= 0.0 || dir == DVec2::ZERO {
            return DVec2::ZERO;
        }
        let result = {
            let view: &dyn World = &*world;
            let Some(actor) = view.actor(state.agent) else {
                return DVec2::ZERO;
            };
            let slide = try_slide_on_contact(actor, dir, step, view, &self.config.avoidance());
            safe_move(
                body.pos,
                body.radius,
                slide.dir,
                slide.dist,
                view.map(),
                state.last_tangent,
                false,
            )
        };
        self.commit(state, result, dt, world, min_delta)
    }

    fn commit(&mut self, state: &mut AgentMoveState, result: SafeMove, dt: f64, world: &mut dyn World, min_delta: f64) -> DVec2 {
        let delta = if result.delta.length() > min_delta {
            result.delta
        } else {
            DVec2::ZERO
        };
        if delta != DVec2::ZERO {
            state.last_tangent = result.tangent;
            if let Some(actor) = world.actor_mut(state.agent) {
                actor.move_by(DVec3::new(delta.x, 0.0, delta.y));
                turn_toward(actor, heading_degrees(delta), state.turn_speed, dt);
            }
        }
        if self.config.steering_enabled && dt > 0.0 {
            state.velocity = delta / dt;
        }
        delta
    }
}

/// A* path from the agent to its target, smoothed and trimmed for following.
///
/// The last waypoint is the exact target. Waypoints are kept inside the map by
/// the agent's radius, and leading waypoints already in view of the agent's
/// next one are dropped.
fn plan_path(map: &dyn GridMap, body: Body, target: DVec2) -> Option<PathCursor> {
    let raw = find_path(map, body.pos, target)?;
    let metrics = map.metrics();
    let mut nodes = smooth_path(&raw, Some(map));
    match nodes.last_mut() {
        Some(last) => *last = PathNode::from(target),
        None => nodes.push(PathNode::from(target)),
    }
    for node in nodes.iter_mut() {
        *node = PathNode::from(clamp_to_bounds(node.ground(), body.radius, &metrics));
    }
    while nodes.len() > 1 && has_line_of_sight(body.pos, nodes[1].ground(), Some(map)) {
        nodes.remove(0);
    }
    Some(PathCursor::new(nodes))
}
