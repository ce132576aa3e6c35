use crate::actor::ActorId;
use crate::flow_field::FlowField;
use crate::pathfinding::PathNode;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Externally visible movement mode of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No move order; only reported in transition events
    Idle,
    MovingStraight,
    /// Following an A* path or a flow field
    Moving,
    Turning,
    Blocked,
    Arrived,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "Idle",
            Mode::MovingStraight => "MovingStraight",
            Mode::Moving => "Moving",
            Mode::Turning => "Turning",
            Mode::Blocked => "Blocked",
            Mode::Arrived => "Arrived",
        };
        f.write_str(name)
    }
}

/// Waypoints plus the index of the one currently steered for
#[derive(Debug, Clone, PartialEq)]
pub struct PathCursor {
    nodes: Vec<PathNode>,
    index: usize,
}

impl PathCursor {
    pub fn new(nodes: Vec<PathNode>) -> Self {
        PathCursor { nodes, index: 0 }
    }

    pub fn current(&self) -> Option<&PathNode> {
        self.nodes.get(self.index)
    }

    pub fn advance(&mut self) {
        if self.index < self.nodes.len() {
            self.index += 1;
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.nodes.len()
    }

    /// Waypoints not yet reached
    pub fn remaining(&self) -> &[PathNode] {
        &self.nodes[self.index.min(self.nodes.len())..]
    }

    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }
}

/// Internal per-mode data. A moving agent holds a path or a field, never both.
#[derive(Debug, Clone)]
pub enum Phase {
    Straight,
    Turning { target_angle: f64 },
    FollowPath(PathCursor),
    FollowField(Arc<FlowField>),
    Blocked,
    Arrived,
}

impl Phase {
    pub fn mode(&self) -> Mode {
        match self {
            Phase::Straight => Mode::MovingStraight,
            Phase::Turning { .. } => Mode::Turning,
            Phase::FollowPath(_) | Phase::FollowField(_) => Mode::Moving,
            Phase::Blocked => Mode::Blocked,
            Phase::Arrived => Mode::Arrived,
        }
    }
}

/// Everything the movement system tracks for one agent with a move order
#[derive(Debug, Clone)]
pub struct AgentMoveState {
    pub agent: ActorId,
    pub phase: Phase,
    pub target: DVec2,
    pub speed: f64,
    pub arrival_radius: f64,
    /// Degrees per second
    pub turn_speed: f64,
    pub check_distance: f64,
    /// Sideways direction that last got the agent unstuck
    pub last_tangent: Option<DVec2>,
    /// Steering velocity; stays zero when steering is off
    pub velocity: DVec2,
    pub max_force: f64,
    /// Consecutive ticks without meaningful progress
    pub stalled_ticks: u32,
    /// Closest approach to the target while Blocked; infinite outside that mode
    pub best_distance: f64,
}

impl AgentMoveState {
    pub fn mode(&self) -> Mode {
        self.phase.mode()
    }

    pub fn path(&self) -> Option<&PathCursor> {
        match &self.phase {
            Phase::FollowPath(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn flow_field(&self) -> Option<&Arc<FlowField>> {
        match &self.phase {
            Phase::FollowField(field) => Some(field),
            _ => None,
        }
    }
}

/// Recorded mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEvent {
    pub tick: u64,
    pub agent: ActorId,
    pub from: Mode,
    pub to: Mode,
}

/// Stable reference to an arena slot; stale once the slot is reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    state: Option<AgentMoveState>,
}

/// Arena of agent states with an id index and insertion order
#[derive(Debug, Clone, Default)]
pub struct MoveTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_agent: HashMap<ActorId, MoveHandle>,
    order: Vec<MoveHandle>,
}

impl MoveTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn handle(&self, agent: ActorId) -> Option<MoveHandle> {
        self.by_agent.get(&agent).copied()
    }

    fn slot(&self, handle: MoveHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: MoveHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    pub fn get(&self, handle: MoveHandle) -> Option<&AgentMoveState> {
        self.slot(handle)?.state.as_ref()
    }

    pub fn get_mut(&mut self, handle: MoveHandle) -> Option<&mut AgentMoveState> {
        self.slot_mut(handle)?.state.as_mut()
    }

    pub fn by_agent(&self, agent: ActorId) -> Option<&AgentMoveState> {
        self.get(self.handle(agent)?)
    }

    /// Store a state for its agent. An agent that already has a slot keeps it,
    /// along with its place in the update order.
    pub fn upsert(&mut self, state: AgentMoveState) -> MoveHandle {
        if let Some(handle) = self.handle(state.agent) {
            if let Some(slot) = self.slot_mut(handle) {
                slot.state = Some(state);
                return handle;
            }
        }

        let agent = state.agent;
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.state = Some(state);
                MoveHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    state: Some(state),
                });
                MoveHandle {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.by_agent.insert(agent, handle);
        self.order.push(handle);
        handle
    }

    /// Temporarily move a state out of its slot; put it back with [`MoveTable::restore`]
    pub fn take(&mut self, handle: MoveHandle) -> Option<AgentMoveState> {
        self.slot_mut(handle)?.state.take()
    }

    pub fn restore(&mut self, handle: MoveHandle, state: AgentMoveState) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.state = Some(state);
        }
    }

    pub fn remove(&mut self, agent: ActorId) -> Option<AgentMoveState> {
        let handle = self.by_agent.remove(&agent)?;
        self.order.retain(|&h| h != handle);
        let slot = self.slot_mut(handle)?;
        let state = slot.state.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        state
    }

    /// Handles in insertion order
    pub fn order(&self) -> &[MoveHandle] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentMoveState> + '_ {
        self.order.iter().filter_map(|&h| self.get(h))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_agent.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: u32) -> AgentMoveState {
        AgentMoveState {
            agent: ActorId(id),
            phase: Phase::Straight,
            target: DVec2::new(1.0, 1.0),
            speed: 2.0,
            arrival_radius: 0.1,
            turn_speed: 360.0,
            check_distance: 3.0,
            last_tangent: None,
            velocity: DVec2::ZERO,
            max_force: 8.0,
            stalled_ticks: 0,
            best_distance: f64::INFINITY,
        }
    }

    #[test]
    fn test_upsert_keeps_order() {
        let mut table = MoveTable::new();
        let a = table.upsert(state(1));
        table.upsert(state(2));
        let mut again = state(1);
        again.target = DVec2::new(5.0, 5.0);
        assert_eq!(table.upsert(again), a);

        let ids: Vec<_> = table.iter().map(|s| s.agent).collect();
        assert_eq!(ids, vec![ActorId(1), ActorId(2)]);
        assert_eq!(table.by_agent(ActorId(1)).map(|s| s.target), Some(DVec2::new(5.0, 5.0)));
    }

    #[test]
    fn test_removed_handles_go_stale() {
        let mut table = MoveTable::new();
        let a = table.upsert(state(1));
        assert!(table.remove(ActorId(1)).is_some());
        assert!(table.remove(ActorId(1)).is_none());
        assert!(table.get(a).is_none());

        // Slot is reused under a new generation
        let b = table.upsert(state(2));
        assert_ne!(a, b);
        assert!(table.get(a).is_none());
        assert_eq!(table.get(b).map(|s| s.agent), Some(ActorId(2)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_path_cursor() {
        let mut cursor = PathCursor::new(vec![PathNode::new(0.5, 0.5), PathNode::new(1.5, 0.5)]);
        assert_eq!(cursor.current().map(|n| n.x), Some(0.5));
        cursor.advance();
        assert_eq!(cursor.remaining().len(), 1);
        cursor.advance();
        cursor.advance();
        assert!(cursor.is_exhausted());
        assert!(cursor.current().is_none());
        assert!(cursor.remaining().is_empty());
    }

    #[test]
    fn test_phase_modes() {
        assert_eq!(Phase::Straight.mode(), Mode::MovingStraight);
        assert_eq!(Phase::FollowPath(PathCursor::new(Vec::new())).mode(), Mode::Moving);
        assert_eq!(Phase::Turning { target_angle: 90.0 }.mode(), Mode::Turning);
        assert_eq!(Mode::Blocked.to_string(), "Blocked");
    }
}
