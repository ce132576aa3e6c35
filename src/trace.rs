use crate::actor::{Actor, ActorId};
use crate::error::ScenarioError;
use crate::move_state::{Mode, MoveEvent};
use crate::movement::MovementSystem;
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One unit's pose after a tick
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSample {
    pub agent: ActorId,
    pub x: f64,
    pub z: f64,
    pub rotation: f64,
    /// `Idle` when the unit has no move order
    pub mode: Mode,
}

/// Every unit's pose after one tick, in world order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    pub tick: u64,
    pub units: Vec<UnitSample>,
}

/// Per-tick trajectories of a simulation run, plus the mode changes it produced.
///
/// Two runs of the same scenario produce equal logs, so comparing logs is the
/// determinism check.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryLog {
    pub dt: f64,
    pub ticks: Vec<TickRecord>,
    #[serde(default)]
    pub events: Vec<MoveEvent>,
}

impl TrajectoryLog {
    pub fn new(dt: f64) -> Self {
        TrajectoryLog {
            dt,
            ticks: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Sample every actor in the world and collect pending mode changes
    pub fn record(&mut self, world: &dyn World, system: &mut MovementSystem) {
        let units = world
            .actors()
            .map(|actor| {
                let pos = actor.ground_position();
                UnitSample {
                    agent: actor.id(),
                    x: pos.x,
                    z: pos.y,
                    rotation: actor.rotation(),
                    mode: system.move_state(actor.id()).unwrap_or(Mode::Idle),
                }
            })
            .collect();
        self.ticks.push(TickRecord {
            tick: system.tick(),
            units,
        });
        self.events.extend(system.drain_events());
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn last(&self) -> Option<&TickRecord> {
        self.ticks.last()
    }

    /// Samples of one unit across the run
    pub fn track(&self, agent: ActorId) -> Vec<&UnitSample> {
        self.ticks
            .iter()
            .filter_map(|record| record.units.iter().find(|s| s.agent == agent))
            .collect()
    }

    /// Final sample of a unit
    pub fn final_sample(&self, agent: ActorId) -> Option<&UnitSample> {
        self.last()?.units.iter().find(|s| s.agent == agent)
    }

    /// Smallest centre distance between any two units at any recorded tick
    pub fn min_separation(&self) -> Option<f64> {
        let mut best: Option<f64> = None;
        for record in &self.ticks {
            for (i, a) in record.units.iter().enumerate() {
                for b in &record.units[i + 1..] {
                    let d = ((a.x - b.x).powi(2) + (a.z - b.z).powi(2)).sqrt();
                    best = Some(best.map_or(d, |m| m.min(d)));
                }
            }
        }
        best
    }

    /// Mode changes of one unit, in order
    pub fn transitions(&self, agent: ActorId) -> Vec<(Mode, Mode)> {
        self.events
            .iter()
            .filter(|e| e.agent == agent)
            .map(|e| (e.from, e.to))
            .collect()
    }

    /// Save log to JSON file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ScenarioError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        let mut arrived = 0;
        let mut blocked = 0;
        let mut moving = 0;
        if let Some(last) = self.last() {
            for sample in &last.units {
                match sample.mode {
                    Mode::Arrived => arrived += 1,
                    Mode::Blocked => blocked += 1,
                    Mode::Idle => {}
                    _ => moving += 1,
                }
            }
        }
        let units = self.last().map_or(0, |r| r.units.len());

        format!(
            "Ticks: {} ({:.2}s)\n\
             Units: {} ({} arrived, {} blocked, {} still moving)\n\
             Mode changes: {}",
            self.ticks.len(),
            self.ticks.len() as f64 * self.dt,
            units,
            arrived,
            blocked,
            moving,
            self.events.len()
        )
    }

    /// Print mode changes to console
    pub fn print_events(&self) {
        println!("\n=== Mode changes ({} events) ===", self.events.len());
        for event in &self.events {
            println!("[tick {:5}] {} {} -> {}", event.tick, event.agent, event.from, event.to);
        }
        println!("=== End of Log ===\n");
    }
}
