use crate::actor::Unit;
use crate::command::UnitCommand;
use crate::config::MovementConfig;
use crate::error::ScenarioError;
use crate::grid::Grid;
use crate::movement::MovementSystem;
use crate::trace::TrajectoryLog;
use crate::world::SimWorld;
use glam::DVec2;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Map section of a scenario. Walls come from `layout` rows when present,
/// otherwise from `blocked` cell ids (`col + row * cols`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSpec {
    #[serde(default)]
    pub cols: i32,
    #[serde(default)]
    pub rows: i32,
    #[serde(default = "default_cell_size")]
    pub cell_size: f64,
    /// World position of the top-left corner as `[x, z]`
    #[serde(default)]
    pub origin: [f64; 2],
    #[serde(default)]
    pub layout: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<i32>,
}

/// A command issued just before the given tick is simulated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledCommand {
    #[serde(default)]
    pub tick: u64,
    pub command: UnitCommand,
}

/// Self-contained, replayable simulation setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// No map means an open plane
    #[serde(default)]
    pub map: Option<MapSpec>,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub commands: Vec<ScheduledCommand>,
    pub ticks: u64,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default)]
    pub movement: Option<MovementConfig>,
}

fn default_cell_size() -> f64 {
    1.0
}

fn default_dt() -> f64 {
    1.0 / 30.0
}

impl MapSpec {
    pub fn to_grid(&self) -> Result<Grid, ScenarioError> {
        let grid = if !self.layout.is_empty() {
            let lines: Vec<&str> = self.layout.iter().map(String::as_str).collect();
            Grid::from_layout(&lines, self.cell_size)
        } else {
            Grid::with_blocked(self.rows, self.cols, self.cell_size, &self.blocked)
        };
        if grid.rows <= 0 || grid.cols <= 0 || self.cell_size <= 0.0 {
            return Err(ScenarioError::EmptyMap);
        }
        Ok(grid.with_origin(DVec2::new(self.origin[0], self.origin[1])))
    }
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let scenario = Self::from_json(&fs::read_to_string(path)?)?;
        info!(
            "Loaded scenario '{}' from {} ({} units, {} commands, {} ticks)",
            scenario.name,
            path.display(),
            scenario.units.len(),
            scenario.commands.len(),
            scenario.ticks
        );
        Ok(scenario)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ScenarioError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Build the starting world: map plus units in file order
    pub fn build_world(&self) -> Result<SimWorld, ScenarioError> {
        let mut world = match &self.map {
            Some(map) => SimWorld::new(map.to_grid()?),
            None => SimWorld::without_map(),
        };
        for unit in &self.units {
            if !world.spawn(unit.clone()) {
                return Err(ScenarioError::DuplicateUnit(unit.id));
            }
        }
        Ok(world)
    }

    /// Run every tick and record the trajectories.
    ///
    /// Commands for tick `t` are applied, in file order, right before tick `t`
    /// is simulated; tick 0 is the first one. Rejected commands are logged and skipped.
    pub fn run(&self) -> Result<TrajectoryLog, ScenarioError> {
        let mut world = self.build_world()?;
        let mut system = MovementSystem::new(self.movement.clone().unwrap_or_default());
        let mut log = TrajectoryLog::new(self.dt);

        let mut commands: Vec<&ScheduledCommand> = self.commands.iter().collect();
        commands.sort_by_key(|c| c.tick);
        let mut pending = commands.into_iter().peekable();

        for tick in 0..self.ticks {
            while let Some(scheduled) = pending.next_if(|c| c.tick <= tick) {
                if let Err(e) = system.apply(&scheduled.command, &world) {
                    warn!("tick {}: {}", tick, e);
                }
            }
            system.fixed_update(self.dt, &mut world);
            log.record(&world, &mut system);
        }
        Ok(log)
    }
}
