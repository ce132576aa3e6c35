pub mod actor;
pub mod avoidance;
pub mod command;
pub mod config;
pub mod error;
pub mod flow_field;
pub mod grid;
pub mod logging;
pub mod move_state;
pub mod movement;
pub mod obstacle;
pub mod pathfinding;
pub mod safe_move;
pub mod scenario;
pub mod steering;
pub mod trace;
pub mod world;

pub use actor::{Actor, ActorId, ActorKind, Unit};
pub use command::{MoveCommand, UnitCommand};
pub use config::{Config, MovementConfig, PathfindingMode};
pub use error::{CommandError, ConfigError, MoveError, ScenarioError};
pub use grid::{Cell, Grid, GridMap, GridMetrics};
pub use move_state::{Mode, MoveEvent};
pub use movement::MovementSystem;
pub use obstacle::has_line_of_sight;
pub use scenario::Scenario;
pub use trace::TrajectoryLog;
pub use world::{SimWorld, World};
