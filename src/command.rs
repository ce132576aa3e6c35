use crate::actor::ActorId;
use crate::error::CommandError;
use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Order to walk one agent to a ground position.
///
/// Can only be built through validating constructors, including when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMoveCommand")]
pub struct MoveCommand {
    agent: ActorId,
    target_x: f64,
    target_z: f64,
    speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    arrival_radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    turn_speed: Option<f64>,
}

/// Unchecked wire shape of [`MoveCommand`]
#[derive(Deserialize)]
struct RawMoveCommand {
    agent: ActorId,
    target_x: f64,
    target_z: f64,
    speed: f64,
    #[serde(default)]
    arrival_radius: Option<f64>,
    #[serde(default)]
    turn_speed: Option<f64>,
}

impl TryFrom<RawMoveCommand> for MoveCommand {
    type Error = CommandError;

    fn try_from(raw: RawMoveCommand) -> Result<Self, Self::Error> {
        let mut command = MoveCommand::new(raw.agent, raw.target_x, raw.target_z, raw.speed)?;
        if let Some(radius) = raw.arrival_radius {
            command = command.with_arrival_radius(radius)?;
        }
        if let Some(turn_speed) = raw.turn_speed {
            command = command.with_turn_speed(turn_speed)?;
        }
        Ok(command)
    }
}

impl MoveCommand {
    pub fn new(agent: ActorId, target_x: f64, target_z: f64, speed: f64) -> Result<Self, CommandError> {
        if !target_x.is_finite() || !target_z.is_finite() {
            return Err(CommandError::NonFiniteTarget {
                x: target_x,
                z: target_z,
            });
        }
        if !(speed.is_finite() && speed > 0.0) {
            return Err(CommandError::InvalidSpeed(speed));
        }
        Ok(MoveCommand {
            agent,
            target_x,
            target_z,
            speed,
            arrival_radius: None,
            turn_speed: None,
        })
    }

    pub fn with_arrival_radius(mut self, radius: f64) -> Result<Self, CommandError> {
        if !(radius.is_finite() && radius >= 0.0) {
            return Err(CommandError::InvalidArrivalRadius(radius));
        }
        self.arrival_radius = Some(radius);
        Ok(self)
    }

    pub fn with_turn_speed(mut self, degrees_per_second: f64) -> Result<Self, CommandError> {
        if !(degrees_per_second.is_finite() && degrees_per_second > 0.0) {
            return Err(CommandError::InvalidTurnSpeed(degrees_per_second));
        }
        self.turn_speed = Some(degrees_per_second);
        Ok(self)
    }

    pub fn agent(&self) -> ActorId {
        self.agent
    }

    pub fn target(&self) -> DVec2 {
        DVec2::new(self.target_x, self.target_z)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn arrival_radius(&self) -> Option<f64> {
        self.arrival_radius
    }

    pub fn turn_speed(&self) -> Option<f64> {
        self.turn_speed
    }
}

/// Orders the command layer can hand to the movement system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitCommand {
    Move(MoveCommand),
    Stop { agent: ActorId },
}

impl UnitCommand {
    pub fn agent(&self) -> ActorId {
        match self {
            UnitCommand::Move(command) => command.agent(),
            UnitCommand::Stop { agent } => *agent,
        }
    }
}
