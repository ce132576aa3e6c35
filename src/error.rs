use thiserror::Error;

use crate::actor::ActorId;

/// Rejected move orders. Not fatal; the caller simply observes no movement.
#[derive(Debug, Error, PartialEq)]
pub enum MoveError {
    #[error("actor {0} not found or not active")]
    UnknownAgent(ActorId),
}

/// Reasons a unit command fails validation at construction
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("target ({x}, {z}) is not a finite point")]
    NonFiniteTarget { x: f64, z: f64 },
    #[error("speed must be positive, got {0}")]
    InvalidSpeed(f64),
    #[error("arrival radius must be non-negative, got {0}")]
    InvalidArrivalRadius(f64),
    #[error("turn speed must be positive, got {0}")]
    InvalidTurnSpeed(f64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid command: {0}")]
    Command(#[from] CommandError),
    #[error("scenario map is empty")]
    EmptyMap,
    #[error("duplicate unit id {0}")]
    DuplicateUnit(ActorId),
}
