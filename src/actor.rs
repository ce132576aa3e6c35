use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// External identifier of an actor in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broad actor category. Only actors of the same movable kind push each other around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    #[default]
    Unit,
    Building,
    Projectile,
}

impl ActorKind {
    pub fn is_movable(self) -> bool {
        matches!(self, ActorKind::Unit)
    }
}

/// Per-unit overrides read by the movement system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Look-ahead distance for obstacle checks, in world units
    #[serde(default)]
    pub obstacle_check_distance: Option<f64>,
}

/// What the locomotion core needs from a game actor.
///
/// Positions are 3D with Y as height; all movement happens in the XZ plane.
pub trait Actor {
    fn id(&self) -> ActorId;
    fn kind(&self) -> ActorKind;
    fn position(&self) -> DVec3;
    fn move_by(&mut self, delta: DVec3);
    /// Heading in degrees, 0 along +X, 90 along +Z
    fn rotation(&self) -> f64;
    fn set_rotation(&mut self, degrees: f64);
    fn radius(&self) -> f64;
    fn speed(&self) -> f64;
    fn is_active(&self) -> bool;
    fn is_dead(&self) -> bool;
    fn unit_config(&self) -> Option<&UnitConfig> {
        None
    }

    /// Position projected onto the ground plane
    fn ground_position(&self) -> DVec2 {
        let p = self.position();
        DVec2::new(p.x, p.z)
    }
}

/// Unit represents a circular agent with precise floating-point positioning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    pub id: ActorId,
    #[serde(default)]
    pub kind: ActorKind,

    /// Floating-point position (centre of the unit's footprint)
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub z: f64,

    /// Heading in degrees
    #[serde(default)]
    pub rotation: f64,

    /// Collision radius in world units
    pub radius: f64,

    /// Nominal speed in world units per second
    pub speed: f64,

    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub dead: bool,

    #[serde(default)]
    pub config: Option<UnitConfig>,
}

fn default_true() -> bool {
    true
}

impl Unit {
    /// Create a new unit at the given ground position
    pub fn new(id: u32, x: f64, z: f64, radius: f64, speed: f64) -> Self {
        Unit {
            id: ActorId(id),
            kind: ActorKind::Unit,
            x,
            y: 0.0,
            z,
            rotation: 0.0,
            radius,
            speed,
            active: true,
            dead: false,
            config: None,
        }
    }

    pub fn with_kind(mut self, kind: ActorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_obstacle_check_distance(mut self, distance: f64) -> Self {
        self.config = Some(UnitConfig {
            obstacle_check_distance: Some(distance),
        });
        self
    }
}

impl Actor for Unit {
    fn id(&self) -> ActorId {
        self.id
    }

    fn kind(&self) -> ActorKind {
        self.kind
    }

    fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    fn move_by(&mut self, delta: DVec3) {
        self.x += delta.x;
        self.y += delta.y;
        self.z += delta.z;
    }

    fn rotation(&self) -> f64 {
        self.rotation
    }

    fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees;
    }

    fn radius(&self) -> f64 {
        self.radius
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn is_dead(&self) -> bool {
        self.dead
    }

    fn unit_config(&self) -> Option<&UnitConfig> {
        self.config.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_move_by() {
        let mut unit = Unit::new(1, 2.0, 3.0, 0.5, 4.0);
        unit.move_by(DVec3::new(1.0, 0.0, -0.5));

        assert_eq!(unit.ground_position(), DVec2::new(3.0, 2.5));
        assert_eq!(unit.position().y, 0.0);
    }

    #[test]
    fn test_only_units_are_movable() {
        assert!(ActorKind::Unit.is_movable());
        assert!(!ActorKind::Building.is_movable());
        assert!(!ActorKind::Projectile.is_movable());
    }

    #[test]
    fn test_obstacle_override() {
        let unit = Unit::new(7, 0.0, 0.0, 0.5, 4.0).with_obstacle_check_distance(1.5);
        let config = unit.unit_config().cloned().unwrap_or_default();
        assert_eq!(config.obstacle_check_distance, Some(1.5));
        assert_eq!(unit.id().to_string(), "#7");
    }
}
