use crate::actor::{Actor, ActorId, Unit};
use crate::grid::{Grid, GridMap};
use std::collections::HashMap;

/// The game-side view the movement system borrows each tick.
///
/// `actors` must yield actors in a stable order; avoidance tie-breaking
/// depends on it.
pub trait World {
    fn actors(&self) -> Box<dyn Iterator<Item = &dyn Actor> + '_>;
    fn actor(&self, id: ActorId) -> Option<&dyn Actor>;
    fn actor_mut(&mut self, id: ActorId) -> Option<&mut dyn Actor>;
    /// `None` when no map is loaded; obstacle checks then treat everything as clear
    fn map(&self) -> Option<&dyn GridMap>;
}

/// Self-contained world of [`Unit`]s on a [`Grid`], used by the sandbox, replays and tests
#[derive(Clone, Debug, Default)]
pub struct SimWorld {
    pub grid: Option<Grid>,
    units: Vec<Unit>,
    index: HashMap<ActorId, usize>,
}

impl SimWorld {
    pub fn new(grid: Grid) -> Self {
        SimWorld {
            grid: Some(grid),
            units: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// World without a map, everything is walkable
    pub fn without_map() -> Self {
        SimWorld::default()
    }

    /// Add a unit; returns false if the id is already taken
    pub fn spawn(&mut self, unit: Unit) -> bool {
        if self.index.contains_key(&unit.id) {
            return false;
        }
        self.index.insert(unit.id, self.units.len());
        self.units.push(unit);
        true
    }

    /// Remove a unit, keeping the spawn order of the rest
    pub fn despawn(&mut self, id: ActorId) -> Option<Unit> {
        let slot = self.index.remove(&id)?;
        let unit = self.units.remove(slot);
        for i in self.index.values_mut() {
            if *i > slot {
                *i -= 1;
            }
        }
        Some(unit)
    }

    pub fn unit(&self, id: ActorId) -> Option<&Unit> {
        self.index.get(&id).map(|&i| &self.units[i])
    }

    pub fn unit_mut(&mut self, id: ActorId) -> Option<&mut Unit> {
        let i = *self.index.get(&id)?;
        self.units.get_mut(i)
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Next free numeric id
    pub fn next_id(&self) -> ActorId {
        ActorId(self.units.iter().map(|u| u.id.0 + 1).max().unwrap_or(1))
    }
}

impl World for SimWorld {
    fn actors(&self) -> Box<dyn Iterator<Item = &dyn Actor> + '_> {
        Box::new(self.units.iter().map(|u| u as &dyn Actor))
    }

    fn actor(&self, id: ActorId) -> Option<&dyn Actor> {
        self.unit(id).map(|u| u as &dyn Actor)
    }

    fn actor_mut(&mut self, id: ActorId) -> Option<&mut dyn Actor> {
        self.unit_mut(id).map(|u| u as &mut dyn Actor)
    }

    fn map(&self) -> Option<&dyn GridMap> {
        self.grid.as_ref().map(|g| g as &dyn GridMap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_lookup() {
        let mut world = SimWorld::new(Grid::new(4, 4, 1.0, 1.0));
        assert!(world.spawn(Unit::new(1, 0.5, 0.5, 0.3, 2.0)));
        assert!(world.spawn(Unit::new(2, 1.5, 0.5, 0.3, 2.0)));
        assert!(!world.spawn(Unit::new(1, 2.5, 0.5, 0.3, 2.0)));

        assert_eq!(world.actors().count(), 2);
        assert_eq!(world.actor(ActorId(2)).map(|a| a.position().x), Some(1.5));
        assert!(world.actor(ActorId(3)).is_none());
        assert_eq!(world.next_id(), ActorId(3));
    }

    #[test]
    fn test_despawn_keeps_order() {
        let mut world = SimWorld::without_map();
        for id in 1..=3 {
            world.spawn(Unit::new(id, id as f64, 0.0, 0.3, 2.0));
        }
        assert!(world.despawn(ActorId(1)).is_some());

        let ids: Vec<_> = world.actors().map(|a| a.id()).collect();
        assert_eq!(ids, vec![ActorId(2), ActorId(3)]);
        assert_eq!(world.unit(ActorId(3)).map(|u| u.x), Some(3.0));
        assert!(world.map().is_none());
    }
}
