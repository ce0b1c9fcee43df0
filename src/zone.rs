use serde::Serialize;

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::ids::{TowerId, UserId, ZoneId};
use crate::registry::UserRegistry;
use crate::topology::TopologyGraph;
use crate::tower::Tower;
use crate::user::User;

/// An administrative partition: its own tower graph and its own registry.
#[derive(Debug, Clone)]
pub struct Zone {
    id: ZoneId,
    graph: TopologyGraph,
    users: UserRegistry,
}

impl Zone {
    pub fn new(id: ZoneId, config: &SimulationConfig) -> Self {
        Self {
            graph: TopologyGraph::new(id.clone(), config.coverage.model),
            users: UserRegistry::with_config(&config.registry),
            id,
        }
    }

    pub fn id(&self) -> &ZoneId {
        &self.id
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    pub fn add_tower(&mut self, tower: Tower) -> Result<()> {
        self.graph.add_tower(tower)
    }

    pub fn add_edge(&mut self, a: &TowerId, b: &TowerId) -> Result<()> {
        self.graph.add_edge(a, b)
    }

    /// Registers `user` here, stamping this zone's id on it.
    pub(crate) fn admit(&mut self, mut user: User) {
        user.set_zone(self.id.clone());
        self.users.put(user.id().clone(), user);
    }

    /// Removes the user from the registry and from its tower.
    pub(crate) fn release(&mut self, id: &UserId) -> Option<User> {
        let mut user = self.users.remove(id)?;
        if let Some(tower) = user.tower_id().cloned() {
            if let Some(tower) = self.graph.tower_mut(&tower) {
                tower.remove_user(id);
            }
            user.set_tower(None);
        }
        Some(user)
    }

    /// Disjoint mutable access to the graph and the registry, so a user can be
    /// rewired without taking it out of the registry.
    pub(crate) fn split_mut(&mut self) -> (&mut TopologyGraph, &mut UserRegistry) {
        (&mut self.graph, &mut self.users)
    }

    pub fn summary(&self) -> ZoneSummary {
        ZoneSummary {
            id: self.id.clone(),
            towers: self.graph.len(),
            links: self.graph.edge_count(),
            users: self.users.len(),
            connected_users: self.graph.towers().map(Tower::connected_user_count).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneSummary {
    pub id: ZoneId,
    pub towers: usize,
    pub links: usize,
    pub users: usize,
    pub connected_users: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Position;

    #[test]
    fn admit_stamps_zone_and_release_detaches() {
        let zone_id = ZoneId::parse("north").unwrap();
        let mut zone = Zone::new(zone_id.clone(), &SimulationConfig::default());
        let tower_id = TowerId::parse("A").unwrap();
        zone.add_tower(Tower::new(tower_id.clone(), Position::new(0.0, 0.0), 10.0, 5.0).unwrap())
            .unwrap();

        let user_id = UserId::parse("u").unwrap();
        let mut user = User::new(
            user_id.clone(),
            "u".into(),
            Position::new(1.0, 0.0),
            ZoneId::parse("elsewhere").unwrap(),
        );
        user.set_tower(Some(tower_id.clone()));
        zone.admit(user);
        zone.split_mut().0.tower_mut(&tower_id).unwrap().add_user(user_id.clone());

        assert_eq!(zone.user(&user_id).unwrap().zone_id(), &zone_id);
        assert_eq!(zone.summary().connected_users, 1);

        let released = zone.release(&user_id).unwrap();
        assert!(released.tower_id().is_none());
        assert!(zone.user(&user_id).is_none());
        assert_eq!(zone.graph().tower(&tower_id).unwrap().connected_user_count(), 0);
    }
}
