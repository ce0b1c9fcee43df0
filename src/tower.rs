use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};
use crate::geometry::Position;
use crate::ids::{TowerId, UserId};

/// A radio tower. Position, height and radius are fixed at construction;
/// only the connected-user set and the adjacency set change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tower {
    id: TowerId,
    position: Position,
    height: f64,
    coverage_radius: f64,
    connected_users: BTreeSet<UserId>,
    neighbors: BTreeSet<TowerId>,
}

impl Tower {
    pub fn new(id: TowerId, position: Position, height: f64, coverage_radius: f64) -> Result<Self> {
        if !position.is_finite() {
            return Err(NetworkError::InvalidTopology(format!(
                "tower '{id}' has a non-finite position"
            )));
        }
        if !(height.is_finite() && height > 0.0) {
            return Err(NetworkError::InvalidTopology(format!(
                "tower '{id}' height must be positive, got {height}"
            )));
        }
        if !(coverage_radius.is_finite() && coverage_radius > 0.0) {
            return Err(NetworkError::InvalidTopology(format!(
                "tower '{id}' coverage radius must be positive, got {coverage_radius}"
            )));
        }
        Ok(Self {
            id,
            position,
            height,
            coverage_radius,
            connected_users: BTreeSet::new(),
            neighbors: BTreeSet::new(),
        })
    }

    pub fn id(&self) -> &TowerId {
        &self.id
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn coverage_radius(&self) -> f64 {
        self.coverage_radius
    }

    /// Top of the mast.
    pub fn antenna(&self) -> Position {
        self.position.with_elevation(self.position.elevation + self.height)
    }

    /// Returns `false` if the user was already connected.
    pub fn add_user(&mut self, user: UserId) -> bool {
        self.connected_users.insert(user)
    }

    /// Returns `false` if the user was not connected.
    pub fn remove_user(&mut self, user: &UserId) -> bool {
        self.connected_users.remove(user)
    }

    pub fn connected_user_count(&self) -> usize {
        self.connected_users.len()
    }

    pub fn has_user(&self, user: &UserId) -> bool {
        self.connected_users.contains(user)
    }

    pub fn connected_users(&self) -> impl Iterator<Item = &UserId> {
        self.connected_users.iter()
    }

    /// Adjacent towers in ascending id order.
    pub fn neighbors(&self) -> impl Iterator<Item = &TowerId> {
        self.neighbors.iter()
    }

    pub fn is_adjacent(&self, other: &TowerId) -> bool {
        self.neighbors.contains(other)
    }

    pub(crate) fn link(&mut self, other: TowerId) {
        self.neighbors.insert(other);
    }
}
