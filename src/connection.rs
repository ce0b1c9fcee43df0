//! Tower assignment and the handover state machine.
//!
//! A user is either `Unconnected` or `Connected(tower)`. Movement only
//! triggers reassignment once the user has left its current tower's
//! coverage; staying in range never causes a handover.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{NetworkError, Result};
use crate::geometry::Position;
use crate::ids::TowerId;
use crate::topology::TopologyGraph;
use crate::user::User;

/// Outcome of a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MovementStatus {
    /// Connected after the move, either still on the same tower or newly
    /// attached after being out of coverage.
    Connected { tower: TowerId },
    Handover { from: TowerId, to: TowerId },
    OutOfCoverage,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionManager;

impl ConnectionManager {
    pub fn new() -> Self {
        Self
    }

    /// Attaches `user` to the nearest in-range tower. With no tower in range
    /// the user is detached from any previous tower and `NoCoverage` is
    /// returned; the user itself stays registered.
    pub fn connect(&self, graph: &mut TopologyGraph, user: &mut User) -> Result<TowerId> {
        let nearest = graph
            .nearest_in_range_tower(user.position())
            .map(|tower| tower.id().clone());
        match nearest {
            Some(tower) => {
                self.reassign(graph, user, Some(tower.clone()));
                Ok(tower)
            }
            None => {
                self.reassign(graph, user, None);
                Err(NetworkError::NoCoverage(user.id().clone()))
            }
        }
    }

    /// Records the move, then keeps, hands over or drops the connection.
    pub fn handle_movement(
        &self,
        graph: &mut TopologyGraph,
        user: &mut User,
        position: Position,
        tick: u64,
    ) -> MovementStatus {
        user.record_movement(tick, position);

        let previous = user.tower_id().cloned();
        if let Some(current) = &previous {
            if graph.covers(current, &position) {
                debug!(user = %user.id(), tower = %current, "still in range");
                return MovementStatus::Connected {
                    tower: current.clone(),
                };
            }
        }

        match (self.connect(graph, user), previous) {
            (Ok(to), Some(from)) if from != to => {
                info!(user = %user.id(), %from, %to, "handover");
                MovementStatus::Handover { from, to }
            }
            (Ok(tower), _) => MovementStatus::Connected { tower },
            (Err(_), previous) => {
                info!(
                    user = %user.id(),
                    last_tower = ?previous.as_ref().map(TowerId::as_str),
                    "out of coverage"
                );
                MovementStatus::OutOfCoverage
            }
        }
    }

    /// Moves the user's membership from its current tower to `target` in one
    /// step: old set, new set and the user's tower field change together.
    fn reassign(&self, graph: &mut TopologyGraph, user: &mut User, target: Option<TowerId>) {
        if user.tower_id() == target.as_ref() {
            return;
        }
        if let Some(old) = user.tower_id().cloned() {
            if let Some(tower) = graph.tower_mut(&old) {
                tower.remove_user(user.id());
            }
        }
        if let Some(new) = &target {
            if let Some(tower) = graph.tower_mut(new) {
                tower.add_user(user.id().clone());
            }
        }
        user.set_tower(target);
    }
}
